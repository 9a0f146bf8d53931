//! Spending-limit behavior of an enforcement point over many uses.

use chrono::{DateTime, Duration, Utc};
use covenant_core::{Authorization, Enforcer, LimitKind, MandateError, MandateState};

fn grant() -> Authorization {
    Authorization {
        max_amount: 6000,
        max_total: 20000,
        currency: "USD".to_string(),
        merchant_ids: vec!["store-1".to_string()],
        max_uses: 10,
    }
}

fn window(now: DateTime<Utc>) -> i64 {
    (now + Duration::hours(24)).timestamp()
}

#[test]
fn cumulative_budget_admits_exactly_what_fits() {
    let enforcer = Enforcer::new("test");
    let grant = grant();
    let now = Utc::now();
    let exp = window(now);

    // 6000 fits three times into a 20000 budget.
    for index in 0..3 {
        let entry = enforcer
            .authorize_use(&grant, exp, "m1", 6000, index, Some("store-1"), now)
            .expect("within budget");
        assert_eq!(entry.total_spent, 6000 * u64::from(index + 1));
    }

    let err = enforcer
        .authorize_use(&grant, exp, "m1", 6000, 3, Some("store-1"), now)
        .unwrap_err();
    match err {
        MandateError::LimitExceeded { kind, limit, requested } => {
            assert_eq!(kind, LimitKind::MaxTotal);
            assert_eq!(limit, 20000);
            assert_eq!(requested, 24000);
        }
        other => panic!("unexpected error: {other}"),
    }

    // The rejection consumed nothing; the remaining 2000 is still spendable.
    let entry = enforcer
        .authorize_use(&grant, exp, "m1", 2000, 3, Some("store-1"), now)
        .expect("remainder fits");
    assert_eq!(entry.total_spent, 20000);
    assert_eq!(enforcer.state(&grant, exp, "m1", now), MandateState::Exhausted);
}

#[test]
fn per_transaction_limit_rejects_without_spending() {
    let enforcer = Enforcer::new("test");
    let grant = grant();
    let now = Utc::now();
    let exp = window(now);

    let err = enforcer
        .authorize_use(&grant, exp, "m1", 6001, 0, Some("store-1"), now)
        .unwrap_err();
    assert!(matches!(
        err,
        MandateError::LimitExceeded { kind: LimitKind::MaxAmount, .. }
    ));

    // A rejected first use leaves no observable record.
    assert!(matches!(
        enforcer.usage("m1"),
        Err(MandateError::UnknownMandate { .. })
    ));
    assert_eq!(enforcer.state(&grant, exp, "m1", now), MandateState::Unseen);

    // Index 0 is still the next index after the rejection.
    enforcer
        .authorize_use(&grant, exp, "m1", 6000, 0, Some("store-1"), now)
        .expect("retry at same index");
}

#[test]
fn expiry_is_terminal_even_with_budget_left() {
    let enforcer = Enforcer::new("test");
    let grant = grant();
    let now = Utc::now();
    let exp = window(now);
    let after = now + Duration::hours(25);

    // Never used, budget untouched, but the window has closed.
    let err = enforcer
        .authorize_use(&grant, exp, "m1", 100, 0, Some("store-1"), after)
        .unwrap_err();
    assert!(matches!(err, MandateError::Expired { .. }));
    assert_eq!(enforcer.state(&grant, exp, "m1", after), MandateState::Expired);

    // Expiry outranks every other failure, including bad merchant scope.
    let err = enforcer
        .authorize_use(&grant, exp, "m1", 100, 0, Some("store-9"), after)
        .unwrap_err();
    assert!(matches!(err, MandateError::Expired { .. }));
}

#[test]
fn ledgers_do_not_bleed_across_enforcers() {
    let first = Enforcer::new("merchant:store-1");
    let second = Enforcer::new("processor");
    let grant = grant();
    let now = Utc::now();
    let exp = window(now);

    first
        .authorize_use(&grant, exp, "m1", 6000, 0, Some("store-1"), now)
        .expect("accept");

    // The second enforcer has seen nothing and still expects index 0.
    second
        .authorize_use(&grant, exp, "m1", 6000, 0, Some("store-1"), now)
        .expect("independent ledger");
    assert_eq!(first.usage("m1").expect("entry").use_count, 1);
    assert_eq!(second.usage("m1").expect("entry").use_count, 1);
}
