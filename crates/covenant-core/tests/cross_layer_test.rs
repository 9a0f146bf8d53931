//! End-to-end flows across all three enforcement layers.

use chrono::{DateTime, Duration, Utc};
use covenant_core::{
    bind_key, Authorization, ChargeRequest, Conversation, IntentRecord, KeyPair, LimitKind,
    MandateError, MandateRef, Merchant, Platform, Processor, Turn,
};
use serde_json::{json, Value};

fn grant() -> Authorization {
    Authorization {
        max_amount: 5000,
        max_total: 12000,
        currency: "USD".to_string(),
        merchant_ids: vec!["store-1".to_string()],
        max_uses: 3,
    }
}

fn intent(now: DateTime<Utc>) -> IntentRecord {
    IntentRecord {
        summary: "coffee beans monthly, at most $50 a bag".to_string(),
        conversation: Conversation::new(
            "demo-model",
            vec![Turn {
                role: "user".to_string(),
                content: "keep me stocked on coffee, max $50 a bag".to_string(),
            }],
        ),
        created_at: now,
    }
}

fn checkout_session(merchant: &Merchant, id: &str, amount: u64) -> Value {
    let mut session = json!({
        "id": id,
        "line_items": [{ "sku": "beans-1kg", "quantity": 1, "amount": amount }],
        "totals": { "total": amount, "currency": "USD" },
    });
    merchant.sign_checkout(&mut session).expect("merchant sign");
    session
}

#[test]
fn full_flow_platform_merchant_processor() {
    let platform = Platform::new("issuer-1", "agent-1");
    let merchant = Merchant::new("merchant-1", "store-1", platform.key_set());
    let processor = Processor::new(platform.key_set());
    let now = Utc::now();

    let issued = platform
        .issue_intent_mandate(&grant(), &intent(now), Duration::days(30), now)
        .expect("issue");

    // Three purchases, each bound, completed, and charged in turn.
    for (use_index, session_id) in ["cs_0", "cs_1", "cs_2"].iter().enumerate() {
        let session = checkout_session(&merchant, session_id, 4000);
        let bound = platform
            .bind_use(&issued.mandate_id, session_id, 4000, now)
            .expect("bind");

        let receipt = merchant
            .complete_checkout(&session, &MandateRef::Intent(bound.clone()), now)
            .expect("complete");
        assert_eq!(receipt.mandate_id, issued.mandate_id);
        assert_eq!(receipt.amount, 4000);

        let charge = processor
            .authorize(
                &ChargeRequest {
                    credential: "tok_visa_4242".to_string(),
                    amount: 4000,
                    currency: "USD".to_string(),
                    merchant_id: "store-1".to_string(),
                    intent_mandate: Some(bound),
                },
                now,
            )
            .expect("charge");
        assert_eq!(charge.mandate_id.as_deref(), Some(issued.mandate_id.as_str()));

        // All three ledgers agree on how far the mandate has advanced.
        let expected = use_index as u32 + 1;
        for enforcer in [platform.enforcer(), merchant.enforcer(), processor.enforcer()] {
            let entry = enforcer.usage(&issued.mandate_id).expect("entry");
            assert_eq!(entry.use_count, expected);
            assert_eq!(entry.total_spent, 4000 * u64::from(expected));
        }
    }

    // The fourth use dies at the platform before any token is signed.
    let err = platform
        .bind_use(&issued.mandate_id, "cs_3", 1000, now)
        .unwrap_err();
    assert!(matches!(
        err,
        MandateError::LimitExceeded { kind: LimitKind::MaxTotal | LimitKind::MaxUses, .. }
    ));
}

#[test]
fn downstream_layers_reject_what_upstream_never_checked() {
    // A compromised platform can always sign a binding for more than the
    // grant allows; it holds the keys. Model that by binding directly over
    // the issuer token, skipping platform enforcement entirely.
    let issuer = KeyPair::generate("issuer-1");
    let holder = KeyPair::generate("agent-1");
    let now = Utc::now();
    let keys = covenant_core::KeySet { keys: vec![issuer.public_jwk()] };

    let token = covenant_core::issue_intent_mandate(&grant(), &intent(now), &issuer, &holder,
        Duration::days(30), now)
        .expect("issue");
    // 9000 exceeds max_amount 5000; an honest platform would never sign this.
    let forged = bind_key(&token, &holder, "cs_0", Some(9000), Some(0), now).expect("bind");

    // The merchant's own ledger re-runs the checks and rejects.
    let merchant = Merchant::new("merchant-1", "store-1", keys.clone());
    let session = checkout_session(&merchant, "cs_0", 9000);
    let err = merchant
        .complete_checkout(&session, &MandateRef::Intent(forged.clone()), now)
        .unwrap_err();
    assert!(matches!(
        err,
        MandateError::LimitExceeded { kind: LimitKind::MaxAmount, .. }
    ));

    // So does the processor, independently.
    let processor = Processor::new(keys);
    let err = processor
        .authorize(
            &ChargeRequest {
                credential: "tok_visa_4242".to_string(),
                amount: 9000,
                currency: "USD".to_string(),
                merchant_id: "store-1".to_string(),
                intent_mandate: Some(forged),
            },
            now,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        MandateError::LimitExceeded { kind: LimitKind::MaxAmount, .. }
    ));
}

#[test]
fn merchant_rejects_amount_drift_between_binding_and_session() {
    let platform = Platform::new("issuer-1", "agent-1");
    let merchant = Merchant::new("merchant-1", "store-1", platform.key_set());
    let now = Utc::now();

    let issued = platform
        .issue_intent_mandate(&grant(), &intent(now), Duration::days(30), now)
        .expect("issue");
    let bound = platform
        .bind_use(&issued.mandate_id, "cs_0", 4000, now)
        .expect("bind");

    // The session totals more than the use was bound to.
    let session = checkout_session(&merchant, "cs_0", 4500);
    let err = merchant
        .complete_checkout(&session, &MandateRef::Intent(bound), now)
        .unwrap_err();
    assert!(matches!(err, MandateError::ScopeMismatch { .. }));
}

#[test]
fn merchant_outside_scope_rejected_at_merchant_and_processor() {
    let platform = Platform::new("issuer-1", "agent-1");
    let outsider = Merchant::new("merchant-2", "store-2", platform.key_set());
    let processor = Processor::new(platform.key_set());
    let now = Utc::now();

    let issued = platform
        .issue_intent_mandate(&grant(), &intent(now), Duration::days(30), now)
        .expect("issue");
    let bound = platform
        .bind_use(&issued.mandate_id, "cs_0", 4000, now)
        .expect("bind");

    let session = checkout_session(&outsider, "cs_0", 4000);
    let err = outsider
        .complete_checkout(&session, &MandateRef::Intent(bound.clone()), now)
        .unwrap_err();
    assert!(matches!(err, MandateError::MerchantNotAuthorized { .. }));

    let err = processor
        .authorize(
            &ChargeRequest {
                credential: "tok_visa_4242".to_string(),
                amount: 4000,
                currency: "USD".to_string(),
                merchant_id: "store-2".to_string(),
                intent_mandate: Some(bound),
            },
            now,
        )
        .unwrap_err();
    assert!(matches!(err, MandateError::MerchantNotAuthorized { .. }));
}

#[test]
fn processor_rejects_currency_drift() {
    let platform = Platform::new("issuer-1", "agent-1");
    let processor = Processor::new(platform.key_set());
    let now = Utc::now();

    let issued = platform
        .issue_intent_mandate(&grant(), &intent(now), Duration::days(30), now)
        .expect("issue");
    let bound = platform
        .bind_use(&issued.mandate_id, "cs_0", 4000, now)
        .expect("bind");

    let err = processor
        .authorize(
            &ChargeRequest {
                credential: "tok_visa_4242".to_string(),
                amount: 4000,
                currency: "EUR".to_string(),
                merchant_id: "store-1".to_string(),
                intent_mandate: Some(bound),
            },
            now,
        )
        .unwrap_err();
    assert!(matches!(err, MandateError::ScopeMismatch { .. }));
}

#[test]
fn cart_mandate_flow_through_merchant() {
    let platform = Platform::new("issuer-1", "agent-1");
    let merchant = Merchant::new("merchant-1", "store-1", platform.key_set());
    let now = Utc::now();

    let session = checkout_session(&merchant, "cs_9", 4200);
    let mandate = platform
        .issue_cart_mandate(&session, Duration::hours(1), now)
        .expect("issue");

    let receipt = merchant
        .complete_checkout(&session, &MandateRef::Cart(mandate), now)
        .expect("complete");
    assert!(receipt.order_id.starts_with("order_"));
    assert_eq!(receipt.amount, 4200);
}
