//! Bounded-authorization enforcement.
//!
//! One [`Enforcer`] holds one [`UsageLedger`] and makes accept/reject
//! decisions against a verified grant. Each party in a flow runs its own
//! enforcer over its own ledger, so a check skipped upstream is still made
//! downstream. Counters move only on accept; a rejected attempt leaves the
//! ledger exactly as it found it.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{LimitKind, MandateError};
use crate::ledger::{UsageEntry, UsageLedger};
use crate::mandate::types::Authorization;

/// Lifecycle position of a mandate as one enforcer sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MandateState {
    /// No use has been attempted against this ledger.
    Unseen,
    /// Uses remain within every limit.
    Active,
    /// A count or amount limit leaves no room for further use.
    Exhausted,
    /// The validity window has passed.
    Expired,
}

/// A single party's enforcement point.
#[derive(Debug)]
pub struct Enforcer {
    authority: String,
    ledger: UsageLedger,
}

impl Enforcer {
    /// `authority` names the party this enforcer decides for; it appears in
    /// decision logs so cross-layer traces stay attributable.
    pub fn new(authority: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            ledger: UsageLedger::new(),
        }
    }

    /// Decide one use at the caller-presented `use_index`.
    ///
    /// Checks run in a fixed order: expiry, merchant scope, use index,
    /// per-transaction amount, cumulative total, use count. The first
    /// failure wins and nothing is recorded. On accept the entry is
    /// advanced and its new totals returned.
    #[allow(clippy::too_many_arguments)]
    pub fn authorize_use(
        &self,
        grant: &Authorization,
        exp: i64,
        mandate_id: &str,
        amount: u64,
        use_index: u32,
        merchant_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<UsageEntry, MandateError> {
        self.check_window_and_scope(grant, exp, merchant_id, now)?;
        self.ledger.with_entry(mandate_id, |entry| {
            if use_index != entry.use_count {
                warn!(
                    authority = %self.authority,
                    mandate_id,
                    presented = use_index,
                    expected = entry.use_count,
                    "use index out of sequence"
                );
                return Err(MandateError::UseIndexMismatch {
                    expected: entry.use_count,
                    found: use_index,
                });
            }
            self.commit(grant, mandate_id, amount, entry)
        })
    }

    /// Decide one use, assigning the next index inside the entry lock.
    ///
    /// For the party that hands out indices: two concurrent bindings of the
    /// same mandate get distinct indices rather than racing for one.
    pub fn authorize_next_use(
        &self,
        grant: &Authorization,
        exp: i64,
        mandate_id: &str,
        amount: u64,
        merchant_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(u32, UsageEntry), MandateError> {
        self.check_window_and_scope(grant, exp, merchant_id, now)?;
        self.ledger.with_entry(mandate_id, |entry| {
            let use_index = entry.use_count;
            let entry = self.commit(grant, mandate_id, amount, entry)?;
            Ok((use_index, entry))
        })
    }

    fn check_window_and_scope(
        &self,
        grant: &Authorization,
        exp: i64,
        merchant_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), MandateError> {
        if now.timestamp() >= exp {
            return Err(MandateError::Expired { expired_at: exp });
        }
        if let Some(merchant_id) = merchant_id {
            if !grant.permits_merchant(merchant_id) {
                warn!(
                    authority = %self.authority,
                    merchant_id,
                    "merchant outside mandate scope"
                );
                return Err(MandateError::MerchantNotAuthorized {
                    merchant_id: merchant_id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn commit(
        &self,
        grant: &Authorization,
        mandate_id: &str,
        amount: u64,
        entry: &mut UsageEntry,
    ) -> Result<UsageEntry, MandateError> {
        if amount > grant.max_amount {
            warn!(
                authority = %self.authority,
                mandate_id,
                amount,
                limit = grant.max_amount,
                "transaction exceeds per-use limit"
            );
            return Err(MandateError::LimitExceeded {
                kind: LimitKind::MaxAmount,
                limit: grant.max_amount,
                requested: amount,
            });
        }
        let would_spend = entry.total_spent.saturating_add(amount);
        if would_spend > grant.max_total {
            warn!(
                authority = %self.authority,
                mandate_id,
                spent = entry.total_spent,
                amount,
                limit = grant.max_total,
                "transaction exceeds cumulative limit"
            );
            return Err(MandateError::LimitExceeded {
                kind: LimitKind::MaxTotal,
                limit: grant.max_total,
                requested: would_spend,
            });
        }
        if entry.use_count >= grant.max_uses {
            warn!(
                authority = %self.authority,
                mandate_id,
                uses = entry.use_count,
                limit = grant.max_uses,
                "mandate use count exhausted"
            );
            return Err(MandateError::LimitExceeded {
                kind: LimitKind::MaxUses,
                limit: u64::from(grant.max_uses),
                requested: u64::from(entry.use_count) + 1,
            });
        }

        entry.total_spent = would_spend;
        entry.use_count += 1;
        debug!(
            authority = %self.authority,
            mandate_id,
            amount,
            total_spent = entry.total_spent,
            use_count = entry.use_count,
            "use authorized"
        );
        Ok(*entry)
    }

    /// Lifecycle position of a mandate against this enforcer's ledger.
    pub fn state(
        &self,
        grant: &Authorization,
        exp: i64,
        mandate_id: &str,
        now: DateTime<Utc>,
    ) -> MandateState {
        if now.timestamp() >= exp {
            return MandateState::Expired;
        }
        let Some(entry) = self.ledger.snapshot(mandate_id) else {
            return MandateState::Unseen;
        };
        if entry.use_count >= grant.max_uses || entry.total_spent >= grant.max_total {
            return MandateState::Exhausted;
        }
        MandateState::Active
    }

    /// Recorded totals for a mandate this enforcer has seen.
    pub fn usage(&self, mandate_id: &str) -> Result<UsageEntry, MandateError> {
        self.ledger
            .snapshot(mandate_id)
            .ok_or_else(|| MandateError::UnknownMandate {
                mandate_id: mandate_id.to_string(),
            })
    }
}
