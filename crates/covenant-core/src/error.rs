//! Error taxonomy for the mandate protocol engine.
//!
//! Every verification failure is terminal for the request it rejects:
//! retrying a cryptographic or policy failure cannot change its outcome.
//! Variants carry structured fields so an orchestrator can explain a
//! rejection (or abandon an autonomous flow) without parsing message text.

use thiserror::Error;

pub use crate::crypto::jcs::EncodingError;

/// Which authorization bound a rejected use ran into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// Per-transaction cap (`authorization.max_amount`).
    MaxAmount,
    /// Cumulative spend cap (`authorization.max_total`).
    MaxTotal,
    /// Use-count cap (`authorization.max_uses`).
    MaxUses,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MaxAmount => f.write_str("max_amount"),
            Self::MaxTotal => f.write_str("max_total"),
            Self::MaxUses => f.write_str("max_uses"),
        }
    }
}

/// Verification and enforcement errors.
#[derive(Debug, Error)]
pub enum MandateError {
    /// A value could not be canonically encoded (caller's bug).
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// A token or claim set is structurally invalid.
    #[error("malformed token: {reason}")]
    Malformed { reason: String },

    /// Cryptographic mismatch. Always fail closed, never partial trust.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Past `exp`. Terminal regardless of ledger state.
    #[error("mandate expired at {expired_at}")]
    Expired { expired_at: i64 },

    /// The Key-Binding Token's `sd_hash` does not match the Issuer Token it
    /// was presented with.
    #[error("key binding sd_hash does not match issuer token")]
    BindingMismatch,

    /// The Key-Binding Token was bound to a different audience.
    #[error("key binding audience mismatch: expected {expected}, found {found}")]
    AudienceMismatch { expected: String, found: String },

    /// An authorization bound would be exceeded by this use.
    #[error("{kind} exceeded: requested {requested}, limit {limit}")]
    LimitExceeded {
        kind: LimitKind,
        limit: u64,
        requested: u64,
    },

    /// Out-of-order or replayed `use_index`; uses are strictly sequential.
    #[error("use_index {found} does not match expected next index {expected}")]
    UseIndexMismatch { expected: u32, found: u32 },

    /// The transacting merchant is not listed in the mandate's scope.
    #[error("merchant {merchant_id} is not authorized by this mandate")]
    MerchantNotAuthorized { merchant_id: String },

    /// Neither a cart nor an intent mandate accompanied a request that
    /// requires one.
    #[error("a cart or intent mandate is required")]
    MandateRequired,

    /// This participant's ledger has no record of the mandate. Distinct
    /// from expired or exhausted.
    #[error("no usage record for mandate {mandate_id}")]
    UnknownMandate { mandate_id: String },

    /// The mandate does not cover this transaction (stale embedded checkout,
    /// amount mismatch, missing claim).
    #[error("mandate scope mismatch: {reason}")]
    ScopeMismatch { reason: String },
}

impl MandateError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub(crate) fn scope(reason: impl Into<String>) -> Self {
        Self::ScopeMismatch {
            reason: reason.into(),
        }
    }
}
