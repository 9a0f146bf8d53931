//! Mandate protocol engine for agent commerce.
//!
//! Deterministic canonical encoding (RFC 8785), detached and embedded ES256
//! signatures, SD-JWT+kb mandate issuance, and bounded-authorization
//! enforcement repeated independently at three non-trusting participants
//! (issuing platform, merchant, payment processor).
//!
//! Given a signed mandate, any verifier holding the platform's published key
//! set can determine what terms were offered and what was agreed to, and can
//! decide against its own ledger whether the agreed bounds are already
//! exhausted, without contacting the issuer.

pub mod crypto;
pub mod enforce;
pub mod error;
pub mod jws;
pub mod ledger;
pub mod mandate;
pub mod merchant;
pub mod platform;
pub mod processor;
pub mod token;

// Convenience re-exports
pub use crypto::{EncodingError, KeyPair, KeySet, PublicJwk};
pub use enforce::{Enforcer, MandateState};
pub use error::{LimitKind, MandateError};
pub use ledger::{UsageEntry, UsageLedger};
pub use mandate::{
    bind_key, issue_cart_mandate, issue_intent_mandate, issuer_key_for, mandate_id,
    verify_cart_mandate, verify_sd_jwt_kb, Authorization, Conversation, IntentClaims,
    IntentRecord, KbClaims, MandateRef, Turn, VerifiedMandate,
};
pub use merchant::{Merchant, OrderReceipt};
pub use platform::{IssuedIntent, Platform};
pub use processor::{ChargeAuthorization, ChargeRequest, Processor};
