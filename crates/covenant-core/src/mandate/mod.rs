//! SD-JWT+kb mandates: issuance, binding, and verification.

pub mod issue;
pub mod types;
pub mod verify;

pub use issue::{bind_key, issue_cart_mandate, issue_intent_mandate};
pub use types::{
    Authorization, Conversation, IntentClaims, IntentRecord, KbClaims, MandateRef, Turn,
    TYP_CHECKOUT_MANDATE, TYP_INTENT_MANDATE, TYP_KEY_BINDING,
};
pub use verify::{
    issuer_key_for, mandate_id, verify_cart_mandate, verify_sd_jwt_kb, VerifiedMandate,
};
