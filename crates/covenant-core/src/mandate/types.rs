//! Mandate claim structures and token type constants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::BindingJwk;

/// `typ` header for a cart mandate issuer token.
pub const TYP_CHECKOUT_MANDATE: &str = "checkout-mandate+sd-jwt";

/// `typ` header for an intent mandate issuer token.
pub const TYP_INTENT_MANDATE: &str = "intent-mandate+sd-jwt";

/// `typ` header for a key binding token.
pub const TYP_KEY_BINDING: &str = "kb+jwt";

/// Spending bounds granted to an agent by an intent mandate.
///
/// All amounts are integer minor units (cents for USD). An empty
/// `merchant_ids` list authorizes any merchant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    /// Largest single transaction, in minor units.
    pub max_amount: u64,
    /// Cumulative spend ceiling across all uses, in minor units.
    pub max_total: u64,
    /// ISO 4217 currency code the bounds are denominated in.
    pub currency: String,
    /// Merchants the agent may transact with; empty means unrestricted.
    pub merchant_ids: Vec<String>,
    /// Maximum number of distinct uses.
    pub max_uses: u32,
}

impl Authorization {
    /// Whether `merchant_id` falls inside this grant's merchant scope.
    pub fn permits_merchant(&self, merchant_id: &str) -> bool {
        self.merchant_ids.is_empty() || self.merchant_ids.iter().any(|m| m == merchant_id)
    }
}

/// One message of the conversation that produced an intent mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: String,
    pub content: String,
}

/// Transcript evidence embedded in an intent mandate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub model: String,
    pub turns: Vec<Turn>,
    pub turn_count: usize,
}

impl Conversation {
    pub fn new(model: impl Into<String>, turns: Vec<Turn>) -> Self {
        let turn_count = turns.len();
        Self {
            model: model.into(),
            turns,
            turn_count,
        }
    }
}

/// What the user asked for, with the conversation that substantiates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRecord {
    pub summary: String,
    pub conversation: Conversation,
    pub created_at: DateTime<Utc>,
}

/// A mandate presented alongside a checkout completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MandateRef {
    /// Full SD-JWT+kb cart mandate.
    Cart(String),
    /// Full SD-JWT+kb intent mandate bound to this checkout.
    Intent(String),
    /// No mandate was presented.
    Missing,
}

/// Holder key confirmation claim (RFC 7800 `cnf`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cnf {
    pub jwk: BindingJwk,
}

/// Claim body of an intent mandate issuer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentClaims {
    pub authorization: Authorization,
    pub intent: IntentRecord,
    pub iat: i64,
    pub exp: i64,
    pub cnf: Cnf,
}

/// Claim body of a key binding token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbClaims {
    pub aud: String,
    pub iat: i64,
    pub nonce: String,
    pub sd_hash: String,
    /// Amount this use is bound to, in minor units.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Position of this use in the mandate's sequence, starting at zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_index: Option<u32>,
}
