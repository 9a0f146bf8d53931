//! Merchant role: signs checkout sessions and gates order completion.
//!
//! The merchant is the second enforcement layer. It never trusts that the
//! platform already checked anything; the presented mandate is re-verified
//! and the grant re-enforced against the merchant's own ledger.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::{KeyPair, KeySet};
use crate::enforce::Enforcer;
use crate::error::MandateError;
use crate::jws;
use crate::mandate::types::MandateRef;
use crate::mandate::verify::{issuer_key_for, verify_cart_mandate, verify_sd_jwt_kb};

/// Completed order evidence returned by [`Merchant::complete_checkout`].
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub order_id: String,
    pub mandate_id: String,
    /// Amount charged, in minor units.
    pub amount: u64,
}

/// The selling party in a mandate flow.
#[derive(Debug)]
pub struct Merchant {
    keys: KeyPair,
    store_id: String,
    platform_keys: KeySet,
    enforcer: Enforcer,
}

impl Merchant {
    pub fn new(kid: impl Into<String>, store_id: impl Into<String>, platform_keys: KeySet) -> Self {
        let store_id = store_id.into();
        Self {
            keys: KeyPair::generate(kid),
            enforcer: Enforcer::new(format!("merchant:{store_id}")),
            store_id,
            platform_keys,
        }
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    /// Key other parties verify this merchant's checkout signatures with.
    pub fn verifying_key(&self) -> p256::ecdsa::VerifyingKey {
        self.keys.verifying_key()
    }

    /// Attach this merchant's authorization to a checkout session.
    pub fn sign_checkout(&self, session: &mut Value) -> Result<(), MandateError> {
        jws::sign_checkout_body(session, &self.keys)
    }

    /// Whether a checkout session carries this merchant's valid signature.
    pub fn verify_own_authorization(&self, session: &Value) -> bool {
        jws::verify_checkout_body(session, &self.keys.verifying_key())
    }

    /// Complete a checkout under a presented mandate.
    ///
    /// A cart mandate must cover this exact session. An intent mandate must
    /// be bound to this session, to the session's total, and to the next
    /// unused index; the grant is then enforced with this store as the
    /// merchant scope.
    pub fn complete_checkout(
        &self,
        session: &Value,
        mandate: &MandateRef,
        now: DateTime<Utc>,
    ) -> Result<OrderReceipt, MandateError> {
        let amount = session_total(session)?;
        let session_id = session
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| MandateError::malformed("checkout session has no id"))?;

        let mandate_id = match mandate {
            MandateRef::Missing => return Err(MandateError::MandateRequired),
            MandateRef::Cart(token) => {
                let issuer_key = issuer_key_for(&self.platform_keys, token)?;
                let verified = verify_cart_mandate(
                    token,
                    &issuer_key,
                    session,
                    &self.keys.verifying_key(),
                    now,
                )?;
                verified.mandate_id
            }
            MandateRef::Intent(token) => {
                let issuer_key = issuer_key_for(&self.platform_keys, token)?;
                let verified = verify_sd_jwt_kb(token, &issuer_key, Some(session_id), now)?;
                let claims = verified.intent_claims()?;

                let bound_amount = verified
                    .kb_claims
                    .amount
                    .ok_or_else(|| MandateError::malformed("use is not bound to an amount"))?;
                if bound_amount != amount {
                    return Err(MandateError::scope(format!(
                        "use bound to amount {bound_amount} but session totals {amount}"
                    )));
                }
                let use_index = verified
                    .kb_claims
                    .use_index
                    .ok_or_else(|| MandateError::malformed("use is not bound to an index"))?;

                self.enforcer.authorize_use(
                    &claims.authorization,
                    claims.exp,
                    &verified.mandate_id,
                    amount,
                    use_index,
                    Some(&self.store_id),
                    now,
                )?;
                verified.mandate_id
            }
        };

        let order_id = format!("order_{}", Uuid::new_v4().simple());
        debug!(%order_id, %mandate_id, amount, "checkout completed");
        Ok(OrderReceipt {
            order_id,
            mandate_id,
            amount,
        })
    }

    /// The merchant-side enforcement point, for state and usage queries.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }
}

/// Read a checkout session's total in minor units.
pub fn session_total(session: &Value) -> Result<u64, MandateError> {
    session
        .pointer("/totals/total")
        .and_then(Value::as_u64)
        .ok_or_else(|| MandateError::malformed("checkout session has no integer total"))
}
