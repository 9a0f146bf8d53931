//! Processor role: the final enforcement layer before money moves.
//!
//! The processor sees a payment credential and, when one is supplied, a
//! bound intent mandate. It verifies and enforces independently of whatever
//! the platform and merchant already decided. A charge that slipped past an
//! upstream layer still fails here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::crypto::KeySet;
use crate::enforce::Enforcer;
use crate::error::MandateError;
use crate::mandate::verify::{issuer_key_for, verify_sd_jwt_kb};

/// A charge presented for authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    /// Tokenized payment credential (`tok_` prefixed).
    pub credential: String,
    /// Charge amount, in minor units.
    pub amount: u64,
    pub currency: String,
    pub merchant_id: String,
    /// Bound intent mandate covering this charge, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_mandate: Option<String>,
}

/// A successful authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeAuthorization {
    pub authorization_id: String,
    pub amount: u64,
    pub currency: String,
    /// Identity of the mandate the charge was enforced under, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandate_id: Option<String>,
}

/// The charging party in a mandate flow.
#[derive(Debug)]
pub struct Processor {
    platform_keys: KeySet,
    enforcer: Enforcer,
}

impl Processor {
    pub fn new(platform_keys: KeySet) -> Self {
        Self {
            platform_keys,
            enforcer: Enforcer::new("processor"),
        }
    }

    /// Authorize a charge.
    ///
    /// The processor holds no checkout session, so a presented mandate's
    /// audience is accepted as bound; amount, currency, merchant scope, and
    /// use sequence are all enforced against the processor's own ledger.
    pub fn authorize(
        &self,
        request: &ChargeRequest,
        now: DateTime<Utc>,
    ) -> Result<ChargeAuthorization, MandateError> {
        if !request.credential.starts_with("tok_") {
            return Err(MandateError::malformed("unrecognized payment credential"));
        }

        let mandate_id = match &request.intent_mandate {
            None => None,
            Some(token) => {
                let issuer_key = issuer_key_for(&self.platform_keys, token)?;
                let verified = verify_sd_jwt_kb(token, &issuer_key, None, now)?;
                let claims = verified.intent_claims()?;

                if claims.authorization.currency != request.currency {
                    return Err(MandateError::scope(format!(
                        "mandate denominated in {} but charge is {}",
                        claims.authorization.currency, request.currency
                    )));
                }
                let bound_amount = verified
                    .kb_claims
                    .amount
                    .ok_or_else(|| MandateError::malformed("use is not bound to an amount"))?;
                if bound_amount != request.amount {
                    return Err(MandateError::scope(format!(
                        "use bound to amount {bound_amount} but charge is {}",
                        request.amount
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
                    request.amount,
                    use_index,
                    Some(&request.merchant_id),
                    now,
                )?;
                Some(verified.mandate_id)
            }
        };

        let authorization = ChargeAuthorization {
            authorization_id: format!("auth_{}", Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
            mandate_id,
        };
        debug!(
            authorization_id = %authorization.authorization_id,
            amount = authorization.amount,
            "charge authorized"
        );
        Ok(authorization)
    }

    /// The processor-side enforcement point, for state and usage queries.
    pub fn enforcer(&self) -> &Enforcer {
        &self.enforcer
    }
}
