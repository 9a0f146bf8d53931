//! Mandate verification.
//!
//! Verification never trusts an unverified byte: the issuer token's signature
//! and expiry are checked first, the holder key is taken from the verified
//! `cnf` claim, and only then is the key binding token checked against it.

use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::crypto::{BindingJwk, KeySet};
use crate::error::MandateError;
use crate::jws::verify_checkout_body;
use crate::mandate::issue::sd_hash;
use crate::mandate::types::{IntentClaims, KbClaims};
use crate::token::{peek_header, verify_claims};

/// Stable identifier for a mandate: the hex SHA-256 of its issuer token.
///
/// Every binding of the same issuer token shares one id, so usage accounting
/// survives re-presentation.
pub fn mandate_id(issuer_token: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(issuer_token.as_bytes())))
}

/// Output of a successful SD-JWT+kb verification.
#[derive(Debug, Clone)]
pub struct VerifiedMandate {
    /// Verified issuer token claims.
    pub claims: Value,
    /// Verified key binding claims.
    pub kb_claims: KbClaims,
    /// Ledger identity derived from the issuer token.
    pub mandate_id: String,
}

impl VerifiedMandate {
    /// Interpret the issuer claims as an intent mandate grant.
    pub fn intent_claims(&self) -> Result<IntentClaims, MandateError> {
        serde_json::from_value(self.claims.clone())
            .map_err(|_| MandateError::malformed("issuer claims are not an intent grant"))
    }
}

/// Verify an `issuer_token~key_binding_token` presentation.
///
/// When `expected_aud` is `None` the audience claim is accepted as-is; the
/// caller is asserting it has no session to pin the presentation to.
pub fn verify_sd_jwt_kb(
    token: &str,
    issuer_key: &VerifyingKey,
    expected_aud: Option<&str>,
    now: DateTime<Utc>,
) -> Result<VerifiedMandate, MandateError> {
    let (issuer_token, kb_token) = token
        .split_once('~')
        .ok_or_else(|| MandateError::malformed("missing key binding token"))?;
    if kb_token.contains('~') {
        return Err(MandateError::malformed("more than two tilde segments"));
    }

    let claims = verify_claims(issuer_token, issuer_key, now)?;

    let binding: BindingJwk = claims
        .get("cnf")
        .and_then(|cnf| cnf.get("jwk"))
        .cloned()
        .and_then(|jwk| serde_json::from_value(jwk).ok())
        .ok_or_else(|| MandateError::malformed("missing cnf.jwk holder key"))?;
    let holder_key = binding.to_verifying_key()?;

    let kb_value = verify_kb_token(kb_token, &holder_key)?;
    let kb_claims: KbClaims = serde_json::from_value(kb_value)
        .map_err(|_| MandateError::malformed("undecodable key binding claims"))?;

    if kb_claims.sd_hash != sd_hash(issuer_token) {
        debug!("key binding digest does not match issuer token");
        return Err(MandateError::BindingMismatch);
    }

    if let Some(expected) = expected_aud {
        if kb_claims.aud != expected {
            return Err(MandateError::AudienceMismatch {
                expected: expected.to_string(),
                found: kb_claims.aud,
            });
        }
    }

    Ok(VerifiedMandate {
        mandate_id: mandate_id(issuer_token),
        claims,
        kb_claims,
    })
}

/// Key binding tokens carry `iat` but no `exp`; their lifetime rides on the
/// issuer token. Signature and structure checks mirror [`verify_claims`].
fn verify_kb_token(token: &str, holder_key: &VerifyingKey) -> Result<Value, MandateError> {
    use crate::crypto::verify_es256;
    use crate::token::{b64url_decode, ALG_ES256};

    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err(MandateError::malformed("key binding is not three segments"));
    };

    let header = peek_header(token)?;
    if header.alg != ALG_ES256 {
        return Err(MandateError::SignatureInvalid);
    }

    let signature = b64url_decode(signature_b64)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    if !verify_es256(&signature, signing_input.as_bytes(), holder_key) {
        return Err(MandateError::SignatureInvalid);
    }

    let bytes = b64url_decode(claims_b64)?;
    serde_json::from_slice(&bytes)
        .map_err(|_| MandateError::malformed("undecodable key binding claims"))
}

/// Verify a cart mandate against the checkout session it covers.
///
/// The embedded checkout must match the live session on id, total, and line
/// items, and must carry a merchant authorization that verifies under the
/// merchant's key. A session edited after issuance fails here even though
/// its own signature may still be internally consistent.
pub fn verify_cart_mandate(
    token: &str,
    issuer_key: &VerifyingKey,
    session: &Value,
    merchant_key: &VerifyingKey,
    now: DateTime<Utc>,
) -> Result<VerifiedMandate, MandateError> {
    let session_id = session
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| MandateError::malformed("checkout session has no id"))?;

    let verified = verify_sd_jwt_kb(token, issuer_key, Some(session_id), now)?;

    let embedded = verified
        .claims
        .get("checkout")
        .ok_or_else(|| MandateError::malformed("mandate has no embedded checkout"))?;

    for pointer in ["/id", "/totals/total", "/line_items"] {
        if embedded.pointer(pointer) != session.pointer(pointer) {
            debug!(pointer, "mandated checkout diverges from live session");
            return Err(MandateError::scope(format!(
                "checkout field {pointer} changed since mandate issuance"
            )));
        }
    }

    if embedded
        .pointer("/ap2/merchant_authorization")
        .and_then(Value::as_str)
        .is_none()
    {
        return Err(MandateError::scope(
            "mandated checkout carries no merchant authorization",
        ));
    }
    if !verify_checkout_body(embedded, merchant_key) {
        return Err(MandateError::SignatureInvalid);
    }

    Ok(verified)
}

/// Select the issuer verification key for a token by its `kid` header,
/// falling back to the set's first key when the header names none.
pub fn issuer_key_for(keys: &KeySet, token: &str) -> Result<VerifyingKey, MandateError> {
    let issuer_token = token.split('~').next().unwrap_or(token);
    let header = peek_header(issuer_token)?;
    let jwk = match header.kid.as_deref().and_then(|kid| keys.find(kid)) {
        Some(jwk) => jwk,
        None => keys
            .keys
            .first()
            .ok_or_else(|| MandateError::malformed("empty issuer key set"))?,
    };
    jwk.to_verifying_key()
}
