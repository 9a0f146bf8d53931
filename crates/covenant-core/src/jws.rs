//! Detached JWS over canonical checkout bodies.
//!
//! A detached signature is a compact JWS with an empty payload segment
//! (`header..signature`, RFC 7515 appendix F). The signing input is the
//! standard `b64url(header) . b64url(payload)` even though the payload never
//! travels in the token. Payload bytes are the JCS canonical form of the
//! checkout body with the signature envelope field removed, so
//! re-serialization noise never affects verification while any change to the
//! commercial content does.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::ecdsa::VerifyingKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::jcs::{self, EncodingError};
use crate::crypto::{sign_es256, verify_es256, KeyPair};
use crate::error::MandateError;
use crate::token::ALG_ES256;

/// Envelope field on a checkout body that carries protocol metadata,
/// including the merchant's detached signature. It is stripped before
/// canonicalization so the signature never covers itself.
pub const AP2_FIELD: &str = "ap2";

/// Key under [`AP2_FIELD`] holding the merchant's detached JWS.
pub const MERCHANT_AUTHORIZATION_FIELD: &str = "merchant_authorization";

#[derive(Debug, Serialize, Deserialize)]
struct DetachedHeader {
    alg: String,
    kid: String,
}

/// Produce a detached JWS (`header..signature`) over raw payload bytes.
pub fn sign_detached(payload: &[u8], key: &KeyPair) -> Result<String, EncodingError> {
    let header = DetachedHeader {
        alg: ALG_ES256.to_string(),
        kid: key.kid().to_string(),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(jcs::to_vec(&header)?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = sign_es256(signing_input.as_bytes(), key.signing_key());
    Ok(format!("{header_b64}..{}", URL_SAFE_NO_PAD.encode(signature)))
}

/// Verify a detached JWS against raw payload bytes. Fails closed.
pub fn verify_detached(jws: &str, payload: &[u8], key: &VerifyingKey) -> bool {
    let parts: Vec<&str> = jws.split('.').collect();
    let [header_b64, middle, signature_b64] = parts.as_slice() else {
        return false;
    };
    if !middle.is_empty() {
        return false;
    }
    let Ok(header_bytes) = URL_SAFE_NO_PAD.decode(header_b64) else {
        return false;
    };
    let Ok(header) = serde_json::from_slice::<DetachedHeader>(&header_bytes) else {
        return false;
    };
    if header.alg != ALG_ES256 {
        return false;
    }
    let Ok(signature) = URL_SAFE_NO_PAD.decode(signature_b64) else {
        return false;
    };
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{header_b64}.{payload_b64}");
    verify_es256(&signature, signing_input.as_bytes(), key)
}

/// Sign a checkout body in place, attaching the merchant authorization under
/// `ap2.merchant_authorization`. Any existing envelope is replaced.
pub fn sign_checkout_body(body: &mut Value, key: &KeyPair) -> Result<(), MandateError> {
    let mut content = body.clone();
    if let Some(map) = content.as_object_mut() {
        map.remove(AP2_FIELD);
    }
    let canonical = jcs::to_vec(&content)?;
    let jws = sign_detached(&canonical, key)?;

    let map = body
        .as_object_mut()
        .ok_or_else(|| MandateError::malformed("checkout body is not a JSON object"))?;
    let envelope = map
        .entry(AP2_FIELD)
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    if let Some(envelope) = envelope.as_object_mut() {
        envelope.insert(MERCHANT_AUTHORIZATION_FIELD.to_string(), Value::String(jws));
    }
    Ok(())
}

/// Verify the merchant authorization carried on a checkout body.
pub fn verify_checkout_body(body: &Value, key: &VerifyingKey) -> bool {
    let Some(jws) = body
        .get(AP2_FIELD)
        .and_then(|envelope| envelope.get(MERCHANT_AUTHORIZATION_FIELD))
        .and_then(Value::as_str)
    else {
        return false;
    };
    let mut content = body.clone();
    if let Some(map) = content.as_object_mut() {
        map.remove(AP2_FIELD);
    }
    let Ok(canonical) = jcs::to_vec(&content) else {
        return false;
    };
    verify_detached(jws, &canonical, key)
}
