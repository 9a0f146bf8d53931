//! Compact JOSE tokens.
//!
//! Tokens are `base64url(header) . base64url(payload) . base64url(signature)`
//! with unpadded url-safe base64 for every segment. Both the header and the
//! payload are canonicalized before encoding so a claim set has exactly one
//! token body for a given key.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use p256::ecdsa::VerifyingKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::crypto::jcs::EncodingError;
use crate::crypto::{sign_es256, verify_es256, KeyPair};
use crate::error::MandateError;

/// The only signature algorithm this crate produces or accepts.
pub const ALG_ES256: &str = "ES256";

/// JOSE protected header for compact tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    pub fn new(typ: impl Into<String>) -> Self {
        Self {
            alg: ALG_ES256.to_string(),
            typ: typ.into(),
            kid: None,
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

pub(crate) fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub(crate) fn b64url_decode(segment: &str) -> Result<Vec<u8>, MandateError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| MandateError::malformed("invalid base64url segment"))
}

/// Sign a claim set into a compact token.
pub fn sign_claims<T: Serialize>(
    header: &TokenHeader,
    claims: &T,
    key: &KeyPair,
) -> Result<String, EncodingError> {
    let header_b64 = b64url_encode(&crate::crypto::jcs::to_vec(header)?);
    let claims_b64 = b64url_encode(&crate::crypto::jcs::to_vec(claims)?);
    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature = sign_es256(signing_input.as_bytes(), key.signing_key());
    Ok(format!("{signing_input}.{}", b64url_encode(&signature)))
}

/// Verify a compact token's signature and expiry, returning its claims.
///
/// The `exp` claim is required and compared against `now`; a token whose
/// expiry has passed (or is exactly now) is rejected.
pub fn verify_claims(
    token: &str,
    key: &VerifyingKey,
    now: DateTime<Utc>,
) -> Result<Value, MandateError> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, signature_b64] = parts.as_slice() else {
        return Err(MandateError::malformed("token is not three dot segments"));
    };

    let header: TokenHeader = decode_segment(header_b64)?;
    if header.alg != ALG_ES256 {
        return Err(MandateError::SignatureInvalid);
    }

    let signature = b64url_decode(signature_b64)?;
    let signing_input = format!("{header_b64}.{claims_b64}");
    if !verify_es256(&signature, signing_input.as_bytes(), key) {
        return Err(MandateError::SignatureInvalid);
    }

    let claims: Value = decode_segment(claims_b64)?;
    let exp = claims
        .get("exp")
        .and_then(Value::as_i64)
        .ok_or_else(|| MandateError::malformed("missing exp claim"))?;
    if now.timestamp() >= exp {
        return Err(MandateError::Expired { expired_at: exp });
    }

    Ok(claims)
}

/// Decode a token's header without verifying anything.
pub fn peek_header(token: &str) -> Result<TokenHeader, MandateError> {
    let header_b64 = token
        .split('.')
        .next()
        .ok_or_else(|| MandateError::malformed("empty token"))?;
    decode_segment(header_b64)
}

/// Decode a token's header and claims without signature or expiry checks.
///
/// For inspection tooling only. Never feed the result into an authorization
/// decision.
pub fn decode_unverified(token: &str) -> Result<(TokenHeader, Value), MandateError> {
    let parts: Vec<&str> = token.split('.').collect();
    let [header_b64, claims_b64, _] = parts.as_slice() else {
        return Err(MandateError::malformed("token is not three dot segments"));
    };
    Ok((decode_segment(header_b64)?, decode_segment(claims_b64)?))
}

fn decode_segment<T: DeserializeOwned>(segment: &str) -> Result<T, MandateError> {
    let bytes = b64url_decode(segment)?;
    serde_json::from_slice(&bytes).map_err(|_| MandateError::malformed("undecodable segment"))
}
