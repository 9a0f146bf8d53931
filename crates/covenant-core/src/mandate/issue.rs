//! Mandate issuance: issuer tokens and holder key binding.
//!
//! A presentable mandate is `issuer_token ~ key_binding_token`. The issuer
//! token carries the grant and a `cnf.jwk` holder key; the key binding token
//! is signed by that holder key and pins the presentation to an audience,
//! and optionally to an amount and a use index.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use crate::crypto::jcs::EncodingError;
use crate::crypto::{BindingJwk, KeyPair};
use crate::mandate::types::{
    Authorization, IntentRecord, KbClaims, TYP_CHECKOUT_MANDATE, TYP_INTENT_MANDATE,
    TYP_KEY_BINDING,
};
use crate::token::{sign_claims, TokenHeader};

/// Digest linking a key binding token to the issuer token it presents.
pub(crate) fn sd_hash(issuer_token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(issuer_token.as_bytes()))
}

fn fresh_nonce() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 16]>())
}

fn sign_issuer_token(
    mut claims: Map<String, Value>,
    typ: &str,
    issuer: &KeyPair,
    holder_jwk: &BindingJwk,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, EncodingError> {
    claims.insert("iat".to_string(), json!(now.timestamp()));
    claims.insert("exp".to_string(), json!((now + ttl).timestamp()));
    claims.insert("cnf".to_string(), json!({ "jwk": holder_jwk }));
    let header = TokenHeader::new(typ).with_kid(issuer.kid());
    sign_claims(&header, &Value::Object(claims), issuer)
}

/// Bind a holder's key to an issuer token, producing a presentable mandate.
pub fn bind_key(
    issuer_token: &str,
    holder: &KeyPair,
    audience: &str,
    amount: Option<u64>,
    use_index: Option<u32>,
    now: DateTime<Utc>,
) -> Result<String, EncodingError> {
    let claims = KbClaims {
        aud: audience.to_string(),
        iat: now.timestamp(),
        nonce: fresh_nonce(),
        sd_hash: sd_hash(issuer_token),
        amount,
        use_index,
    };
    let header = TokenHeader::new(TYP_KEY_BINDING);
    let kb_token = sign_claims(&header, &claims, holder)?;
    Ok(format!("{issuer_token}~{kb_token}"))
}

/// Issue a cart mandate over a finalized checkout session.
///
/// The full checkout body is embedded in the issuer token and the key
/// binding audience is the checkout session id, so the mandate is only
/// presentable against that exact session.
pub fn issue_cart_mandate(
    checkout: &Value,
    issuer: &KeyPair,
    holder: &KeyPair,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, EncodingError> {
    let session_id = checkout
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let mut claims = Map::new();
    claims.insert("checkout".to_string(), checkout.clone());
    let issuer_token = sign_issuer_token(
        claims,
        TYP_CHECKOUT_MANDATE,
        issuer,
        &holder.public_jwk().binding_jwk(),
        ttl,
        now,
    )?;
    bind_key(&issuer_token, holder, &session_id, None, None, now)
}

/// Issue an intent mandate issuer token carrying a spending grant.
///
/// Returns the issuer token only. Each use is bound separately via
/// [`bind_key`] with the checkout session as audience.
pub fn issue_intent_mandate(
    authorization: &Authorization,
    intent: &IntentRecord,
    issuer: &KeyPair,
    holder: &KeyPair,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, EncodingError> {
    let mut claims = Map::new();
    claims.insert(
        "authorization".to_string(),
        serde_json::to_value(authorization).map_err(EncodingError::from)?,
    );
    claims.insert(
        "intent".to_string(),
        serde_json::to_value(intent).map_err(EncodingError::from)?,
    );
    sign_issuer_token(
        claims,
        TYP_INTENT_MANDATE,
        issuer,
        &holder.public_jwk().binding_jwk(),
        ttl,
        now,
    )
}
