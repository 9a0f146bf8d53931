//! P-256 signing keys and their published JWK form.
//!
//! One active key pair per identity, generated at process start and held for
//! the process lifetime. Rotation is out of scope: verifiers fetch whichever
//! key set an identity currently publishes under a stable `kid`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::{EncodedPoint, FieldBytes};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::crypto::jcs::{self, EncodingError};
use crate::error::MandateError;

/// An identity-scoped ECDSA P-256 key pair.
///
/// The private half never leaves this struct; the public half is exported
/// as a [`PublicJwk`] and distributed via a [`KeySet`].
pub struct KeyPair {
    signing_key: SigningKey,
    kid: String,
}

impl KeyPair {
    /// Generate a fresh key pair under a stable key identifier.
    pub fn generate(kid: impl Into<String>) -> Self {
        Self {
            signing_key: SigningKey::random(&mut rand::rngs::OsRng),
            kid: kid.into(),
        }
    }

    /// The key identifier this pair publishes under.
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        *self.signing_key.verifying_key()
    }

    /// Export the public half as a published JWK.
    pub fn public_jwk(&self) -> PublicJwk {
        let point = self.verifying_key().to_encoded_point(false);
        // Uncompressed SEC1 points always carry both coordinates.
        let x = point.x().expect("uncompressed point has x");
        let y = point.y().expect("uncompressed point has y");
        PublicJwk {
            kid: self.kid.clone(),
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x: URL_SAFE_NO_PAD.encode(x),
            y: URL_SAFE_NO_PAD.encode(y),
            alg: "ES256".to_string(),
            use_: "sig".to_string(),
        }
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        f.debug_struct("KeyPair").field("kid", &self.kid).finish()
    }
}

/// A published P-256 verification key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicJwk {
    pub kid: String,
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
    pub alg: String,
    #[serde(rename = "use")]
    pub use_: String,
}

impl PublicJwk {
    /// Reconstruct the verification key. Fails closed on any malformed
    /// coordinate or off-curve point.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, MandateError> {
        if self.kty != "EC" || self.crv != "P-256" {
            return Err(MandateError::malformed(format!(
                "unsupported key type {}/{}",
                self.kty, self.crv
            )));
        }
        decode_point(&self.x, &self.y)
    }

    /// RFC 7638 thumbprint over the required EC members.
    pub fn thumbprint(&self) -> Result<String, EncodingError> {
        let required = json!({
            "crv": self.crv,
            "kty": self.kty,
            "x": self.x,
            "y": self.y,
        });
        let canonical = jcs::to_vec(&required)?;
        Ok(URL_SAFE_NO_PAD.encode(Sha256::digest(&canonical)))
    }

    /// The four-field form embedded as the `cnf` binding key.
    pub fn binding_jwk(&self) -> BindingJwk {
        BindingJwk {
            kty: self.kty.clone(),
            crv: self.crv.clone(),
            x: self.x.clone(),
            y: self.y.clone(),
        }
    }
}

/// The minimal JWK carried in an Issuer Token's `cnf` claim to bind the
/// holder key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    pub y: String,
}

impl BindingJwk {
    /// Reconstruct the bound holder's verification key.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, MandateError> {
        if self.kty != "EC" || self.crv != "P-256" {
            return Err(MandateError::malformed(format!(
                "unsupported binding key type {}/{}",
                self.kty, self.crv
            )));
        }
        decode_point(&self.x, &self.y)
    }
}

fn decode_point(x: &str, y: &str) -> Result<VerifyingKey, MandateError> {
    let x = decode_coordinate(x)?;
    let y = decode_coordinate(y)?;
    let point = EncodedPoint::from_affine_coordinates(
        FieldBytes::from_slice(&x),
        FieldBytes::from_slice(&y),
        false,
    );
    VerifyingKey::from_encoded_point(&point)
        .map_err(|_| MandateError::malformed("public key is not a valid P-256 point"))
}

fn decode_coordinate(value: &str) -> Result<[u8; 32], MandateError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|_| MandateError::malformed("key coordinate is not valid base64url"))?;
    bytes
        .try_into()
        .map_err(|_| MandateError::malformed("key coordinate must be 32 bytes"))
}

/// The published verification-key document for an identity.
///
/// Fetched by verifiers out-of-band; one active key per identity in this
/// design, but the document form allows more.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<PublicJwk>,
}

impl KeySet {
    pub fn new(keys: Vec<PublicJwk>) -> Self {
        Self { keys }
    }

    /// Look up a key by its identifier.
    pub fn find(&self, kid: &str) -> Option<&PublicJwk> {
        self.keys.iter().find(|key| key.kid == kid)
    }
}
