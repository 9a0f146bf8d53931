//! Cryptographic primitives: canonical encoding, P-256 keys, raw ES256.

pub mod jcs;
pub mod keys;
pub mod sign;

pub use jcs::EncodingError;
pub use keys::{BindingJwk, KeyPair, KeySet, PublicJwk};
pub use sign::{sign_es256, verify_es256, SIGNATURE_LEN};
