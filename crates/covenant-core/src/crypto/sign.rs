//! Raw ES256 signing over byte strings.
//!
//! Signatures are fixed-size 64-byte `r || s` concatenations (the JOSE wire
//! form), not ASN.1 DER. Verification fails closed: malformed input is a
//! failed verification, never an error a caller might misread as success.

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};

/// Byte length of an ES256 signature (32-byte `r`, 32-byte `s`).
pub const SIGNATURE_LEN: usize = 64;

/// Sign with ECDSA P-256 / SHA-256, returning raw `r || s`.
pub fn sign_es256(data: &[u8], key: &SigningKey) -> [u8; SIGNATURE_LEN] {
    let signature: Signature = key.sign(data);
    signature.to_bytes().into()
}

/// Verify a raw `r || s` signature over the supplied bytes.
pub fn verify_es256(signature: &[u8], data: &[u8], key: &VerifyingKey) -> bool {
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(data, &signature).is_ok()
}
