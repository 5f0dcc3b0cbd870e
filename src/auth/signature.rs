//! Personal-sign signature recovery and address verification.
//!
//! Verifies that a message was signed by the holder of a claimed blockchain
//! address using EIP-191 personal-sign semantics: the message is prefixed
//! with `"\x19Ethereum Signed Message:\n" + len`, hashed with Keccak-256,
//! and the signer address is recovered from the 65-byte ECDSA signature.
//!
//! All entry points fail closed: malformed input of any kind yields a
//! non-match, never an error or panic.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use sha3::{Digest, Keccak256};

/// Recover the signer address from `(message, signature)`.
///
/// Returns the `0x`-prefixed lowercase hex address, or `None` if the
/// signature is malformed or recovery fails.
pub fn recover_address(message: &str, signature: &str) -> Option<String> {
    let sig_bytes = decode_hex(signature)?;
    if sig_bytes.len() != 65 {
        return None;
    }

    let signature = Signature::from_slice(&sig_bytes[..64]).ok()?;
    // Wallets emit v as 27/28; raw recovery ids are 0/1.
    let v = sig_bytes[64];
    let recovery_id = RecoveryId::try_from(if v >= 27 { v - 27 } else { v }).ok()?;

    let digest = personal_sign_hash(message);
    let verifying_key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id).ok()?;

    Some(address_from_key(&verifying_key))
}

/// Verify that `signature` over `message` recovers to `address`.
///
/// Address comparison is case-insensitive (checksummed and lowercase forms
/// are equivalent). Never errors: any failure yields `false`.
pub fn verify(address: &str, message: &str, signature: &str) -> bool {
    match recover_address(message, signature) {
        Some(recovered) => addresses_equal(&recovered, address),
        None => false,
    }
}

/// Verify `signature` against an ordered list of candidate addresses.
///
/// Returns the first candidate (as supplied, original casing preserved)
/// that matches the recovered signer. The first-match order determines
/// which linked address is treated as the recovered identity, so it must
/// not be reordered.
pub fn verify_any<'a, I>(candidates: I, message: &str, signature: &str) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let recovered = recover_address(message, signature)?;
    candidates
        .into_iter()
        .find(|candidate| addresses_equal(&recovered, candidate))
        .map(|candidate| candidate.to_string())
}

/// EIP-191 personal-sign hash of a message.
fn personal_sign_hash(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()));
    hasher.update(message.as_bytes());
    hasher.finalize().into()
}

/// Derive the `0x`-prefixed lowercase address from a verifying key.
fn address_from_key(key: &VerifyingKey) -> String {
    let point = key.to_encoded_point(false);
    // Skip the 0x04 SEC1 tag; the address is the last 20 bytes of the
    // Keccak-256 hash of the 64-byte public key.
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

fn addresses_equal(a: &str, b: &str) -> bool {
    strip_0x(a).eq_ignore_ascii_case(strip_0x(b))
}

fn strip_0x(s: &str) -> &str {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s)
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    hex::decode(strip_0x(s)).ok()
}
