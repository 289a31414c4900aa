//! Recovery of wallet addresses from personal-message signatures.
//!
//! Signatures follow the wallet `personal_sign` convention: the message is
//! prefixed with `"\x19Ethereum Signed Message:\n" || len`, hashed with
//! keccak-256, and signed with secp256k1. The 65-byte `r || s || v` blob is
//! carried as hex. Nothing here touches state.

use crate::*;
use digest::Digest;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::Keccak256;
use std::fmt;
use std::str::FromStr;

const PERSONAL_MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";
const SIGNATURE_LEN: usize = 65;

/// A 20-byte externally-owned account address
///
/// Parsing accepts any hex case (with or without `0x`); display is always lower-case,
/// so comparing two `Address` values is the case-insensitive comparison wallets expect.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    /// Derive the address of a public key: the last 20 bytes of keccak-256 over
    /// the uncompressed point
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.as_affine().to_encoded_point(false);
        let hash = Keccak256::digest(&point.as_bytes()[1..]);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&hash[12..]);
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let decoded = hex::decode(digits).map_err(|_| Error::InvalidAddress(s.to_owned()))?;
        if decoded.len() != 20 {
            return Err(Error::InvalidAddress(s.to_owned()));
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&decoded);
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// The digest a wallet signs for `message`
pub fn personal_message_digest(message: &str) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(PERSONAL_MESSAGE_PREFIX);
    hasher.update(message.len().to_string().as_bytes());
    hasher.update(message.as_bytes());

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    digest
}

/// Recover the address that signed `message`
///
/// Fails with `MalformedSignature` when the blob is not 65 bytes of hex, carries an
/// unknown recovery byte, or does not describe a point on the curve.
pub fn recover_address(message: &str, signature: &str) -> Result<Address, Error> {
    let trimmed = signature.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|e| Error::MalformedSignature(e.to_string()))?;
    if bytes.len() != SIGNATURE_LEN {
        return Err(Error::MalformedSignature(format!(
            "expected {} bytes, found {}",
            SIGNATURE_LEN,
            bytes.len()
        )));
    }

    let recovery_id = normalize_v(bytes[64])
        .and_then(RecoveryId::from_byte)
        .ok_or_else(|| Error::MalformedSignature(format!("invalid recovery byte {}", bytes[64])))?;
    let signature = Signature::from_slice(&bytes[..64])
        .map_err(|e| Error::MalformedSignature(e.to_string()))?;

    let digest = personal_message_digest(message);
    let key = VerifyingKey::recover_from_prehash(&digest, &signature, recovery_id)
        .map_err(|e| Error::MalformedSignature(e.to_string()))?;

    Ok(Address::from_verifying_key(&key))
}

/// Recover the signer of `message` and require it to be `expected`
pub fn verify_signer(message: &str, signature: &str, expected: &Address) -> Result<(), Error> {
    let recovered = recover_address(message, signature)?;
    if recovered != *expected {
        debug!("signature recovered {} but {} was claimed", recovered, expected);
        return Err(Error::SignatureMismatch);
    }
    Ok(())
}

// Wallets emit v as 0/1, 27/28, or EIP-155 style (35 + 2 * chain_id + {0,1}).
fn normalize_v(v: u8) -> Option<u8> {
    match v {
        0 | 1 => Some(v),
        27 | 28 => Some(v - 27),
        v if v >= 35 => Some((v - 35) % 2),
        _ => None,
    }
}
