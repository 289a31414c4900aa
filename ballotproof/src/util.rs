use crate::*;
use chrono::{DateTime, SubsecRound, Utc};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;

/// Number of random bytes in a nonce
pub const NONCE_LEN: usize = 16;

/// Generate a fresh wallet: a secp256k1 signing key and its address
pub fn generate_wallet() -> (SigningKey, Address) {
    let secret = SigningKey::random(&mut OsRng);
    let address = Address::from_verifying_key(secret.verifying_key());
    (secret, address)
}

/// Sign `message` the way a wallet's personal-sign does, returning `0x`-prefixed `r || s || v` hex
pub fn sign_message(secret: &SigningKey, message: &str) -> Result<String, Error> {
    let digest = personal_message_digest(message);
    let (signature, recovery_id) = secret
        .sign_prehash_recoverable(&digest)
        .map_err(|e| Error::MalformedSignature(e.to_string()))?;

    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(27 + recovery_id.to_byte());
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// A fresh random nonce, hex encoded
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Current time at the millisecond precision records are stored with
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}
