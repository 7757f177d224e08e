use std::str::FromStr;

use alloy_primitives::{Address, eip191_hash_message, keccak256};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

pub const SIGNATURE_BYTES: usize = 65;
pub const MAX_WALLET_ADDRESS_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OwnershipError {
    #[error("Wallet address cannot be empty")]
    EmptyAddress,
    #[error("Invalid wallet address {0}")]
    InvalidAddress(String),
    #[error("Signature cannot be empty")]
    EmptySignature,
    #[error("Failed to decode signature as hex or base64")]
    UndecodableSignature,
    #[error("Signature must be {SIGNATURE_BYTES} bytes, got {0}")]
    SignatureLength(usize),
    #[error("Unsupported signature recovery byte {0}")]
    RecoveryByte(u8),
    #[error("Malformed signature")]
    MalformedSignature,
    #[error("Signature verification failed")]
    SignerMismatch { expected: Address, recovered: Address },
}

/// Message a claimant signs to prove control of `wallet`.
pub fn challenge_message(wallet: &Address, distribution_id: &str) -> String {
    format!("Verify ownership of wallet {wallet} for Shagun distribution {distribution_id}")
}

pub fn parse_wallet_address(value: &str) -> Result<Address, OwnershipError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OwnershipError::EmptyAddress);
    }
    if trimmed.len() > MAX_WALLET_ADDRESS_LEN {
        let prefix: String = trimmed.chars().take(MAX_WALLET_ADDRESS_LEN).collect();
        return Err(OwnershipError::InvalidAddress(prefix));
    }
    Address::from_str(trimmed).map_err(|_| OwnershipError::InvalidAddress(trimmed.to_string()))
}

/// Lowercase `0x`-prefixed rendering used in JSON bodies and session keys.
pub fn lowercase_address(address: &Address) -> String {
    format!("{address:#x}")
}

pub fn decode_signature(value: &str) -> Result<[u8; SIGNATURE_BYTES], OwnershipError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(OwnershipError::EmptySignature);
    }

    let bytes = match hex::decode(strip_hex_prefix(trimmed)) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        _ => BASE64_STANDARD
            .decode(trimmed)
            .map_err(|_| OwnershipError::UndecodableSignature)?,
    };

    <[u8; SIGNATURE_BYTES]>::try_from(bytes.as_slice())
        .map_err(|_| OwnershipError::SignatureLength(bytes.len()))
}

/// Recovers the address that produced an EIP-191 `personal_sign` signature.
pub fn recover_signer(
    message: &str,
    signature: &[u8; SIGNATURE_BYTES],
) -> Result<Address, OwnershipError> {
    let v = signature[64];
    let recovery_byte = match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        other => return Err(OwnershipError::RecoveryByte(other)),
    };
    let recovery_id =
        RecoveryId::from_byte(recovery_byte).ok_or(OwnershipError::RecoveryByte(v))?;
    let parsed =
        Signature::from_slice(&signature[..64]).map_err(|_| OwnershipError::MalformedSignature)?;

    let digest = eip191_hash_message(message);
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &parsed, recovery_id)
        .map_err(|_| OwnershipError::MalformedSignature)?;
    Ok(address_of(&key))
}

/// Checks that `signature` over the challenge for `distribution_id` was made by `wallet`.
pub fn verify_ownership(
    wallet: &Address,
    distribution_id: &str,
    signature: &str,
) -> Result<(), OwnershipError> {
    let decoded = decode_signature(signature)?;
    let message = challenge_message(wallet, distribution_id);
    let recovered = recover_signer(&message, &decoded)?;
    if recovered != *wallet {
        return Err(OwnershipError::SignerMismatch {
            expected: *wallet,
            recovered,
        });
    }
    Ok(())
}

fn address_of(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}
