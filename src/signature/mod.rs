use base64::{engine::general_purpose, Engine as _};
use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::ledger::Sats;

const WITHDRAWAL_DOMAIN: &[u8] = b"inssats-planned-withdrawal-v1";

/// What a saver signs off on when requesting a planned withdrawal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WithdrawalRequest<'a> {
    pub amount: Sats,
    pub destination: &'a str,
    pub signature: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("malformed destination key: {0}")]
    MalformedKey(String),
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    #[error("signature does not match amount and destination")]
    Mismatch,
}

pub trait SignatureVerifier {
    fn verify(&self, request: &WithdrawalRequest<'_>) -> Result<(), SignatureError>;
}

/// Accepts every request. The signature is only required to be present.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAnySignature;

impl SignatureVerifier for AcceptAnySignature {
    fn verify(&self, _request: &WithdrawalRequest<'_>) -> Result<(), SignatureError> {
        Ok(())
    }
}

/// Treats the destination as a hex Ed25519 public key and checks the saver
/// signature (hex or base64) over [`withdrawal_digest`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, request: &WithdrawalRequest<'_>) -> Result<(), SignatureError> {
        let key = parse_verifying_key(request.destination)?;
        let signature = parse_signature(request.signature)?;
        let digest = withdrawal_digest(request.amount, request.destination);
        key.verify_strict(&digest, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}

pub fn withdrawal_digest(amount: Sats, destination: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(WITHDRAWAL_DOMAIN);
    hasher.update(amount.to_le_bytes());
    hasher.update(destination.trim().as_bytes());
    hasher.finalize().into()
}

/// Sign a withdrawal request, returning the signature in hex.
pub fn sign_withdrawal(key: &SigningKey, amount: Sats, destination: &str) -> String {
    let digest = withdrawal_digest(amount, destination);
    hex::encode(key.sign(&digest).to_bytes())
}

pub fn parse_signing_key(sk_hex: &str) -> Result<SigningKey, SignatureError> {
    let bytes = decode_fixed::<32>(sk_hex, "secret key")
        .map_err(SignatureError::MalformedKey)?;
    Ok(SigningKey::from_bytes(&bytes))
}

pub fn parse_verifying_key(pk_hex: &str) -> Result<VerifyingKey, SignatureError> {
    let bytes =
        decode_fixed::<32>(pk_hex, "public key").map_err(SignatureError::MalformedKey)?;
    VerifyingKey::from_bytes(&bytes).map_err(|e| SignatureError::MalformedKey(e.to_string()))
}

fn parse_signature(encoded: &str) -> Result<Signature, SignatureError> {
    let encoded = encoded.trim();
    let bytes = match hex::decode(encoded) {
        Ok(bytes) => bytes,
        Err(_) => general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| SignatureError::MalformedSignature(e.to_string()))?,
    };
    Signature::from_slice(&bytes).map_err(|e| SignatureError::MalformedSignature(e.to_string()))
}

fn decode_fixed<const N: usize>(value: &str, what: &str) -> Result<[u8; N], String> {
    let bytes = hex::decode(value.trim()).map_err(|e| format!("{what}: {e}"))?;
    if bytes.len() != N {
        return Err(format!(
            "{what} must be {N} bytes ({} hex chars), got {}",
            N * 2,
            bytes.len()
        ));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::OsRng;

    fn keypair() -> (SigningKey, String) {
        let sk = SigningKey::generate(&mut OsRng);
        let pk_hex = hex::encode(sk.verifying_key().as_bytes());
        (sk, pk_hex)
    }

    #[test]
    fn ed25519_accepts_matching_signature() {
        let (sk, pk) = keypair();
        let sig = sign_withdrawal(&sk, 500_000, &pk);
        let request = WithdrawalRequest {
            amount: 500_000,
            destination: &pk,
            signature: &sig,
        };
        Ed25519Verifier.verify(&request).unwrap();
    }

    #[test]
    fn ed25519_accepts_base64_signatures() {
        let (sk, pk) = keypair();
        let raw = sk.sign(&withdrawal_digest(7, &pk)).to_bytes();
        let sig = general_purpose::STANDARD.encode(raw);
        let request = WithdrawalRequest {
            amount: 7,
            destination: &pk,
            signature: &sig,
        };
        Ed25519Verifier.verify(&request).unwrap();
    }

    #[test]
    fn ed25519_rejects_tampered_amount() {
        let (sk, pk) = keypair();
        let sig = sign_withdrawal(&sk, 500_000, &pk);
        let request = WithdrawalRequest {
            amount: 500_001,
            destination: &pk,
            signature: &sig,
        };
        assert!(matches!(
            Ed25519Verifier.verify(&request),
            Err(SignatureError::Mismatch)
        ));
    }

    #[test]
    fn ed25519_rejects_non_key_destination() {
        let request = WithdrawalRequest {
            amount: 1,
            destination: "pk1",
            signature: "sig1",
        };
        assert!(matches!(
            Ed25519Verifier.verify(&request),
            Err(SignatureError::MalformedKey(_))
        ));
    }

    #[test]
    fn signing_key_round_trips_through_hex() {
        let (sk, pk) = keypair();
        let parsed = parse_signing_key(&hex::encode(sk.to_bytes())).unwrap();
        assert_eq!(hex::encode(parsed.verifying_key().as_bytes()), pk);
        assert!(parse_signing_key("abcd").is_err());
    }
}
