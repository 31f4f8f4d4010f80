//! SECP256k1 key generation, ECDSA-with-SHA256 signing and verification.
//!
//! Signing always happens over the canonical JSON encoding (see
//! [`crate::hash`]) of the value being signed, never over raw bytes chosen
//! by the caller — this is what lets a peer reconstruct the same bytes and
//! verify a signature it received over the wire.

use crate::error::BlockchainError;
use crate::hash::canonical_json;
use crate::Result;
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rand_core::OsRng;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A SECP256k1 private (signing) key. Zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct PrivateKey(#[zeroize(skip)] SigningKey);

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey").field("key", &"<redacted>").finish()
    }
}

/// A SECP256k1 public key, compared, transmitted, and hashed in its
/// PEM-encoded (SubjectPublicKeyInfo) form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    pem: String,
    key: VerifyingKey,
}

/// A generated keypair: a private key and its corresponding public key.
#[derive(Debug)]
pub struct KeyPair {
    pub private_key: PrivateKey,
    pub public_key: PublicKey,
}

/// An ECDSA `(r, s)` signature pair, the wire form required by the
/// transaction `input.signature` field: a two-element array of decimal
/// integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    r: String,
    s: String,
}

impl PrivateKey {
    /// Generates a fresh random private key.
    #[must_use]
    pub fn generate() -> Self {
        Self(SigningKey::random(&mut OsRng))
    }

    /// Signs `value`'s canonical JSON encoding, returning the `(r, s)` pair.
    pub fn sign<T: Serialize>(&self, value: &T) -> Signature {
        let message = canonical_json(value);
        let signature: EcdsaSignature = self.0.sign(message.as_bytes());
        Signature::from_ecdsa(&signature)
    }

    fn public_key(&self) -> Result<PublicKey> {
        PublicKey::from_verifying_key(*self.0.verifying_key())
    }
}

impl PublicKey {
    fn from_verifying_key(key: VerifyingKey) -> Result<Self> {
        let pem = key
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        Ok(Self { pem, key })
    }

    /// Parses a PEM-encoded (SubjectPublicKeyInfo) public key.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let key = VerifyingKey::from_public_key_pem(pem)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        Ok(Self {
            pem: pem.to_string(),
            key,
        })
    }

    /// Returns the PEM-encoded form of this public key, embedded newlines
    /// included — this is the exact string compared, transmitted, and
    /// hashed.
    #[must_use]
    pub fn as_pem(&self) -> &str {
        &self.pem
    }

    /// Verifies `signature` against `value`'s canonical JSON encoding.
    ///
    /// Returns `Ok(false)` when the signature simply doesn't match (the
    /// `InvalidSignature` outcome); propagates any other failure (malformed
    /// signature components).
    pub fn verify<T: Serialize>(&self, value: &T, signature: &Signature) -> Result<bool> {
        let message = canonical_json(value);
        let ecdsa_signature = signature.to_ecdsa()?;
        match self.key.verify(message.as_bytes(), &ecdsa_signature) {
            Ok(()) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

impl KeyPair {
    /// Generates a new SECP256k1 keypair.
    pub fn generate() -> Result<Self> {
        let private_key = PrivateKey::generate();
        let public_key = private_key.public_key()?;
        Ok(Self {
            private_key,
            public_key,
        })
    }
}

impl Signature {
    fn from_ecdsa(signature: &EcdsaSignature) -> Self {
        let (r, s) = (signature.r(), signature.s());
        Self {
            r: be_bytes_to_decimal(&r.to_bytes()),
            s: be_bytes_to_decimal(&s.to_bytes()),
        }
    }

    fn to_ecdsa(&self) -> Result<EcdsaSignature> {
        let r_bytes = decimal_to_be_bytes(&self.r, 32)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        let s_bytes = decimal_to_be_bytes(&self.s, 32)
            .map_err(|e| BlockchainError::CryptographicError(e.to_string()))?;
        EcdsaSignature::from_scalars(
            <[u8; 32]>::try_from(r_bytes.as_slice()).unwrap(),
            <[u8; 32]>::try_from(s_bytes.as_slice()).unwrap(),
        )
        .map_err(|_| BlockchainError::InvalidSignature)
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(2))?;
        seq.serialize_element(&decimal_as_number(&self.r).map_err(serde::ser::Error::custom)?)?;
        seq.serialize_element(&decimal_as_number(&self.s).map_err(serde::ser::Error::custom)?)?;
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a two-element array of decimal integers")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<Signature, A::Error> {
                let r: serde_json::Number = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                let s: serde_json::Number = seq
                    .next_element()?
                    .ok_or_else(|| de::Error::invalid_length(1, &self))?;
                Ok(Signature {
                    r: r.to_string(),
                    s: s.to_string(),
                })
            }
        }

        deserializer.deserialize_seq(SignatureVisitor)
    }
}

/// Parses a decimal digit string into a `serde_json::Number` so it
/// serializes as a bare JSON integer literal, matching the wire contract.
fn decimal_as_number(decimal: &str) -> std::result::Result<serde_json::Number, String> {
    serde_json::from_str(decimal).map_err(|e| format!("not a decimal integer: {e}"))
}

/// Converts a big-endian byte string to its decimal representation via
/// repeated division by 10 (schoolbook base conversion — `k256`'s scalars
/// don't carry a decimal formatter of their own).
fn be_bytes_to_decimal(bytes: &[u8]) -> String {
    let mut digits = bytes.to_vec();
    let mut output = Vec::new();
    loop {
        let mut remainder: u32 = 0;
        let mut all_zero = true;
        for byte in digits.iter_mut() {
            let acc = (remainder << 8) | u32::from(*byte);
            *byte = (acc / 10) as u8;
            remainder = acc % 10;
            if *byte != 0 {
                all_zero = false;
            }
        }
        output.push(b'0' + remainder as u8);
        if all_zero {
            break;
        }
    }
    output.reverse();
    String::from_utf8(output).expect("ASCII digits only")
}

/// Converts a decimal digit string back to a fixed-width big-endian byte
/// string, the inverse of [`be_bytes_to_decimal`].
fn decimal_to_be_bytes(decimal: &str, width: usize) -> std::result::Result<Vec<u8>, String> {
    let mut bytes = vec![0u8; width];
    for ch in decimal.chars() {
        let digit = ch
            .to_digit(10)
            .ok_or_else(|| format!("'{ch}' is not a decimal digit"))?;
        let mut carry = digit;
        for byte in bytes.iter_mut().rev() {
            let acc = u32::from(*byte) * 10 + carry;
            *byte = (acc & 0xFF) as u8;
            carry = acc >> 8;
        }
        if carry != 0 {
            return Err("decimal value too large for target width".to_string());
        }
    }
    Ok(bytes)
}
