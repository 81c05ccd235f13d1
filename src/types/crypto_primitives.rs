/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cryptographic primitives.
//!
//! The definitions and re-exports in this module provide two categories of cryptographic primitives:
//! 1. **Cryptographic Hashes**: provided by the [`sha2`] crate. Structured values are hashed by
//!    feeding their Borsh encoding into SHA256.
//! 2. **Digital Signatures**: provided by the [`ed25519_dalek`] crate. Every signature is over
//!    `network_id ‖ hash` (see [`NetworkID::signing_message`]).

use borsh::BorshSerialize;

use super::data_types::{Address, CryptoHash, NetworkID, SignatureBytes};

// re-exports below.
pub use sha2::Digest;
pub use sha2::Sha256 as CryptoHasher;

pub use ed25519_dalek::{Signature, SignatureError, Signer, SigningKey, Verifier, VerifyingKey};

/// A facade around [`SigningKey`] that implements methods for [`sign`](Self::sign)-ing hashes on a
/// given network as well as getters for the public key and [`Address`] of the signing key.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    /// Create a `Keypair` that wraps over `signing_key`.
    pub fn new(signing_key: SigningKey) -> Keypair {
        Keypair(signing_key)
    }

    /// Sign `hash` for the network identified by `network_id`.
    pub fn sign(&self, network_id: &NetworkID, hash: &CryptoHash) -> SignatureBytes {
        SignatureBytes::new(self.0.sign(&network_id.signing_message(hash)).to_bytes())
    }

    /// Get the `VerifyingKey` of this `Keypair`.
    pub fn public(&self) -> VerifyingKey {
        self.0.verifying_key()
    }

    /// Get the `Address` of this `Keypair`.
    pub fn address(&self) -> Address {
        Address::from(self.0.verifying_key())
    }
}

/// Check that `signature` was produced by the owner of `address` over `hash` on `network_id`.
///
/// Returns `false` if `address` is not a valid Ed25519 point.
pub fn verify(
    address: &Address,
    network_id: &NetworkID,
    hash: &CryptoHash,
    signature: &SignatureBytes,
) -> bool {
    match address.verifying_key() {
        Ok(verifying_key) => verifying_key
            .verify(
                &network_id.signing_message(hash),
                &Signature::from_bytes(&signature.bytes()),
            )
            .is_ok(),
        Err(_) => false,
    }
}

/// SHA256 hash of the Borsh encoding of `value`.
pub fn hash<T: BorshSerialize + ?Sized>(value: &T) -> CryptoHash {
    let mut hasher = CryptoHasher::new();
    // Safety: serializing into an in-memory buffer does not fail.
    hasher.update(value.try_to_vec().unwrap());
    CryptoHash::new(hasher.finalize().into())
}
