/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Types that exist only to store bytes or numbers, and do not have any major "active" behavior.
//!
//! Byte-valued types ([`CryptoHash`], [`SignatureBytes`], [`Address`]) appear in JSON as unpadded
//! URL-safe Base64 strings. Numeric types appear as plain JSON numbers.

use std::{
    fmt::{self, Debug, Display, Formatter},
    ops::{Add, AddAssign},
    time::{Duration, SystemTime},
};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use borsh::{BorshDeserialize, BorshSerialize};
use ed25519_dalek::{SignatureError, VerifyingKey};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Bytes that uniquely identify a network.
///
/// Every signature produced by a node is over `network_id ‖ hash`, so ballots and transactions signed
/// for one network can never be replayed on another. All validators of a network must be configured
/// with the same `NetworkID`.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct NetworkID(Vec<u8>);

impl NetworkID {
    /// Create a new `NetworkID` from `bytes`.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Get the bytes of this `NetworkID`.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Build the message that is actually signed for `hash`: `network_id ‖ hash`.
    pub fn signing_message(&self, hash: &CryptoHash) -> Vec<u8> {
        let mut message = Vec::with_capacity(self.0.len() + 32);
        message.extend_from_slice(&self.0);
        message.extend_from_slice(&hash.bytes());
        message
    }
}

/// Height of a block.
///
/// The genesis block has height 0. Heights strictly increase by one every time a block is finalized.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct BlockHeight(u64);

impl BlockHeight {
    /// Create a new `BlockHeight` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// Get the inner `u64` value of this `BlockHeight`.
    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Get the big-endian representation of this `BlockHeight`. Used in storage keys so that the
    /// byte order of keys follows the numeric order of heights.
    pub fn to_be_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl Display for BlockHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for BlockHeight {
    type Output = BlockHeight;
    fn add(self, rhs: u64) -> Self::Output {
        BlockHeight::new(self.0 + rhs)
    }
}

impl AddAssign<u64> for BlockHeight {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs
    }
}

/// Number of a round at a given height.
///
/// Resets to 0 whenever a new block is finalized, and increases by one every time a round at the
/// same height expires.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct RoundNumber(u64);

impl RoundNumber {
    /// Create a new `RoundNumber` with an `int` inner value.
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    /// The first round at every height.
    pub const fn init() -> Self {
        Self(0)
    }

    /// Get the inner `u64` value of this `RoundNumber`.
    pub const fn int(&self) -> u64 {
        self.0
    }
}

impl Display for RoundNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Add<u64> for RoundNumber {
    type Output = RoundNumber;
    fn add(self, rhs: u64) -> Self::Output {
        RoundNumber::new(self.0 + rhs)
    }
}

/// Amount of the native currency. Used for fees, payments, and inflation.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    pub const fn new(int: u64) -> Self {
        Self(int)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn int(&self) -> u64 {
        self.0
    }

    /// Add two amounts, returning `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Subtract `rhs` from this amount, returning `None` on underflow.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Point in time, as milliseconds since the Unix Epoch.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    BorshDeserialize,
    BorshSerialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// The current local time.
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    pub const fn millis(&self) -> u64 {
        self.0
    }

    /// Absolute distance between this timestamp and `other`.
    pub fn distance(&self, other: &Timestamp) -> Duration {
        Duration::from_millis(self.0.abs_diff(other.0))
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        // Times before the Unix Epoch are clamped to the Epoch.
        let millis = time
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|duration| duration.as_millis() as u64)
            .unwrap_or(0);
        Self(millis)
    }
}

/// 32-byte SHA256 hash.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct CryptoHash([u8; 32]);

impl CryptoHash {
    /// Create a new `CryptoHash` wrapping `bytes`.
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The all-zeroes hash. Used as the "previous block hash" of the genesis block.
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Get the inner `[u8; 32]` value of this `CryptoHash`.
    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// Ed25519 digital signature.
#[derive(Clone, Copy, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct SignatureBytes([u8; 64]);

impl SignatureBytes {
    /// Create a new `SignatureBytes` wrapping `bytes`.
    pub const fn new(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Placeholder for a message that has not been signed yet.
    pub const fn empty() -> Self {
        Self([0u8; 64])
    }

    /// Get the inner `[u8; 64]` value of this `SignatureBytes`.
    pub const fn bytes(&self) -> [u8; 64] {
        self.0
    }
}

impl Default for SignatureBytes {
    fn default() -> Self {
        Self::empty()
    }
}

/// Address of a node or an account: the bytes of an Ed25519 verifying key.
///
/// Addresses are totally ordered by their bytes. Proposer selection relies on this order being the
/// same on every node.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, BorshDeserialize, BorshSerialize)]
pub struct Address([u8; 32]);

impl Address {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn bytes(&self) -> [u8; 32] {
        self.0
    }

    /// Interpret this address as an Ed25519 verifying key.
    pub fn verifying_key(&self) -> Result<VerifyingKey, SignatureError> {
        VerifyingKey::from_bytes(&self.0)
    }
}

impl From<VerifyingKey> for Address {
    fn from(verifying_key: VerifyingKey) -> Self {
        Address(verifying_key.to_bytes())
    }
}

impl From<&VerifyingKey> for Address {
    fn from(verifying_key: &VerifyingKey) -> Self {
        Address(verifying_key.to_bytes())
    }
}

/// Implements `Display`, `Debug`, `Serialize` and `Deserialize` for a fixed-size bytes newtype in
/// terms of its unpadded URL-safe Base64 encoding.
macro_rules! impl_base64_bytes {
    ($type:ident, $len:literal) => {
        impl Display for $type {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
            }
        }

        impl Debug for $type {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($type), self)
            }
        }

        impl Serialize for $type {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&URL_SAFE_NO_PAD.encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $type {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = <String as Deserialize>::deserialize(deserializer)?;
                let decoded = URL_SAFE_NO_PAD
                    .decode(encoded.as_bytes())
                    .map_err(de::Error::custom)?;
                let bytes: [u8; $len] = decoded.try_into().map_err(|bytes: Vec<u8>| {
                    de::Error::invalid_length(bytes.len(), &concat!($len, " bytes"))
                })?;
                Ok($type(bytes))
            }
        }
    };
}

impl_base64_bytes!(CryptoHash, 32);
impl_base64_bytes!(SignatureBytes, 64);
impl_base64_bytes!(Address, 32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_types_serialize_as_base64_strings() {
        let hash = CryptoHash::new([7u8; 32]);
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", URL_SAFE_NO_PAD.encode([7u8; 32])));
        assert_eq!(serde_json::from_str::<CryptoHash>(&json).unwrap(), hash);
    }

    #[test]
    fn wrong_length_is_rejected() {
        let json = format!("\"{}\"", URL_SAFE_NO_PAD.encode([1u8; 31]));
        assert!(serde_json::from_str::<Address>(&json).is_err());
    }

    #[test]
    fn timestamp_distance_is_symmetric() {
        let a = Timestamp::new(1_000);
        let b = Timestamp::new(4_500);
        assert_eq!(a.distance(&b), Duration::from_millis(3_500));
        assert_eq!(b.distance(&a), a.distance(&b));
    }
}
