/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Traits for pluggable persistence.
//!
//! isaac_rs does not ship a database. Users provide a key-value store by implementing [`KVStore`] and
//! [`WriteBatch`]. The typed getters of [`KVGet`] are implemented on top of [`KVGet::get`].

use borsh::BorshDeserialize;

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash},
    transaction::Transaction,
};

use super::paths::{self, combine};

/// A handle to a key-value store. Clones of a handle refer to the same store.
pub trait KVStore: KVGet + Clone + Send + 'static {
    type WriteBatch: WriteBatch;

    /// Atomically apply every update in `wb`.
    fn write(&mut self, wb: Self::WriteBatch);
    fn clear(&mut self);
}

/// A set of updates to a [`KVStore`] that is applied all at once, or not at all.
pub trait WriteBatch {
    fn new() -> Self;
    fn set(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

pub trait KVGet {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /* ↓↓↓ Blocks ↓↓↓ */

    fn block(&self, block: &CryptoHash) -> Result<Option<Block>, KVGetError> {
        get_deserialized(self, &combine(&paths::BLOCKS, &block.bytes()), || Key::Block {
            block: *block,
        })
    }

    fn block_at_height(&self, height: BlockHeight) -> Result<Option<CryptoHash>, KVGetError> {
        get_deserialized(
            self,
            &combine(&paths::BLOCK_AT_HEIGHT, &height.to_be_bytes()),
            || Key::BlockAtHeight { height },
        )
    }

    fn latest_block_hash(&self) -> Result<Option<CryptoHash>, KVGetError> {
        get_deserialized(self, &paths::LATEST_BLOCK, || Key::LatestBlock)
    }

    /* ↓↓↓ Transactions ↓↓↓ */

    fn transaction(&self, transaction: &CryptoHash) -> Result<Option<Transaction>, KVGetError> {
        get_deserialized(
            self,
            &combine(&paths::TRANSACTIONS, &transaction.bytes()),
            || Key::Transaction {
                transaction: *transaction,
            },
        )
    }

    fn contains_transaction(&self, transaction: &CryptoHash) -> bool {
        self.get(&combine(&paths::TRANSACTIONS, &transaction.bytes()))
            .is_some()
    }

    /* ↓↓↓ App state ↓↓↓ */

    fn app_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.get(&combine(&paths::APP_STATE, key))
    }
}

fn get_deserialized<G: KVGet + ?Sized, T: BorshDeserialize>(
    kv_get: &G,
    key: &[u8],
    error_key: impl FnOnce() -> Key,
) -> Result<Option<T>, KVGetError> {
    match kv_get.get(key) {
        Some(bytes) => T::deserialize(&mut bytes.as_slice())
            .map(Some)
            .map_err(|err| KVGetError::DeserializeValueError {
                key: error_key(),
                source: err,
            }),
        None => Ok(None),
    }
}

#[derive(Debug)]
pub enum KVGetError {
    DeserializeValueError { key: Key, source: std::io::Error },
    ValueExpectedButNotFound { key: Key },
}

/// The stored variable a [`KVGetError`] is about.
#[derive(Debug)]
pub enum Key {
    Block { block: CryptoHash },
    BlockAtHeight { height: BlockHeight },
    LatestBlock,
    Transaction { transaction: CryptoHash },
}
