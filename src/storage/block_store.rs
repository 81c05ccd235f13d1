/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`BlockStore`]: finalized blocks, their transactions, and the app state, persisted in a
//! user-provided [`KVStore`].
//!
//! Writes go through a [`BlockStoreWriteBatch`]. A batch is committed with [`BlockStore::write`];
//! dropping a batch without writing it discards every update in it.

use borsh::BorshSerialize;

use crate::types::{
    block::Block,
    data_types::{BlockHeight, CryptoHash},
    transaction::Transaction,
    update_sets::AppStateUpdates,
};

use super::{
    paths::{self, combine},
    pluggables::{KVGetError, KVStore, Key, WriteBatch},
};

#[derive(Clone)]
pub struct BlockStore<K: KVStore> {
    kv_store: K,
}

impl<K: KVStore> BlockStore<K> {
    pub fn new(kv_store: K) -> Self {
        Self { kv_store }
    }

    /// Whether a genesis block was ever written into the store.
    pub fn is_initialized(&self) -> Result<bool, BlockStoreError> {
        Ok(self.kv_store.latest_block_hash()?.is_some())
    }

    /// Write `genesis` as the latest block, along with the initial app state. Does nothing if the store
    /// is already initialized.
    pub fn initialize(
        &mut self,
        genesis: &Block,
        initial_app_state: &AppStateUpdates,
    ) -> Result<(), BlockStoreError> {
        if self.is_initialized()? {
            return Ok(());
        }
        let mut wb = self.write_batch();
        wb.set_block(genesis)?;
        wb.set_latest_block(&genesis.hash)?;
        wb.apply_app_state_updates(initial_app_state);
        self.write(wb);
        Ok(())
    }

    pub fn block(&self, block: &CryptoHash) -> Result<Option<Block>, BlockStoreError> {
        Ok(self.kv_store.block(block)?)
    }

    pub fn block_at_height(&self, height: BlockHeight) -> Result<Option<Block>, BlockStoreError> {
        match self.kv_store.block_at_height(height)? {
            Some(hash) => Ok(Some(self.kv_store.block(&hash)?.ok_or(
                KVGetError::ValueExpectedButNotFound {
                    key: Key::Block { block: hash },
                },
            )?)),
            None => Ok(None),
        }
    }

    /// The most recently finalized block.
    pub fn latest_block(&self) -> Result<Block, BlockStoreError> {
        let hash = self
            .kv_store
            .latest_block_hash()?
            .ok_or(BlockStoreError::NotInitialized)?;
        Ok(self
            .kv_store
            .block(&hash)?
            .ok_or(KVGetError::ValueExpectedButNotFound {
                key: Key::Block { block: hash },
            })?)
    }

    pub fn transaction(&self, transaction: &CryptoHash) -> Result<Option<Transaction>, BlockStoreError> {
        Ok(self.kv_store.transaction(transaction)?)
    }

    /// Whether `transaction` is part of a finalized block.
    pub fn contains_transaction(&self, transaction: &CryptoHash) -> bool {
        self.kv_store.contains_transaction(transaction)
    }

    pub fn app_state(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.kv_store.app_state(key)
    }

    /// Open a new, empty write batch.
    pub fn write_batch(&self) -> BlockStoreWriteBatch<K::WriteBatch> {
        BlockStoreWriteBatch(K::WriteBatch::new())
    }

    /// Atomically commit every update in `write_batch`.
    pub fn write(&mut self, write_batch: BlockStoreWriteBatch<K::WriteBatch>) {
        self.kv_store.write(write_batch.0)
    }
}

/// Updates to a [`BlockStore`], expressed in terms of blocks and transactions rather than raw keys.
pub struct BlockStoreWriteBatch<W: WriteBatch>(W);

impl<W: WriteBatch> BlockStoreWriteBatch<W> {
    /// Store `block`, and index it by its height.
    pub fn set_block(&mut self, block: &Block) -> Result<(), BlockStoreError> {
        self.0.set(
            &combine(&paths::BLOCKS, &block.hash.bytes()),
            &block.try_to_vec().map_err(|err| BlockStoreError::SerializeValueError {
                key: Key::Block { block: block.hash },
                source: err,
            })?,
        );
        self.0.set(
            &combine(&paths::BLOCK_AT_HEIGHT, &block.height.to_be_bytes()),
            &block.hash.try_to_vec().map_err(|err| BlockStoreError::SerializeValueError {
                key: Key::BlockAtHeight {
                    height: block.height,
                },
                source: err,
            })?,
        );
        Ok(())
    }

    pub fn set_latest_block(&mut self, block: &CryptoHash) -> Result<(), BlockStoreError> {
        self.0.set(
            &paths::LATEST_BLOCK,
            &block.try_to_vec().map_err(|err| BlockStoreError::SerializeValueError {
                key: Key::LatestBlock,
                source: err,
            })?,
        );
        Ok(())
    }

    pub fn set_transaction(&mut self, transaction: &Transaction) -> Result<(), BlockStoreError> {
        self.0.set(
            &combine(&paths::TRANSACTIONS, &transaction.hash().bytes()),
            &transaction
                .try_to_vec()
                .map_err(|err| BlockStoreError::SerializeValueError {
                    key: Key::Transaction {
                        transaction: transaction.hash(),
                    },
                    source: err,
                })?,
        );
        Ok(())
    }

    pub fn apply_app_state_updates(&mut self, app_state_updates: &AppStateUpdates) {
        for (key, value) in app_state_updates.inserts() {
            self.0.set(&combine(&paths::APP_STATE, key), value);
        }
        for key in app_state_updates.deletes() {
            self.0.delete(&combine(&paths::APP_STATE, key));
        }
    }
}

#[derive(Debug)]
pub enum BlockStoreError {
    NotInitialized,
    KVGetError(KVGetError),
    SerializeValueError { key: Key, source: std::io::Error },
}

impl From<KVGetError> for BlockStoreError {
    fn from(value: KVGetError) -> Self {
        BlockStoreError::KVGetError(value)
    }
}
