/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! An in-memory pool of transactions waiting to be proposed.
//!
//! Clones of a [`TransactionPool`] share the same pool. Transactions are handed out for proposals in
//! the order they were added.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::types::{data_types::CryptoHash, transaction::Transaction};

#[derive(Clone, Default)]
pub struct TransactionPool {
    inner: Arc<Mutex<PoolInner>>,
}

#[derive(Default)]
struct PoolInner {
    // Insertion order.
    order: Vec<CryptoHash>,
    transactions: HashMap<CryptoHash, Transaction>,
}

impl TransactionPool {
    pub fn new() -> TransactionPool {
        TransactionPool::default()
    }

    pub fn get(&self, hash: &CryptoHash) -> Option<Transaction> {
        self.lock().transactions.get(hash).cloned()
    }

    pub fn contains(&self, hash: &CryptoHash) -> bool {
        self.lock().transactions.contains_key(hash)
    }

    /// Add `transaction` to the pool. Returns `false` if it was already in the pool.
    pub fn add(&self, transaction: Transaction) -> bool {
        let mut inner = self.lock();
        let hash = transaction.hash();
        if inner.transactions.contains_key(&hash) {
            return false;
        }
        inner.order.push(hash);
        inner.transactions.insert(hash, transaction);
        true
    }

    /// Get up to `limit` transactions, oldest first.
    pub fn available_transactions(&self, limit: usize) -> Vec<Transaction> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .take(limit)
            .filter_map(|hash| inner.transactions.get(hash).cloned())
            .collect()
    }

    pub fn remove(&self, hashes: &[CryptoHash]) {
        let mut inner = self.lock();
        for hash in hashes {
            inner.transactions.remove(hash);
        }
        let PoolInner {
            order,
            transactions,
        } = &mut *inner;
        order.retain(|hash| transactions.contains_key(hash));
    }

    pub fn len(&self) -> usize {
        self.lock().transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().transactions.is_empty()
    }

    fn lock(&self) -> MutexGuard<PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
