/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Fixtures shared by the unit tests of this crate.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use rand_core::OsRng;

use crate::{
    app::{App, AppError, ApplyTransactionRequest, ValidateTransactionRequest},
    ballot::{
        basis::VotingBasis,
        proposer_transaction::ProposerTransaction,
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    networking::{
        messages::Message,
        network::{FetchTransactionsError, Network},
    },
    storage::pluggables::{KVGet, KVStore, WriteBatch},
    types::{
        block::Block,
        crypto_primitives::{Keypair, SigningKey},
        data_types::{Address, Amount, CryptoHash, NetworkID, RoundNumber},
        transaction::{Operation, Transaction, TransactionBody},
        update_sets::AppStateUpdates,
        validator_set::ValidatorSet,
    },
};

pub(crate) fn test_network_id() -> NetworkID {
    NetworkID::new(b"isaac-test".to_vec())
}

/// `n` fresh keypairs.
pub(crate) fn keypairs(n: usize) -> Vec<Keypair> {
    (0..n)
        .map(|_| Keypair::new(SigningKey::generate(&mut OsRng)))
        .collect()
}

/// One ballot per keypair, at phase `state` with vote `vote`, on a proposal of `keypairs[0]` on top of
/// the genesis block. `ballots[i]` is signed by `keypairs[i]`.
pub(crate) fn sign_ballots(keypairs: &[Keypair], state: BallotState, vote: VotingHole) -> Vec<Ballot> {
    let network_id = test_network_id();
    let basis = VotingBasis::from_block(&Block::genesis(), RoundNumber::init());
    let ptx = ProposerTransaction::new(
        &keypairs[0],
        &network_id,
        Address::new([5u8; 32]),
        &basis,
        Amount::zero(),
        0,
        TestApp::INFLATION,
    );
    let proposal = Ballot::new_proposal(&keypairs[0], &network_id, basis, Vec::new(), ptx);
    keypairs
        .iter()
        .map(|keypair| proposal.revote(keypair, &network_id, state, vote, None))
        .collect()
}

/// A payment of 1 from the address of `keypair` to a fixed account, with a fee of 1.
pub(crate) fn payment(keypair: &Keypair, sequence_id: u64) -> Transaction {
    Transaction::new(
        keypair,
        &test_network_id(),
        TransactionBody {
            source: keypair.address(),
            fee: Amount::new(1),
            sequence_id,
            operations: vec![Operation::Payment {
                target: Address::new([7u8; 32]),
                amount: Amount::new(1),
            }],
        },
    )
}

/// An in-memory [`KVStore`].
#[derive(Clone, Default)]
pub(crate) struct MemDB(Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>);

impl MemDB {
    pub(crate) fn new() -> MemDB {
        MemDB::default()
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;

    fn write(&mut self, wb: Self::WriteBatch) {
        let mut map = self.0.lock().unwrap();
        for (key, value) in wb.insertions {
            map.insert(key, value);
        }
        for key in wb.deletions {
            map.remove(&key);
        }
    }

    fn clear(&mut self) {
        self.0.lock().unwrap().clear();
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.lock().unwrap().get(key).cloned()
    }
}

pub(crate) struct MemWriteBatch {
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: HashMap::new(),
            deletions: HashSet::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }
}

/// A [`Network`] with no peers that records everything sent through it.
///
/// It reports every validator as connected, unless told otherwise with
/// [`set_connected`](RecordingNetwork::set_connected).
#[derive(Clone)]
pub(crate) struct RecordingNetwork {
    broadcasts: Arc<Mutex<Vec<Message>>>,
    connected: Arc<AtomicUsize>,
}

impl RecordingNetwork {
    pub(crate) fn new() -> RecordingNetwork {
        RecordingNetwork {
            broadcasts: Arc::new(Mutex::new(Vec::new())),
            connected: Arc::new(AtomicUsize::new(usize::MAX)),
        }
    }

    pub(crate) fn broadcasts(&self) -> Vec<Message> {
        self.broadcasts.lock().unwrap().clone()
    }

    pub(crate) fn set_connected(&self, n: usize) {
        self.connected.store(n, Ordering::SeqCst)
    }
}

impl Network for RecordingNetwork {
    fn init_validator_set(&mut self, _: ValidatorSet) {}

    fn broadcast(&mut self, message: Message) {
        self.broadcasts.lock().unwrap().push(message);
    }

    fn send(&mut self, _: Address, _: Message) {}

    fn recv(&mut self) -> Option<(Address, Message)> {
        None
    }

    fn connected_validators(&mut self) -> usize {
        self.connected.load(Ordering::SeqCst)
    }

    fn get_missing_transactions(
        &mut self,
        _: Address,
        _: &[CryptoHash],
        _: Duration,
    ) -> Result<Vec<Transaction>, FetchTransactionsError> {
        Err(FetchTransactionsError::Unreachable)
    }
}

/// App-state key whose value, if any, is the hash of a transaction that [`TestApp`] refuses.
pub(crate) const REJECTED_KEY: &[u8] = b"rejected";

/// An [`App`] in which every account sends at most one transaction.
///
/// Applying a transaction records its hash, and marks its source as spent. Validation refuses a
/// transaction from a spent source, and the transaction named under [`REJECTED_KEY`].
pub(crate) struct TestApp;

impl TestApp {
    pub(crate) const INFLATION: Amount = Amount::new(10);

    const SPENT: &'static [u8] = b"spent";

    fn check(transaction: &Transaction, rejected: Option<Vec<u8>>) -> Result<(), AppError> {
        if rejected.as_deref() == Some(&transaction.hash().bytes()[..]) {
            return Err(AppError::InvalidTransaction {
                reason: "rejected".to_string(),
            });
        }
        Ok(())
    }
}

impl<K: KVStore> App<K> for TestApp {
    fn validate_transaction(&self, request: ValidateTransactionRequest<K>) -> Result<(), AppError> {
        let app_state = request.app_state();
        if app_state.app_state(&request.transaction().source().bytes()).as_deref() == Some(TestApp::SPENT) {
            return Err(AppError::InvalidTransaction {
                reason: "source already spent".to_string(),
            });
        }
        TestApp::check(request.transaction(), app_state.app_state(REJECTED_KEY))
    }

    fn inflation_amount(&self, _: &VotingBasis) -> Amount {
        TestApp::INFLATION
    }

    fn apply_transaction(
        &self,
        request: ApplyTransactionRequest<K>,
    ) -> Result<AppStateUpdates, AppError> {
        TestApp::check(request.transaction(), request.app_state().app_state(REJECTED_KEY))?;
        let mut updates = AppStateUpdates::new();
        updates.insert(request.transaction().hash().bytes().to_vec(), b"applied".to_vec());
        updates.insert(request.transaction().source().bytes().to_vec(), TestApp::SPENT.to_vec());
        Ok(updates)
    }
}
