use std::{
    collections::HashMap,
    sync::{
        mpsc::{self, Receiver, Sender, TryRecvError},
        Arc, Mutex,
    },
    time::Duration,
};

use isaac_rs::{
    networking::{
        messages::Message,
        network::{FetchTransactionsError, Network},
    },
    transaction_pool::TransactionPool,
    types::{
        data_types::{Address, CryptoHash},
        transaction::Transaction,
        validator_set::ValidatorSet,
    },
};

/// A mock network stub which passes messages from and to threads using channels.
///
/// Missing transactions are served directly from the transaction pool of the asked peer, once that
/// peer has [registered](NetworkStub::register_pool) it.
#[derive(Clone)]
pub(crate) struct NetworkStub {
    my_address: Address,
    all_peers: HashMap<Address, Sender<(Address, Message)>>,
    inbox: Arc<Mutex<Receiver<(Address, Message)>>>,
    pools: Arc<Mutex<HashMap<Address, TransactionPool>>>,
}

impl NetworkStub {
    pub(crate) fn register_pool(&self, pool: TransactionPool) {
        self.pools.lock().unwrap().insert(self.my_address, pool);
    }
}

impl Network for NetworkStub {
    fn init_validator_set(&mut self, _: ValidatorSet) {}

    fn send(&mut self, peer: Address, message: Message) {
        if let Some(peer) = self.all_peers.get(&peer) {
            let _ = peer.send((self.my_address, message));
        }
    }

    fn broadcast(&mut self, message: Message) {
        for (_, peer) in &self.all_peers {
            let _ = peer.send((self.my_address, message.clone()));
        }
    }

    fn recv(&mut self) -> Option<(Address, Message)> {
        match self.inbox.lock().unwrap().try_recv() {
            Ok(o_m) => Some(o_m),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!(),
        }
    }

    fn connected_validators(&mut self) -> usize {
        self.all_peers.len()
    }

    fn get_missing_transactions(
        &mut self,
        peer: Address,
        hashes: &[CryptoHash],
        _: Duration,
    ) -> Result<Vec<Transaction>, FetchTransactionsError> {
        let pools = self.pools.lock().unwrap();
        let pool = pools.get(&peer).ok_or(FetchTransactionsError::Unreachable)?;

        let missing: Vec<CryptoHash> = hashes.iter().filter(|hash| !pool.contains(hash)).copied().collect();
        if !missing.is_empty() {
            return Err(FetchTransactionsError::NotFound { missing });
        }
        Ok(hashes.iter().filter_map(|hash| pool.get(hash)).collect())
    }
}

pub(crate) fn mock_network(peers: impl Iterator<Item = Address>) -> Vec<NetworkStub> {
    let mut all_peers = HashMap::new();
    let pools = Arc::new(Mutex::new(HashMap::new()));
    let peer_and_inboxes: Vec<(Address, Receiver<(Address, Message)>)> = peers
        .map(|peer| {
            let (sender, receiver) = mpsc::channel();
            all_peers.insert(peer, sender);

            (peer, receiver)
        })
        .collect();

    peer_and_inboxes
        .into_iter()
        .map(|(my_address, inbox)| NetworkStub {
            my_address,
            all_peers: all_peers.clone(),
            inbox: Arc::new(Mutex::new(inbox)),
            pools: pools.clone(),
        })
        .collect()
}
