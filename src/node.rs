/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build, run, and initialize the storage of a validator node.
//!
//! The key components of this module are:
//! - The builder-pattern interface to construct a [description of the node](NodeSpec) with:
//!   1. `NodeSpec::builder` to construct a `NodeSpecBuilder`,
//!   2. The setters of the `NodeSpecBuilder`, and
//!   3. The `NodeSpecBuilder::build` method to construct a [`NodeSpec`],
//! - The function to [start](NodeSpec::start) a [`Node`] given its description,
//! - The function to [initialize](Node::initialize) the node's [`BlockStore`],
//! - [The type](Node) which keeps the node alive.
//!
//! ## Starting a node
//!
//! ```ignore
//! Node::initialize(kv_store.clone(), initial_app_state)?;
//!
//! let node =
//!     NodeSpec::builder()
//!     .app(app)
//!     .network(network)
//!     .kv_store(kv_store)
//!     .configuration(configuration)
//!     .on_finalize_block(finalize_block_handler)
//!     .build()
//!     .start()?;
//! ```
//!
//! ### Required setters
//!
//! - `.app(...)`
//! - `.network(...)`
//! - `.kv_store(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! - `.proposer_selector(...)`, which defaults to [`SequentialSelector`].
//! - One setter per [event](crate::events), to register a handler for it: `.on_propose_ballot(...)`,
//!   `.on_broadcast_ballot(...)`, `.on_expire_ballot(...)`, `.on_receive_ballot(...)`,
//!   `.on_transit_state(...)`, `.on_close_round(...)`, and `.on_finalize_block(...)`.
//!
//! ## Threads
//!
//! A running node owns four threads:
//! 1. The poller, which receives messages from the [`Network`].
//! 2. The checker, which processes the received messages one by one.
//! 3. The state manager, which moves the node through the phases of each round on timeouts.
//! 4. The event bus, which runs the registered event handlers. Only started if there are any.
//!
//! Dropping the [`Node`] stops and joins all of them.

use std::{
    sync::{
        mpsc::{self, Sender},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use ed25519_dalek::SigningKey;
use typed_builder::TypedBuilder;

use crate::{
    app::App,
    ballot::basis::RoundIndex,
    checker::{
        admit_transaction,
        ballot_checker::{BallotChecker, CheckerConfiguration},
        start_checker, CheckerError,
    },
    consensus::{
        isaac::Isaac,
        proposer::{ProposerSelector, SequentialSelector},
        state_manager::{
            IsaacState, IsaacStateManager, StateManagerConfiguration, StateManagerHandle,
        },
        threshold::ThresholdPolicy,
    },
    event_bus::*,
    events::*,
    networking::{network::Network, receiving::start_polling, sending::SenderHandle},
    storage::{
        block_store::{BlockStore, BlockStoreError},
        pluggables::KVStore,
    },
    transaction_pool::TransactionPool,
    types::{
        block::Block,
        crypto_primitives::Keypair,
        data_types::{Address, NetworkID},
        transaction::Transaction,
        update_sets::AppStateUpdates,
        validator_set::ValidatorSet,
    },
};

/// The user-defined parameters of a node.
///
/// ## Network ID
///
/// Every signed hash is prefixed with the network ID before signing, so that ballots and transactions
/// of one network are never valid in another network.
///
/// ## Timeouts
///
/// Each phase of a round has its own timeout. A phase that does not end within its timeout is voted
/// `Expired`. The ALLCONFIRM timeout is the pause between finalizing a block and starting the next
/// height.
///
/// ## Log Events
///
/// isaac_rs logs using the [log](https://docs.rs/log/latest/log/) crate. To get these messages
/// printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.me(...)`
    - `.network_id(...)`
    - `.validators(...)`
    - `.common_account(...)`

    Optional:
    - `.threshold_percentage(...)`
    - `.timeout_init(...)`
    - `.timeout_sign(...)`
    - `.timeout_accept(...)`
    - `.timeout_allconfirm(...)`
    - `.transactions_limit(...)`
    - `.ballot_time_skew(...)`
    - `.missing_transactions_timeout(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the node's keypair, used to sign ballots. Required."))]
    pub me: SigningKey,
    #[builder(setter(doc = "Set the ID of the network. Required."))]
    pub network_id: NetworkID,
    #[builder(setter(doc = "Set the addresses of the validators of the network. Required."))]
    pub validators: ValidatorSet,
    #[builder(setter(doc = "Set the account that collects fees and inflation. Required."))]
    pub common_account: Address,
    #[builder(
        default = 66,
        setter(doc = "Set the percentage of validators whose votes decide a phase. Defaults to 66.")
    )]
    pub threshold_percentage: u64,
    #[builder(
        default = Duration::from_secs(2),
        setter(doc = "Set the timeout of the INIT phase. Defaults to 2 seconds.")
    )]
    pub timeout_init: Duration,
    #[builder(
        default = Duration::from_secs(2),
        setter(doc = "Set the timeout of the SIGN phase. Defaults to 2 seconds.")
    )]
    pub timeout_sign: Duration,
    #[builder(
        default = Duration::from_secs(2),
        setter(doc = "Set the timeout of the ACCEPT phase. Defaults to 2 seconds.")
    )]
    pub timeout_accept: Duration,
    #[builder(
        default = Duration::ZERO,
        setter(doc = "Set the pause between finalizing a block and starting the next height. Defaults to 0.")
    )]
    pub timeout_allconfirm: Duration,
    #[builder(
        default = 1000,
        setter(doc = "Set the maximum number of transactions in a proposal. Defaults to 1000.")
    )]
    pub transactions_limit: usize,
    #[builder(
        default = Duration::from_secs(60),
        setter(doc = "Set how far the time of a ballot may be from the local time. Defaults to 60 seconds.")
    )]
    pub ballot_time_skew: Duration,
    #[builder(
        default = Duration::from_secs(3),
        setter(doc = "Set how long to wait for the proposer to provide missing transactions. Defaults to 3 seconds.")
    )]
    pub missing_transactions_timeout: Duration,
    #[builder(default = false, setter(doc = "Enable logging? Defaults to false."))]
    pub log_events: bool,
}

impl Into<(StateManagerConfiguration, CheckerConfiguration)> for Configuration {
    fn into(self) -> (StateManagerConfiguration, CheckerConfiguration) {
        let keypair = Keypair::new(self.me);
        let state_manager_config = StateManagerConfiguration {
            keypair: keypair.clone(),
            network_id: self.network_id.clone(),
            common_account: self.common_account,
            transactions_limit: self.transactions_limit,
            timeout_init: self.timeout_init,
            timeout_sign: self.timeout_sign,
            timeout_accept: self.timeout_accept,
            timeout_allconfirm: self.timeout_allconfirm,
        };
        let checker_config = CheckerConfiguration {
            keypair,
            network_id: self.network_id,
            common_account: self.common_account,
            transactions_limit: self.transactions_limit,
            ballot_time_skew: self.ballot_time_skew,
            missing_transactions_timeout: self.missing_transactions_timeout,
        };
        (state_manager_config, checker_config)
    }
}

/// Stores all necessary parameters and trait implementations required to run a [`Node`].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [NodeSpec]. On the builder call the following methods to construct a valid [NodeSpec].

    Required:
    - `.app(...)`
    - `.network(...)`
    - `.kv_store(...)`
    - `.configuration(...)`

    Optional:
    - `.proposer_selector(...)`
    - `.on_propose_ballot(...)`
    - `.on_broadcast_ballot(...)`
    - `.on_expire_ballot(...)`
    - `.on_receive_ballot(...)`
    - `.on_transit_state(...)`
    - `.on_close_round(...)`
    - `.on_finalize_block(...)`
"))]
pub struct NodeSpec<K: KVStore, A: App<K>, N: Network> {
    // Required parameters
    #[builder(setter(doc = "Set the ledger that validates and applies transactions. Required."))]
    app: A,
    #[builder(setter(doc = "Set the implementation of peer-to-peer networking. Required."))]
    network: N,
    #[builder(setter(doc = "Set the key-value store that persists blocks and the app state. Required."))]
    kv_store: K,
    #[builder(setter(doc = "Set the [configuration](Configuration) of the node. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(
        default = Box::new(SequentialSelector),
        setter(
            transform = |selector: impl ProposerSelector + 'static| Box::new(selector) as Box<dyn ProposerSelector>,
            doc = "Set how the proposer of each round is chosen. Defaults to [SequentialSelector]."
        )
    )]
    proposer_selector: Box<dyn ProposerSelector>,
    #[builder(default, setter(transform = |handler: impl Fn(&ProposeBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ProposeBallotEvent>),
    doc = "Register a handler closure to be invoked after the node proposes a ballot. Optional."))]
    on_propose_ballot: Option<HandlerPtr<ProposeBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&BroadcastBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<BroadcastBallotEvent>),
    doc = "Register a handler closure to be invoked after the node broadcasts a SIGN or ACCEPT vote. Optional."))]
    on_broadcast_ballot: Option<HandlerPtr<BroadcastBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ExpireBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ExpireBallotEvent>),
    doc = "Register a handler closure to be invoked after a phase times out and the node votes expired. Optional."))]
    on_expire_ballot: Option<HandlerPtr<ExpireBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&ReceiveBallotEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<ReceiveBallotEvent>),
    doc = "Register a handler closure to be invoked after the node receives a well-formed ballot. Optional."))]
    on_receive_ballot: Option<HandlerPtr<ReceiveBallotEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TransitStateEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TransitStateEvent>),
    doc = "Register a handler closure to be invoked after the node moves to another phase or round. Optional."))]
    on_transit_state: Option<HandlerPtr<TransitStateEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CloseRoundEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CloseRoundEvent>),
    doc = "Register a handler closure to be invoked after the ACCEPT phase of a round is decided. Optional."))]
    on_close_round: Option<HandlerPtr<CloseRoundEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&FinalizeBlockEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<FinalizeBlockEvent>),
    doc = "Register a handler closure to be invoked after a block is finalized. Optional."))]
    on_finalize_block: Option<HandlerPtr<FinalizeBlockEvent>>,
}

impl<K: KVStore, A: App<K>, N: Network> NodeSpec<K, A, N> {
    /// Starts all threads and channels associated with running a node, and returns the handles to
    /// them in a [`Node`].
    ///
    /// Fails if the block store was not [initialized](Node::initialize).
    pub fn start(mut self) -> Result<Node<K, A, N>, BlockStoreError> {
        let block_store = BlockStore::new(self.kv_store.clone());
        let latest_block = block_store.latest_block()?;

        let validators = self.configuration.validators.clone();
        self.network.init_validator_set(validators.clone());
        let policy = ThresholdPolicy::new(self.configuration.threshold_percentage, validators.len());
        let isaac = Arc::new(Isaac::new(
            validators,
            policy,
            self.proposer_selector,
            latest_block,
        ));

        let network_id = self.configuration.network_id.clone();
        let log_events = self.configuration.log_events;
        let (state_manager_config, checker_config) = self.configuration.into();

        let pool = TransactionPool::new();
        let app = Arc::new(self.app);

        let event_handlers = EventHandlers::new(
            log_events,
            self.on_propose_ballot,
            self.on_broadcast_ballot,
            self.on_expire_ballot,
            self.on_receive_ballot,
            self.on_transit_state,
            self.on_close_round,
            self.on_finalize_block,
        );
        let (event_publisher, event_subscriber) = if !event_handlers.is_empty() {
            Some(mpsc::channel()).unzip()
        } else {
            (None, None)
        };

        let (poller_shutdown, poller_shutdown_receiver) = mpsc::channel();
        let (poller, messages) = start_polling(self.network.clone(), poller_shutdown_receiver);

        let (own_ballots, own_ballots_receiver) = mpsc::channel();
        let (state_manager, state_manager_handle) = IsaacStateManager::new(
            state_manager_config,
            isaac.clone(),
            block_store.clone(),
            app.clone(),
            pool.clone(),
            self.network.clone(),
            own_ballots,
            event_publisher.clone(),
        );
        let state_manager = state_manager.start();

        let (checker_shutdown, checker_shutdown_receiver) = mpsc::channel();
        let checker = BallotChecker::new(
            checker_config,
            isaac.clone(),
            block_store.clone(),
            app.clone(),
            pool.clone(),
            self.network.clone(),
            state_manager_handle.clone(),
            event_publisher,
        );
        let checker = start_checker(
            checker,
            messages,
            own_ballots_receiver,
            checker_shutdown_receiver,
        );

        let (event_bus, event_bus_shutdown) = match event_subscriber {
            Some(event_subscriber) => {
                let (event_bus_shutdown, event_bus_shutdown_receiver) = mpsc::channel();
                let event_bus =
                    start_event_bus(event_handlers, event_subscriber, event_bus_shutdown_receiver);
                (Some(event_bus), Some(event_bus_shutdown))
            }
            None => (None, None),
        };

        Ok(Node {
            network_id,
            isaac,
            block_store,
            app,
            pool,
            sender: SenderHandle::new(self.network),
            state_manager_handle,
            poller: Some(poller),
            poller_shutdown,
            checker: Some(checker),
            checker_shutdown,
            state_manager: Some(state_manager),
            event_bus,
            event_bus_shutdown,
        })
    }
}

/// A handle to the background threads of a running node. When this value is dropped, all background
/// threads are gracefully shut down.
pub struct Node<K: KVStore, A: App<K>, N: Network> {
    network_id: NetworkID,
    isaac: Arc<Isaac>,
    block_store: BlockStore<K>,
    app: Arc<A>,
    pool: TransactionPool,
    sender: SenderHandle<N>,
    state_manager_handle: StateManagerHandle,
    poller: Option<JoinHandle<()>>,
    poller_shutdown: Sender<()>,
    checker: Option<JoinHandle<()>>,
    checker_shutdown: Sender<()>,
    state_manager: Option<JoinHandle<()>>,
    event_bus: Option<JoinHandle<()>>,
    event_bus_shutdown: Option<Sender<()>>,
}

impl<K: KVStore, A: App<K>, N: Network> Node<K, A, N> {
    /// Initializes the node's [`BlockStore`] with the genesis block and the initial app state. Does
    /// nothing if the store is already initialized.
    pub fn initialize(kv_store: K, initial_app_state: AppStateUpdates) -> Result<(), BlockStoreError> {
        let mut block_store = BlockStore::new(kv_store);
        block_store.initialize(&Block::genesis(), &initial_app_state)
    }

    /// The latest finalized block.
    pub fn latest_block(&self) -> Block {
        self.isaac.latest_confirmed_block()
    }

    /// The node's current round and phase.
    pub fn isaac_state(&self) -> IsaacState {
        self.state_manager_handle.state()
    }

    pub fn block_store(&self) -> &BlockStore<K> {
        &self.block_store
    }

    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.pool
    }

    /// Indices of the rounds in which this node is still counting votes.
    pub fn running_round_indices(&self) -> Vec<RoundIndex> {
        self.isaac.running_round_indices()
    }

    /// Add `transaction` to the transaction pool, and broadcast it to the other validators.
    ///
    /// Returns whether the transaction was new.
    pub fn submit_transaction(&mut self, transaction: Transaction) -> Result<bool, CheckerError> {
        let added = admit_transaction(
            transaction.clone(),
            &self.network_id,
            &self.block_store,
            self.app.as_ref(),
            &self.pool,
        )?;
        if added {
            self.sender.broadcast(&transaction);
        }
        Ok(added)
    }
}

impl<K: KVStore, A: App<K>, N: Network> Drop for Node<K, A, N> {
    fn drop(&mut self) {
        // The checker receives messages from the poller, and assumes that the poller lives longer
        // than it.

        self.event_bus_shutdown
            .iter()
            .for_each(|shutdown| shutdown.send(()).unwrap());
        if let Some(event_bus) = self.event_bus.take() {
            event_bus.join().unwrap();
        }

        self.state_manager_handle.stop();
        if let Some(state_manager) = self.state_manager.take() {
            state_manager.join().unwrap();
        }

        self.checker_shutdown.send(()).unwrap();
        if let Some(checker) = self.checker.take() {
            checker.join().unwrap();
        }

        self.poller_shutdown.send(()).unwrap();
        if let Some(poller) = self.poller.take() {
            poller.join().unwrap();
        }
    }
}
