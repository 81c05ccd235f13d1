/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-node, timer-driven state machine: [`IsaacStateManager`].
//!
//! ## Control loop
//!
//! The state manager runs on its own thread. The loop waits on a single command channel with a
//! deadline, so each iteration handles exactly one of:
//! 1. A transition request ([`StateManagerHandle::transit_isaac_state`]), accepted only if its target
//!    is strictly later than the current state.
//! 2. A request to move to the next height ([`StateManagerHandle::next_height`]).
//! 3. A stop request.
//! 4. The expiry of the current phase's timeout.
//!
//! Only the loop writes the node's [`IsaacState`]. Other threads read it through the handle, and ask
//! for changes by sending commands, which never blocks.
//!
//! ## Phases
//!
//! | phase on timeout | action |
//! |---|---|
//! | INIT | broadcast an `Expired` SIGN ballot, move to SIGN |
//! | SIGN | broadcast an `Expired` ACCEPT ballot, move to ACCEPT |
//! | ACCEPT | move to the INIT phase of the next round |
//! | ALLCONFIRM | move to the INIT phase of the next height |
//!
//! On entering INIT, the node proposes if it is the proposer of the round and enough validators are
//! connected to decide the round.

use std::{
    cmp::Ordering,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
        Arc, PoisonError, RwLock,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant, SystemTime},
};

use crate::{
    app::App,
    ballot::{
        basis::VotingBasis,
        proposer_transaction::ProposerTransaction,
        state::BallotState,
        types::Ballot,
    },
    checker::finish::{build_block, PendingAppState},
    events::{Event, ExpireBallotEvent, ProposeBallotEvent, TransitStateEvent},
    networking::{network::Network, sending::SenderHandle},
    storage::{block_store::BlockStore, pluggables::KVStore},
    transaction_pool::TransactionPool,
    types::{
        crypto_primitives::Keypair,
        data_types::{Address, Amount, NetworkID, RoundNumber, Timestamp},
        transaction::Transaction,
    },
};

use super::isaac::Isaac;

/// The node's own position in the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsaacState {
    pub basis: VotingBasis,
    pub ballot_state: BallotState,
}

impl IsaacState {
    pub fn new(basis: VotingBasis, ballot_state: BallotState) -> IsaacState {
        IsaacState {
            basis,
            ballot_state,
        }
    }

    /// Compare by height, then round, then phase.
    pub fn progress_cmp(&self, other: &IsaacState) -> Ordering {
        (self.basis.height, self.basis.round, self.ballot_state).cmp(&(
            other.basis.height,
            other.basis.round,
            other.ballot_state,
        ))
    }
}

pub(crate) struct StateManagerConfiguration {
    pub(crate) keypair: Keypair,
    pub(crate) network_id: NetworkID,
    pub(crate) common_account: Address,
    pub(crate) transactions_limit: usize,
    pub(crate) timeout_init: Duration,
    pub(crate) timeout_sign: Duration,
    pub(crate) timeout_accept: Duration,
    pub(crate) timeout_allconfirm: Duration,
}

impl StateManagerConfiguration {
    fn timeout(&self, state: BallotState) -> Duration {
        match state {
            BallotState::Init => self.timeout_init,
            BallotState::Sign => self.timeout_sign,
            BallotState::Accept => self.timeout_accept,
            BallotState::AllConfirm => self.timeout_allconfirm,
        }
    }
}

enum Command {
    Transit(IsaacState),
    NextHeight,
    Stop,
}

/// Handle for reading the [`IsaacState`] of a running state manager, and for requesting changes to it.
///
/// Requests are enqueued and return immediately. They are applied in order by the state manager
/// thread.
#[derive(Clone)]
pub struct StateManagerHandle {
    commands: Sender<Command>,
    state: Arc<RwLock<IsaacState>>,
}

impl StateManagerHandle {
    /// Ask the state manager to move to `ballot_state` in the round on `basis`. Ignored unless the
    /// target is strictly later than the state at the time the request is handled.
    pub fn transit_isaac_state(&self, basis: VotingBasis, ballot_state: BallotState) {
        let _ = self
            .commands
            .send(Command::Transit(IsaacState::new(basis, ballot_state)));
    }

    /// Ask the state manager to move to the INIT phase of the round 0 on top of the latest confirmed
    /// block.
    pub fn next_height(&self) {
        let _ = self.commands.send(Command::NextHeight);
    }

    pub fn stop(&self) {
        let _ = self.commands.send(Command::Stop);
    }

    pub fn state(&self) -> IsaacState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) struct IsaacStateManager<K: KVStore, A: App<K>, N: Network> {
    config: StateManagerConfiguration,
    isaac: Arc<Isaac>,
    block_store: BlockStore<K>,
    app: Arc<A>,
    pool: TransactionPool,
    sender: SenderHandle<N>,
    own_ballots: Sender<Ballot>,
    commands: Receiver<Command>,
    state: Arc<RwLock<IsaacState>>,
    deadline: Instant,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore, A: App<K>, N: Network> IsaacStateManager<K, A, N> {
    /// Create a state manager positioned at the INIT phase of round 0 on top of the latest confirmed
    /// block, and a handle to it.
    ///
    /// Every `Expired` ballot the state manager votes with is also sent to `own_ballots`, to be checked
    /// like the ballots the checker votes with.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: StateManagerConfiguration,
        isaac: Arc<Isaac>,
        block_store: BlockStore<K>,
        app: Arc<A>,
        pool: TransactionPool,
        network: N,
        own_ballots: Sender<Ballot>,
        event_publisher: Option<Sender<Event>>,
    ) -> (Self, StateManagerHandle) {
        let initial = IsaacState::new(
            VotingBasis::from_block(&isaac.latest_confirmed_block(), RoundNumber::init()),
            BallotState::Init,
        );
        let state = Arc::new(RwLock::new(initial));
        let (commands_sender, commands) = mpsc::channel();
        let handle = StateManagerHandle {
            commands: commands_sender,
            state: state.clone(),
        };

        let state_manager = IsaacStateManager {
            config,
            isaac,
            block_store,
            app,
            pool,
            sender: SenderHandle::new(network),
            own_ballots,
            commands,
            state,
            deadline: Instant::now(),
            event_publisher,
        };
        (state_manager, handle)
    }

    pub(crate) fn start(self) -> JoinHandle<()> {
        thread::spawn(move || self.execute())
    }

    fn execute(mut self) {
        self.enter_init();

        loop {
            let timeout = self.deadline.saturating_duration_since(Instant::now());
            match self.commands.recv_timeout(timeout) {
                Ok(Command::Transit(target)) => self.transit(target),
                Ok(Command::NextHeight) => self.next_height(),
                Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => return,
                Err(RecvTimeoutError::Timeout) => self.on_timeout(),
            }
        }
    }

    fn current(&self) -> IsaacState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&mut self, new_state: IsaacState) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = new_state;

        Event::TransitState(TransitStateEvent {
            timestamp: SystemTime::now(),
            basis: new_state.basis,
            state: new_state.ballot_state,
        })
        .publish(&self.event_publisher);
    }

    fn arm_timeout(&mut self, state: BallotState) {
        self.deadline = Instant::now() + self.config.timeout(state);
    }

    fn transit(&mut self, target: IsaacState) {
        let current = self.current();
        if target.progress_cmp(&current) != Ordering::Greater {
            log::debug!(
                "Dropped transition from {} {} to {} {}",
                current.basis.index(),
                current.ballot_state,
                target.basis.index(),
                target.ballot_state
            );
            return;
        }

        self.set_state(target);
        match target.ballot_state {
            BallotState::Init => self.enter_init(),
            state => self.arm_timeout(state),
        }
    }

    fn on_timeout(&mut self) {
        let current = self.current();
        match current.ballot_state {
            BallotState::Init | BallotState::Sign => {
                let next = current.ballot_state.next();
                self.expire(current.basis, next);
                self.set_state(IsaacState::new(current.basis, next));
                self.arm_timeout(next);
            }
            BallotState::Accept => self.increase_round(),
            BallotState::AllConfirm => self.next_height(),
        }
    }

    /// Move to the INIT phase of the next round. If a block was confirmed in the meantime, the next
    /// round is round 0 on top of that block instead.
    fn increase_round(&mut self) {
        let current = self.current();
        let latest = self.isaac.latest_confirmed_block();
        let basis = if latest.height == current.basis.height {
            VotingBasis {
                round: current.basis.round + 1,
                ..current.basis
            }
        } else {
            VotingBasis::from_block(&latest, RoundNumber::init())
        };
        self.set_state(IsaacState::new(basis, BallotState::Init));
        self.enter_init();
    }

    /// Move to the INIT phase of round 0 on top of the latest confirmed block. If no block was
    /// confirmed since the current round started, move to the next round instead.
    fn next_height(&mut self) {
        let current = self.current();
        let latest = self.isaac.latest_confirmed_block();
        let target = IsaacState::new(
            VotingBasis::from_block(&latest, RoundNumber::init()),
            BallotState::Init,
        );
        if target.progress_cmp(&current) == Ordering::Greater {
            self.set_state(target);
            self.enter_init();
        } else {
            self.increase_round();
        }
    }

    /// Propose if this node is the proposer of the current round. Otherwise, or if proposing fails,
    /// wait in INIT until the INIT timeout.
    fn enter_init(&mut self) {
        let current = self.current();
        let basis = current.basis;
        let me = self.config.keypair.address();
        let is_proposer = self.isaac.select_proposer(basis.height, basis.round) == Some(me);
        let connected = self.sender.connected_validators();
        let policy = self.isaac.policy();
        policy.set_connected(connected.clamp(1, policy.validators()));

        if is_proposer && policy.connected() >= policy.threshold(BallotState::Sign) {
            match self.propose(basis) {
                Ok(ballot) => {
                    self.sender.broadcast(&ballot);
                    self.register_own_ballot(&ballot);
                    Event::ProposeBallot(ProposeBallotEvent {
                        timestamp: SystemTime::now(),
                        ballot,
                    })
                    .publish(&self.event_publisher);

                    self.set_state(IsaacState::new(basis, BallotState::Sign));
                    self.arm_timeout(BallotState::Sign);
                    return;
                }
                Err(err) => log::warn!("Failed to propose in round {}: {:?}", basis.index(), err),
            }
        }

        self.arm_timeout(BallotState::Init);
    }

    /// Propose the pooled transactions that can be applied one after another on top of the latest
    /// app state. Pooled transactions that are already confirmed, or that cannot be applied, are
    /// removed from the pool.
    fn propose(&self, basis: VotingBasis) -> Result<Ballot, ProposeError> {
        if !basis.extends(&self.isaac.latest_confirmed_block()) {
            return Err(ProposeError::StaleBasis);
        }

        let (confirmed, candidates): (Vec<Transaction>, Vec<Transaction>) = self
            .pool
            .available_transactions(self.config.transactions_limit)
            .into_iter()
            .partition(|tx| self.block_store.contains_transaction(&tx.hash()));
        let mut evicted: Vec<_> = confirmed.iter().map(|tx| tx.hash()).collect();

        // The candidates are checked as part of a block holding all of them.
        let candidate_block = build_block(
            &basis,
            self.config.keypair.address(),
            &candidates,
            self.proposer_transaction(&basis, &candidates)?.transaction(),
            Timestamp::now(),
        );
        let mut state = PendingAppState::new(&self.block_store, self.app.as_ref());
        let mut transactions = Vec::with_capacity(candidates.len());
        for transaction in candidates {
            match state.validate_and_apply(&candidate_block, &transaction) {
                Ok(()) => transactions.push(transaction),
                Err(err) => {
                    log::debug!("Evicted transaction {}: {}", transaction.hash(), err);
                    evicted.push(transaction.hash());
                }
            }
        }
        self.pool.remove(&evicted);

        Ok(Ballot::new_proposal(
            &self.config.keypair,
            &self.config.network_id,
            basis,
            transactions.iter().map(|tx| tx.hash()).collect(),
            self.proposer_transaction(&basis, &transactions)?,
        ))
    }

    fn proposer_transaction(
        &self,
        basis: &VotingBasis,
        transactions: &[Transaction],
    ) -> Result<ProposerTransaction, ProposeError> {
        let fees = transactions
            .iter()
            .try_fold(Amount::zero(), |sum, tx| sum.checked_add(tx.fee()))
            .ok_or(ProposeError::FeeOverflow)?;
        Ok(ProposerTransaction::new(
            &self.config.keypair,
            &self.config.network_id,
            self.config.common_account,
            basis,
            fees,
            transactions.len() as u64,
            self.app.inflation_amount(basis),
        ))
    }

    /// Broadcast an `Expired` vote at phase `state` of the round on `basis`, unless this node has
    /// already voted at that phase.
    fn expire(&mut self, basis: VotingBasis, state: BallotState) {
        let Some(proposer) = self.isaac.select_proposer(basis.height, basis.round) else {
            log::error!("No proposer for round {}", basis.index());
            return;
        };
        let me = self.config.keypair.address();
        if self.isaac.is_voted_by(&basis, &proposer, &me, state) {
            return;
        }

        let ballot = Ballot::new_expired(
            &self.config.keypair,
            &self.config.network_id,
            basis,
            proposer,
            state,
        );
        self.sender.broadcast(&ballot);
        self.register_own_ballot(&ballot);
        let _ = self.own_ballots.send(ballot.clone());
        Event::ExpireBallot(ExpireBallotEvent {
            timestamp: SystemTime::now(),
            ballot,
        })
        .publish(&self.event_publisher);
    }

    fn register_own_ballot(&self, ballot: &Ballot) {
        if !self.isaac.is_available_round(ballot.basis()) {
            return;
        }
        if let Err(err) = self.isaac.vote(ballot) {
            log::error!("Failed to register own ballot: {:?}", err);
        }
    }
}

#[derive(Debug)]
pub enum ProposeError {
    /// The round does not extend the latest confirmed block.
    StaleBasis,
    /// The fees of the proposed transactions do not fit in an [`Amount`].
    FeeOverflow,
}
