/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The [`BallotChecker`]: processing of inbound ballots.
//!
//! Every ballot goes through the base steps, and then through the steps of its phase:
//!
//! | phase | steps |
//! |---|---|
//! | base | well formed, known validator, not our own, round available |
//! | INIT | vote, same proposer, proposer transaction, fetch missing transactions, validate transactions, not voted SIGN, broadcast SIGN, transit to SIGN |
//! | SIGN | vote, same proposer, voting result, not voted ACCEPT, broadcast ACCEPT, transit to ACCEPT |
//! | ACCEPT | vote, same proposer, voting result, close round |
//!
//! A ballot this node broadcasts while checking is registered right away, and then checked from its
//! "vote" step onwards, since registering it may be what decides its phase. The `Expired` ballots of
//! the state manager are checked the same way, through [`BallotChecker::check_own`].

use std::{
    collections::{HashMap, HashSet},
    sync::{mpsc::Sender, Arc},
    time::{Duration, SystemTime},
};

use crate::{
    app::App,
    ballot::{
        state::{BallotState, VotingHole},
        types::Ballot,
    },
    consensus::{isaac::Isaac, state_manager::StateManagerHandle},
    events::{BroadcastBallotEvent, CloseRoundEvent, Event, FinalizeBlockEvent, ReceiveBallotEvent},
    networking::{network::Network, sending::SenderHandle},
    storage::{block_store::BlockStore, pluggables::KVStore},
    transaction_pool::TransactionPool,
    types::{
        crypto_primitives::Keypair,
        data_types::{Address, Amount, CryptoHash, NetworkID},
        transaction::Transaction,
    },
};

use super::{
    admit_transaction,
    finish::{finish_ballot, proposed_block, FinishError, PendingAppState},
    pipeline::{self, Flow, Step, StepResult},
    CheckerError,
};

pub(crate) struct CheckerConfiguration {
    pub(crate) keypair: Keypair,
    pub(crate) network_id: NetworkID,
    pub(crate) common_account: Address,
    pub(crate) transactions_limit: usize,
    pub(crate) ballot_time_skew: Duration,
    pub(crate) missing_transactions_timeout: Duration,
}

/// Why processing of a ballot ended early without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckerStop {
    /// The ballot was broadcast by this node, and is registered when sent.
    OwnBallot,
    /// The round of the ballot is finished, or was superseded.
    RoundNotAvailable,
    /// The ballot claims another proposer than the one expected for its round.
    DifferentProposer,
    /// The phase of the ballot cannot be decided yet.
    NotDecided,
    /// This node already voted at the phase the ballot would make it vote at.
    AlreadyVoted,
    /// The phase was decided, but no ballot carrying the proposal was seen.
    MissingProposal,
}

pub(crate) struct BallotChecker<K: KVStore, A: App<K>, N: Network> {
    config: CheckerConfiguration,
    isaac: Arc<Isaac>,
    block_store: BlockStore<K>,
    app: Arc<A>,
    pool: TransactionPool,
    sender: SenderHandle<N>,
    state_manager: StateManagerHandle,
    event_publisher: Option<Sender<Event>>,
}

impl<K: KVStore, A: App<K>, N: Network> BallotChecker<K, A, N> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        config: CheckerConfiguration,
        isaac: Arc<Isaac>,
        block_store: BlockStore<K>,
        app: Arc<A>,
        pool: TransactionPool,
        network: N,
        state_manager: StateManagerHandle,
        event_publisher: Option<Sender<Event>>,
    ) -> Self {
        Self {
            config,
            isaac,
            block_store,
            app,
            pool,
            sender: SenderHandle::new(network),
            state_manager,
            event_publisher,
        }
    }

    /// Process the encoded ballot `bytes` received from `origin`.
    ///
    /// Returns why processing stopped early, if it did.
    pub(crate) fn check(
        &mut self,
        origin: Address,
        bytes: &[u8],
    ) -> Result<Option<CheckerStop>, CheckerError> {
        let ballot = Ballot::from_bytes(bytes)?;

        let (outcome, mut produced) = {
            let mut check = BallotCheck::new(self, origin, ballot, false);
            let base: &[Step<BallotCheck<K, A, N>>] = &[
                BallotCheck::well_formed,
                BallotCheck::known_validator,
                BallotCheck::not_own_ballot,
                BallotCheck::available_round,
                BallotCheck::publish_received,
            ];
            if let Some(stop) = pipeline::run(&mut check, base)? {
                return Ok(Some(stop));
            }
            (check.run_phase()?, check.produced.take())
        };

        while let Some(own) = produced {
            produced = self.check_registered(own)?.1;
        }

        Ok(outcome)
    }

    /// Process an `Expired` ballot that the state manager of this node broadcast and registered.
    ///
    /// Returns why processing stopped early, if it did.
    pub(crate) fn check_own(&mut self, ballot: Ballot) -> Result<Option<CheckerStop>, CheckerError> {
        // A proposal is not a vote of its proposer.
        if ballot.state() == BallotState::Init {
            return Ok(None);
        }

        let (outcome, mut produced) = self.check_registered(ballot)?;
        while let Some(own) = produced {
            produced = self.check_registered(own)?.1;
        }

        Ok(outcome)
    }

    /// Run the phase steps for a ballot of this node that is already registered. Returns the outcome,
    /// and the ballot this node voted with as a result, if any.
    fn check_registered(
        &mut self,
        ballot: Ballot,
    ) -> Result<(Option<CheckerStop>, Option<Ballot>), CheckerError> {
        let me = self.config.keypair.address();
        let mut check = BallotCheck::new(self, me, ballot, true);
        let own_steps: &[Step<BallotCheck<K, A, N>>] = &[BallotCheck::available_round];
        let outcome = match pipeline::run(&mut check, own_steps)? {
            Some(stop) => Some(stop),
            None => check.run_phase()?,
        };
        Ok((outcome, check.produced.take()))
    }

    /// Admit the encoded transaction `bytes` into the transaction pool. Returns whether it was added.
    pub(crate) fn receive_transaction(&mut self, bytes: &[u8]) -> Result<bool, CheckerError> {
        let transaction: Transaction = serde_json::from_slice(bytes)?;
        admit_transaction(
            transaction,
            &self.config.network_id,
            &self.block_store,
            self.app.as_ref(),
            &self.pool,
        )
    }
}

/// The state of the processing of one ballot.
struct BallotCheck<'c, K: KVStore, A: App<K>, N: Network> {
    checker: &'c mut BallotChecker<K, A, N>,
    origin: Address,
    ballot: Ballot,
    // Whether `ballot` was broadcast by this node, and is already registered.
    own: bool,
    fetched: HashMap<CryptoHash, Transaction>,
    decision: Option<(VotingHole, Option<String>)>,
    result: VotingHole,
    produced: Option<Ballot>,
}

impl<'c, K: KVStore, A: App<K>, N: Network> BallotCheck<'c, K, A, N> {
    fn new(checker: &'c mut BallotChecker<K, A, N>, origin: Address, ballot: Ballot, own: bool) -> Self {
        Self {
            checker,
            origin,
            ballot,
            own,
            fetched: HashMap::new(),
            decision: None,
            result: VotingHole::NotYet,
            produced: None,
        }
    }

    /// Run the steps of the phase of the ballot.
    fn run_phase(&mut self) -> Result<Option<CheckerStop>, CheckerError> {
        match self.ballot.state() {
            BallotState::Init => pipeline::run(
                self,
                &[
                    Self::vote,
                    Self::init_same_proposer,
                    Self::check_proposer_transaction,
                    Self::fetch_missing_transactions,
                    Self::validate_transactions,
                    Self::not_voted_sign,
                    Self::broadcast_sign,
                    Self::transit_sign,
                ],
            ),
            BallotState::Sign => pipeline::run(
                self,
                &[
                    Self::vote,
                    Self::same_proposer,
                    Self::voting_result,
                    Self::not_voted_accept,
                    Self::broadcast_accept,
                    Self::transit_accept,
                ],
            ),
            BallotState::Accept => pipeline::run(
                self,
                &[
                    Self::vote,
                    Self::same_proposer,
                    Self::voting_result,
                    Self::close_round,
                ],
            ),
            // Rejected by `Ballot::is_well_formed`.
            BallotState::AllConfirm => Ok(None),
        }
    }

    fn me(&self) -> Address {
        self.checker.config.keypair.address()
    }

    fn decide(&mut self, vote: VotingHole, reason: Option<String>) -> StepResult {
        if self.decision.is_none() {
            self.decision = Some((vote, reason));
        }
        Ok(Flow::Continue)
    }

    /// Broadcast `ballot` as this node's vote, and register it.
    fn broadcast_own(&mut self, ballot: Ballot) -> StepResult {
        self.checker.sender.broadcast(&ballot);
        if self.checker.isaac.is_available_round(ballot.basis()) {
            self.checker.isaac.vote(&ballot)?;
        }
        Event::BroadcastBallot(BroadcastBallotEvent {
            timestamp: SystemTime::now(),
            ballot: ballot.clone(),
        })
        .publish(&self.checker.event_publisher);
        self.produced = Some(ballot);
        Ok(Flow::Continue)
    }

    /// The ballot if it carries a proposal, or else a ballot seen earlier that carries the proposal of
    /// the same proposer in the same round.
    fn proposal(&self) -> Option<Ballot> {
        if self.ballot.vote() != VotingHole::Expired {
            Some(self.ballot.clone())
        } else {
            self.checker
                .isaac
                .proposal(self.ballot.basis(), self.ballot.proposer())
        }
    }

    /* ↓↓↓ Base ↓↓↓ */

    fn well_formed(&mut self) -> StepResult {
        let config = &self.checker.config;
        self.ballot.is_well_formed(
            &config.network_id,
            config.transactions_limit,
            config.ballot_time_skew,
        )?;
        Ok(Flow::Continue)
    }

    fn known_validator(&mut self) -> StepResult {
        let source = *self.ballot.source();
        if !self.checker.isaac.is_validator(&source) {
            return Err(CheckerError::UnknownValidator { source });
        }
        Ok(Flow::Continue)
    }

    fn not_own_ballot(&mut self) -> StepResult {
        if *self.ballot.source() == self.me() {
            return Ok(Flow::Stop(CheckerStop::OwnBallot));
        }
        Ok(Flow::Continue)
    }

    fn available_round(&mut self) -> StepResult {
        if !self.checker.isaac.is_available_round(self.ballot.basis()) {
            return Ok(Flow::Stop(CheckerStop::RoundNotAvailable));
        }
        Ok(Flow::Continue)
    }

    fn publish_received(&mut self) -> StepResult {
        Event::ReceiveBallot(ReceiveBallotEvent {
            timestamp: SystemTime::now(),
            origin: self.origin,
            ballot: self.ballot.clone(),
        })
        .publish(&self.checker.event_publisher);
        Ok(Flow::Continue)
    }

    /* ↓↓↓ Shared by phases ↓↓↓ */

    fn vote(&mut self) -> StepResult {
        if !self.own {
            self.checker.isaac.vote(&self.ballot)?;
        }
        Ok(Flow::Continue)
    }

    fn same_proposer(&mut self) -> StepResult {
        if !self.checker.isaac.has_same_proposer(&self.ballot) {
            return Ok(Flow::Stop(CheckerStop::DifferentProposer));
        }
        Ok(Flow::Continue)
    }

    fn voting_result(&mut self) -> StepResult {
        let (result, decided) = self.checker.isaac.can_get_voting_result(&self.ballot);
        if !decided {
            return Ok(Flow::Stop(CheckerStop::NotDecided));
        }
        self.result = result;
        Ok(Flow::Continue)
    }

    /* ↓↓↓ INIT ↓↓↓ */

    fn init_same_proposer(&mut self) -> StepResult {
        if !self.checker.isaac.has_same_proposer(&self.ballot) {
            return self.decide(VotingHole::No, Some("unexpected proposer".to_string()));
        }
        Ok(Flow::Continue)
    }

    /// Check the fee collection and inflation of the proposer transaction against the round. The
    /// collected fee is checked once the transactions are available, in `validate_transactions`.
    fn check_proposer_transaction(&mut self) -> StepResult {
        if self.decision.is_some() {
            return Ok(Flow::Continue);
        }
        match self.proposer_transaction_fault() {
            Some(reason) => self.decide(VotingHole::No, Some(reason.to_string())),
            None => Ok(Flow::Continue),
        }
    }

    fn proposer_transaction_fault(&self) -> Option<&'static str> {
        let basis = *self.ballot.basis();
        let height = basis.height + 1;
        let common_account = self.checker.config.common_account;
        let ptx = self.ballot.proposer_transaction();
        let (
            Some((fee_target, _, txs, fee_height)),
            Some((inflation_target, inflation, inflation_height)),
        ) = (ptx.collect_tx_fee(), ptx.inflation())
        else {
            return Some("malformed proposer transaction");
        };

        if *fee_target != common_account || *inflation_target != common_account {
            Some("proposer transaction pays an unexpected account")
        } else if fee_height != height || inflation_height != height {
            Some("proposer transaction is for an unexpected height")
        } else if txs != self.ballot.transactions().len() as u64 {
            Some("proposer transaction counts an unexpected number of transactions")
        } else if inflation != self.checker.app.inflation_amount(&basis) {
            Some("unexpected inflation amount")
        } else {
            None
        }
    }

    fn fetch_missing_transactions(&mut self) -> StepResult {
        if self.decision.is_some() {
            return Ok(Flow::Continue);
        }

        let mut missing: Vec<CryptoHash> = Vec::new();
        for hash in self.ballot.transactions() {
            if !missing.contains(hash)
                && !self.checker.pool.contains(hash)
                && !self.checker.block_store.contains_transaction(hash)
            {
                missing.push(*hash);
            }
        }
        if missing.is_empty() {
            return Ok(Flow::Continue);
        }

        let proposer = *self.ballot.proposer();
        let timeout = self.checker.config.missing_transactions_timeout;
        match self
            .checker
            .sender
            .get_missing_transactions(proposer, &missing, timeout)
        {
            Ok(transactions) => {
                for transaction in transactions {
                    if missing.contains(&transaction.hash()) {
                        self.fetched.insert(transaction.hash(), transaction);
                    }
                }
                if missing.iter().any(|hash| !self.fetched.contains_key(hash)) {
                    return self.decide(
                        VotingHole::No,
                        Some("proposer did not provide every missing transaction".to_string()),
                    );
                }
                Ok(Flow::Continue)
            }
            Err(err) => self.decide(
                VotingHole::No,
                Some(format!("failed to fetch missing transactions: {:?}", err)),
            ),
        }
    }

    /// Validate the proposed transactions one after another, each on top of the effects of the ones
    /// before it, as they would be applied in the block.
    fn validate_transactions(&mut self) -> StepResult {
        if self.decision.is_some() {
            return Ok(Flow::Continue);
        }
        if self.ballot.transactions().is_empty() {
            return self.decide(VotingHole::Yes, None);
        }

        let mut seen = HashSet::new();
        let mut transactions = Vec::with_capacity(self.ballot.transactions().len());
        let mut fees = Amount::zero();
        for hash in self.ballot.transactions() {
            if !seen.insert(*hash) {
                return self.decide(VotingHole::No, Some(format!("duplicated transaction {hash}")));
            }
            if self.checker.block_store.contains_transaction(hash) {
                return self.decide(
                    VotingHole::No,
                    Some(format!("transaction {hash} is already confirmed")),
                );
            }
            let Some(transaction) = self
                .fetched
                .get(hash)
                .cloned()
                .or_else(|| self.checker.pool.get(hash))
            else {
                return self.decide(VotingHole::No, Some(format!("transaction {hash} is missing")));
            };
            if let Err(err) = transaction.is_well_formed(&self.checker.config.network_id) {
                return self.decide(
                    VotingHole::No,
                    Some(format!("malformed transaction {hash}: {:?}", err)),
                );
            }
            let Some(sum) = fees.checked_add(transaction.fee()) else {
                return self.decide(VotingHole::No, Some("fees overflow".to_string()));
            };
            fees = sum;
            transactions.push(transaction);
        }

        let collected = self
            .ballot
            .proposer_transaction()
            .collect_tx_fee()
            .map(|(_, amount, _, _)| amount);
        if collected != Some(fees) {
            return self.decide(
                VotingHole::No,
                Some("collected fee does not match the proposed transactions".to_string()),
            );
        }

        if let Some(reason) = self.application_fault(&transactions) {
            return self.decide(VotingHole::No, Some(reason));
        }

        // Keep the fetched transactions for finalization.
        for transaction in self.fetched.drain().map(|(_, tx)| tx) {
            self.checker.pool.add(transaction);
        }
        self.decide(VotingHole::Yes, None)
    }

    fn application_fault(&self, transactions: &[Transaction]) -> Option<String> {
        let block = proposed_block(&self.ballot, transactions);
        let mut state = PendingAppState::new(&self.checker.block_store, self.checker.app.as_ref());
        for transaction in transactions {
            if let Err(err) = state.validate_and_apply(&block, transaction) {
                return Some(format!("transaction {}: {err}", transaction.hash()));
            }
        }
        state
            .apply(&block, self.ballot.proposer_transaction().transaction())
            .err()
            .map(|err| format!("proposer transaction: {err}"))
    }

    fn not_voted_sign(&mut self) -> StepResult {
        let me = self.me();
        if self.checker.isaac.is_voted_by(
            self.ballot.basis(),
            self.ballot.proposer(),
            &me,
            BallotState::Sign,
        ) {
            return Ok(Flow::Stop(CheckerStop::AlreadyVoted));
        }
        Ok(Flow::Continue)
    }

    fn broadcast_sign(&mut self) -> StepResult {
        let Some((vote, reason)) = self.decision.take() else {
            return Ok(Flow::Stop(CheckerStop::NotDecided));
        };
        let config = &self.checker.config;
        let ballot = self.ballot.revote(
            &config.keypair,
            &config.network_id,
            BallotState::Sign,
            vote,
            reason,
        );
        self.broadcast_own(ballot)
    }

    fn transit_sign(&mut self) -> StepResult {
        self.checker
            .state_manager
            .transit_isaac_state(*self.ballot.basis(), BallotState::Sign);
        Ok(Flow::Continue)
    }

    /* ↓↓↓ SIGN ↓↓↓ */

    fn not_voted_accept(&mut self) -> StepResult {
        let me = self.me();
        if self.checker.isaac.is_voted_by(
            self.ballot.basis(),
            self.ballot.proposer(),
            &me,
            BallotState::Accept,
        ) {
            return Ok(Flow::Stop(CheckerStop::AlreadyVoted));
        }
        Ok(Flow::Continue)
    }

    fn broadcast_accept(&mut self) -> StepResult {
        let ballot = match self.result {
            VotingHole::Expired => {
                let config = &self.checker.config;
                Ballot::new_expired(
                    &config.keypair,
                    &config.network_id,
                    *self.ballot.basis(),
                    *self.ballot.proposer(),
                    BallotState::Accept,
                )
            }
            result => {
                let Some(proposal) = self.proposal() else {
                    return Ok(Flow::Stop(CheckerStop::MissingProposal));
                };
                let config = &self.checker.config;
                proposal.revote(
                    &config.keypair,
                    &config.network_id,
                    BallotState::Accept,
                    result,
                    None,
                )
            }
        };
        self.broadcast_own(ballot)
    }

    fn transit_accept(&mut self) -> StepResult {
        self.checker
            .state_manager
            .transit_isaac_state(*self.ballot.basis(), BallotState::Accept);
        Ok(Flow::Continue)
    }

    /* ↓↓↓ ACCEPT ↓↓↓ */

    fn close_round(&mut self) -> StepResult {
        let basis = *self.ballot.basis();
        let proposer = *self.ballot.proposer();

        if self.result == VotingHole::Yes {
            let Some(proposal) = self.proposal() else {
                return Ok(Flow::Stop(CheckerStop::MissingProposal));
            };
            let latest_block = self.checker.isaac.latest_confirmed_block();
            let block = match finish_ballot(
                &proposal,
                &latest_block,
                &mut self.checker.block_store,
                self.checker.app.as_ref(),
                &self.checker.pool,
            ) {
                Ok(block) => block,
                Err(err) => {
                    // Not retried: the round is closed, and progress resumes in a later round.
                    self.checker.isaac.abandon_round(&basis);
                    if let FinishError::App { transaction, .. } = &err {
                        self.checker.pool.remove(&[*transaction]);
                    }
                    return Err(err.into());
                }
            };

            self.checker.isaac.set_latest_confirmed_block(block.clone());
            self.checker
                .isaac
                .close_consensus(&proposer, &basis, VotingHole::Yes)?;
            self.checker.pool.remove(&block.transactions);
            self.checker
                .state_manager
                .transit_isaac_state(basis, BallotState::AllConfirm);
            Event::FinalizeBlock(FinalizeBlockEvent {
                timestamp: SystemTime::now(),
                block,
            })
            .publish(&self.checker.event_publisher);
        } else {
            self.checker
                .isaac
                .close_consensus(&proposer, &basis, self.result)?;
        }

        Event::CloseRound(CloseRoundEvent {
            timestamp: SystemTime::now(),
            proposer,
            basis,
            vote: self.result,
        })
        .publish(&self.checker.event_publisher);
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use crate::ballot::{basis::VotingBasis, proposer_transaction::ProposerTransaction};
    use crate::consensus::{
        proposer::FixedSelector, state_manager::IsaacStateManager, state_manager::StateManagerConfiguration,
        threshold::ThresholdPolicy,
    };
    use crate::networking::messages::Message;
    use crate::test_utils::{
        keypairs, payment, test_network_id, MemDB, RecordingNetwork, TestApp, REJECTED_KEY,
    };
    use crate::types::{
        block::Block,
        data_types::{BlockHeight, RoundNumber},
        update_sets::AppStateUpdates,
    };

    use super::*;

    fn common_account() -> Address {
        Address::new([5u8; 32])
    }

    struct Fixture {
        checker: BallotChecker<MemDB, TestApp, RecordingNetwork>,
        network: RecordingNetwork,
        isaac: Arc<Isaac>,
        block_store: BlockStore<MemDB>,
        _state_manager: IsaacStateManager<MemDB, TestApp, RecordingNetwork>,
    }

    fn fixture(keypairs: &[Keypair], me: usize) -> Fixture {
        let mut block_store = BlockStore::new(MemDB::new());
        block_store
            .initialize(&Block::genesis(), &AppStateUpdates::new())
            .unwrap();
        let isaac = Arc::new(Isaac::new(
            keypairs.iter().map(|k| k.address()).collect(),
            ThresholdPolicy::new(66, keypairs.len()),
            Box::new(FixedSelector(keypairs[0].address())),
            Block::genesis(),
        ));
        let network = RecordingNetwork::new();
        let pool = TransactionPool::new();
        let app = Arc::new(TestApp);

        let (state_manager, handle) = IsaacStateManager::new(
            StateManagerConfiguration {
                keypair: keypairs[me].clone(),
                network_id: test_network_id(),
                common_account: common_account(),
                transactions_limit: 1000,
                timeout_init: Duration::from_secs(60),
                timeout_sign: Duration::from_secs(60),
                timeout_accept: Duration::from_secs(60),
                timeout_allconfirm: Duration::ZERO,
            },
            isaac.clone(),
            block_store.clone(),
            app.clone(),
            pool.clone(),
            network.clone(),
            mpsc::channel().0,
            None,
        );
        let checker = BallotChecker::new(
            CheckerConfiguration {
                keypair: keypairs[me].clone(),
                network_id: test_network_id(),
                common_account: common_account(),
                transactions_limit: 1000,
                ballot_time_skew: Duration::from_secs(60),
                missing_transactions_timeout: Duration::from_millis(100),
            },
            isaac.clone(),
            block_store.clone(),
            app,
            pool,
            network.clone(),
            handle,
            None,
        );

        Fixture {
            checker,
            network,
            isaac,
            block_store,
            _state_manager: state_manager,
        }
    }

    fn proposal(proposer: &Keypair, transactions: &[Transaction]) -> Ballot {
        let basis = VotingBasis::from_block(&Block::genesis(), RoundNumber::init());
        let fees = transactions
            .iter()
            .fold(Amount::zero(), |sum, tx| sum.checked_add(tx.fee()).unwrap());
        let ptx = ProposerTransaction::new(
            proposer,
            &test_network_id(),
            common_account(),
            &basis,
            fees,
            transactions.len() as u64,
            TestApp::INFLATION,
        );
        Ballot::new_proposal(
            proposer,
            &test_network_id(),
            basis,
            transactions.iter().map(|tx| tx.hash()).collect(),
            ptx,
        )
    }

    fn broadcast_ballots(network: &RecordingNetwork) -> Vec<Ballot> {
        network
            .broadcasts()
            .into_iter()
            .filter_map(|message| match message {
                Message::Ballot(bytes) => Ballot::from_bytes(&bytes).ok(),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn empty_proposal_is_signed_yes() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let proposal = proposal(&keypairs[0], &[]);

        let outcome = fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();
        assert_eq!(outcome, None);

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].state(), BallotState::Sign);
        assert_eq!(broadcast[0].vote(), VotingHole::Yes);
        assert_eq!(broadcast[0].source(), &keypairs[1].address());
        assert!(fixture.isaac.is_voted(&broadcast[0]));
    }

    #[test]
    fn unobtainable_transactions_are_signed_no() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let proposal = proposal(&keypairs[0], &[payment(&keypairs[2], 0)]);

        fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].vote(), VotingHole::No);
        assert!(broadcast[0].reason().is_some());
    }

    #[test]
    fn wrong_inflation_is_signed_no() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let basis = VotingBasis::from_block(&Block::genesis(), RoundNumber::init());
        let ptx = ProposerTransaction::new(
            &keypairs[0],
            &test_network_id(),
            common_account(),
            &basis,
            Amount::zero(),
            0,
            Amount::new(TestApp::INFLATION.int() + 1),
        );
        let proposal = Ballot::new_proposal(&keypairs[0], &test_network_id(), basis, Vec::new(), ptx);

        fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast[0].vote(), VotingHole::No);
        assert_eq!(broadcast[0].reason(), Some("unexpected inflation amount"));
    }

    #[test]
    fn ballots_from_unknown_sources_are_rejected() {
        let keypairs = keypairs(4);
        let mut fixture = fixture(&keypairs[..3], 1);
        let stranger = proposal(&keypairs[0], &[]).revote(
            &keypairs[3],
            &test_network_id(),
            BallotState::Sign,
            VotingHole::Yes,
            None,
        );

        let result = fixture
            .checker
            .check(keypairs[3].address(), &stranger.to_bytes());
        assert!(matches!(result, Err(CheckerError::UnknownValidator { .. })));
        assert!(fixture.isaac.running_round_indices().is_empty());
    }

    #[test]
    fn finalized_round_is_not_processed_again() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let network_id = test_network_id();
        let proposal = proposal(&keypairs[0], &[]);

        // INIT: this node signs.
        fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();

        // SIGN from the other validator decides SIGN, and this node accepts.
        let sign = proposal.revote(&keypairs[2], &network_id, BallotState::Sign, VotingHole::Yes, None);
        fixture
            .checker
            .check(keypairs[2].address(), &sign.to_bytes())
            .unwrap();
        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 2);
        assert_eq!(broadcast[1].state(), BallotState::Accept);
        assert_eq!(broadcast[1].vote(), VotingHole::Yes);

        // ACCEPT from the other validator decides ACCEPT.
        let accept = proposal.revote(&keypairs[2], &network_id, BallotState::Accept, VotingHole::Yes, None);
        assert_eq!(
            fixture
                .checker
                .check(keypairs[2].address(), &accept.to_bytes())
                .unwrap(),
            None
        );
        let latest = fixture.block_store.latest_block().unwrap();
        assert_eq!(latest.height, BlockHeight::new(1));
        assert_eq!(fixture.isaac.latest_confirmed_block(), latest);
        assert!(fixture.isaac.running_round_indices().is_empty());

        // Replaying the deciding ballot changes nothing.
        assert_eq!(
            fixture
                .checker
                .check(keypairs[2].address(), &accept.to_bytes())
                .unwrap(),
            Some(CheckerStop::RoundNotAvailable)
        );
        assert_eq!(fixture.block_store.latest_block().unwrap(), latest);
        assert_eq!(broadcast_ballots(&fixture.network).len(), 2);
    }

    #[test]
    fn ballots_of_an_unexpected_proposer_are_not_decided() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let network_id = test_network_id();
        // `keypairs[0]` is the proposer of the round.
        let rogue = proposal(&keypairs[2], &[]);

        for state in [BallotState::Sign, BallotState::Accept] {
            let ballot = rogue.revote(&keypairs[0], &network_id, state, VotingHole::Yes, None);
            assert_eq!(
                fixture
                    .checker
                    .check(keypairs[0].address(), &ballot.to_bytes())
                    .unwrap(),
                Some(CheckerStop::DifferentProposer)
            );
        }

        assert!(broadcast_ballots(&fixture.network).is_empty());
        assert_eq!(fixture.block_store.latest_block().unwrap(), Block::genesis());
        assert_eq!(fixture.isaac.latest_confirmed_block(), Block::genesis());
    }

    #[test]
    fn sign_decided_by_an_expired_ballot_accepts_the_stored_proposal() {
        // 6 validators: the threshold is 4.
        let keypairs = keypairs(6);
        let mut fixture = fixture(&keypairs, 1);
        let network_id = test_network_id();
        let proposal = proposal(&keypairs[0], &[payment(&keypairs[5], 0)]);

        for keypair in &keypairs[1..5] {
            let sign = proposal.revote(keypair, &network_id, BallotState::Sign, VotingHole::Yes, None);
            fixture.isaac.vote(&sign).unwrap();
        }
        let expired = Ballot::new_expired(
            &keypairs[5],
            &network_id,
            *proposal.basis(),
            keypairs[0].address(),
            BallotState::Sign,
        );
        fixture
            .checker
            .check(keypairs[5].address(), &expired.to_bytes())
            .unwrap();

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].state(), BallotState::Accept);
        assert_eq!(broadcast[0].vote(), VotingHole::Yes);
        assert_eq!(broadcast[0].source(), &keypairs[1].address());
        assert_eq!(broadcast[0].basis(), proposal.basis());
        assert_eq!(broadcast[0].transactions(), proposal.transactions());
    }

    #[test]
    fn proposal_with_conflicting_transactions_is_signed_no() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        // `TestApp` lets every account send a single transaction.
        let first = payment(&keypairs[2], 0);
        let second = payment(&keypairs[2], 1);
        fixture.checker.pool.add(first.clone());
        fixture.checker.pool.add(second.clone());
        let proposal = proposal(&keypairs[0], &[first, second.clone()]);

        fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].vote(), VotingHole::No);
        let reason = broadcast[0].reason().unwrap();
        assert!(reason.starts_with(&format!("transaction {}", second.hash())), "{reason}");
    }

    #[test]
    fn failed_finalization_closes_the_round_and_evicts_the_transaction() {
        let keypairs = keypairs(3);
        let mut fixture = fixture(&keypairs, 1);
        let network_id = test_network_id();
        let tx = payment(&keypairs[2], 0);
        fixture.checker.pool.add(tx.clone());
        let proposal = proposal(&keypairs[0], &[tx.clone()]);

        fixture
            .checker
            .check(keypairs[0].address(), &proposal.to_bytes())
            .unwrap();
        assert_eq!(broadcast_ballots(&fixture.network)[0].vote(), VotingHole::Yes);

        // The transaction is refused once signed, so applying it fails.
        let mut rejecting = AppStateUpdates::new();
        rejecting.insert(REJECTED_KEY.to_vec(), tx.hash().bytes().to_vec());
        let mut wb = fixture.block_store.write_batch();
        wb.apply_app_state_updates(&rejecting);
        fixture.block_store.write(wb);

        let sign = proposal.revote(&keypairs[2], &network_id, BallotState::Sign, VotingHole::Yes, None);
        fixture
            .checker
            .check(keypairs[2].address(), &sign.to_bytes())
            .unwrap();
        let accept = proposal.revote(&keypairs[2], &network_id, BallotState::Accept, VotingHole::Yes, None);
        let result = fixture
            .checker
            .check(keypairs[2].address(), &accept.to_bytes());
        assert!(matches!(
            result,
            Err(CheckerError::Finish(FinishError::App { transaction, .. })) if transaction == tx.hash()
        ));

        // The round is not finalized again.
        assert_eq!(
            fixture
                .checker
                .check(keypairs[2].address(), &accept.to_bytes())
                .unwrap(),
            Some(CheckerStop::RoundNotAvailable)
        );
        assert!(!fixture.checker.pool.contains(&tx.hash()));
        assert_eq!(fixture.block_store.latest_block().unwrap(), Block::genesis());
        assert!(fixture.isaac.running_round_indices().is_empty());
    }

    #[test]
    fn own_expired_ballot_can_decide_its_phase() {
        // 4 validators: the threshold is 3.
        let keypairs = keypairs(4);
        let mut fixture = fixture(&keypairs, 1);
        let network_id = test_network_id();
        let basis = VotingBasis::from_block(&Block::genesis(), RoundNumber::init());
        let expired = |keypair: &Keypair| {
            Ballot::new_expired(keypair, &network_id, basis, keypairs[0].address(), BallotState::Sign)
        };

        for keypair in &keypairs[2..4] {
            assert_eq!(
                fixture
                    .checker
                    .check(keypair.address(), &expired(keypair).to_bytes())
                    .unwrap(),
                Some(CheckerStop::NotDecided)
            );
        }
        assert!(broadcast_ballots(&fixture.network).is_empty());

        // Registered and broadcast by the state manager on its INIT timeout.
        let mine = expired(&keypairs[1]);
        fixture.isaac.vote(&mine).unwrap();
        assert_eq!(fixture.checker.check_own(mine).unwrap(), None);

        let broadcast = broadcast_ballots(&fixture.network);
        assert_eq!(broadcast.len(), 1);
        assert_eq!(broadcast[0].state(), BallotState::Accept);
        assert_eq!(broadcast[0].vote(), VotingHole::Expired);
        assert_eq!(broadcast[0].source(), &keypairs[1].address());
    }
}
