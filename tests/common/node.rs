use std::time::Duration;

use ed25519_dalek::SigningKey;
use isaac_rs::{
    ballot::basis::RoundIndex,
    checker::CheckerError,
    consensus::{proposer::FixedSelector, state_manager::IsaacState},
    events::{CloseRoundEvent, FinalizeBlockEvent, ProposeBallotEvent, TransitStateEvent},
    node::{self, Configuration, NodeSpec},
    types::{
        block::Block,
        data_types::{Address, Amount, BlockHeight, NetworkID},
        transaction::Transaction,
        update_sets::AppStateUpdates,
        validator_set::ValidatorSet,
    },
};

use crate::common::{
    ledger_app::LedgerApp,
    logging::{first_seven_base64_chars, log_with_context},
    mem_db::MemDB,
    network::NetworkStub,
};

/// Things the Nodes will have in common:
/// - Validator Set.
/// - Proposer of every round.
/// - Initial App State.
/// - Timeouts.
///
/// Things that they will differ in:
/// - Network instance.
/// - KVStore.
/// - Keypair.
pub(crate) struct Node {
    address: Address,
    node: node::Node<MemDB, LedgerApp, NetworkStub>,
}

pub(crate) fn test_network_id() -> NetworkID {
    NetworkID::new(b"isaac-integration-test".to_vec())
}

pub(crate) fn common_account() -> Address {
    Address::new([5u8; 32])
}

impl Node {
    pub(crate) fn new(
        keypair: SigningKey,
        network: NetworkStub,
        validators: ValidatorSet,
        proposer: Address,
        init_as: AppStateUpdates,
        phase_timeout: Duration,
    ) -> Node {
        let address = Address::from(keypair.verifying_key());
        let kv_store = MemDB::new();
        node::Node::<MemDB, LedgerApp, NetworkStub>::initialize(kv_store.clone(), init_as).unwrap();

        let configuration = Configuration::builder()
            .me(keypair)
            .network_id(test_network_id())
            .validators(validators)
            .common_account(common_account())
            .timeout_init(phase_timeout)
            .timeout_sign(phase_timeout)
            .timeout_accept(phase_timeout)
            .timeout_allconfirm(Duration::from_millis(100))
            .missing_transactions_timeout(Duration::from_millis(500))
            .log_events(false)
            .build();

        let node = NodeSpec::builder()
            .app(LedgerApp)
            .network(network.clone())
            .kv_store(kv_store)
            .configuration(configuration)
            .proposer_selector(FixedSelector(proposer))
            .on_propose_ballot(propose_ballot_handler(address))
            .on_transit_state(transit_state_handler(address))
            .on_close_round(close_round_handler(address))
            .on_finalize_block(finalize_block_handler(address))
            .build()
            .start()
            .unwrap();
        network.register_pool(node.transaction_pool().clone());

        Node { address, node }
    }

    pub(crate) fn submit_transaction(&mut self, transaction: Transaction) -> bool {
        self.node.submit_transaction(transaction).unwrap()
    }

    /// Submit `transaction`, which the node may refuse.
    pub(crate) fn try_submit_transaction(&mut self, transaction: Transaction) -> Result<bool, CheckerError> {
        self.node.submit_transaction(transaction)
    }

    pub(crate) fn latest_block(&self) -> Block {
        self.node.latest_block()
    }

    pub(crate) fn isaac_state(&self) -> IsaacState {
        self.node.isaac_state()
    }

    pub(crate) fn is_confirmed(&self, transaction: &Transaction) -> bool {
        self.node.block_store().contains_transaction(&transaction.hash())
    }

    /// The finalized block that contains `transaction`, if any.
    pub(crate) fn block_containing(&self, transaction: &Transaction) -> Option<Block> {
        let latest = self.latest_block().height.int();
        (1..=latest)
            .filter_map(|height| {
                self.node
                    .block_store()
                    .block_at_height(BlockHeight::new(height))
                    .unwrap()
            })
            .find(|block| block.transactions.contains(&transaction.hash()))
    }

    pub(crate) fn running_round_indices(&self) -> Vec<RoundIndex> {
        self.node.running_round_indices()
    }

    pub(crate) fn pooled_transactions(&self) -> usize {
        self.node.transaction_pool().len()
    }

    pub(crate) fn balance(&self, account: &Address) -> Option<Amount> {
        self.node
            .block_store()
            .app_state(&account.bytes())
            .map(LedgerApp::decode_balance)
    }

    pub(crate) fn address(&self) -> Address {
        self.address
    }
}

fn propose_ballot_handler(address: Address) -> impl Fn(&ProposeBallotEvent) + Send + 'static {
    move |propose_ballot_event| {
        log_with_context(
            Some(address),
            &format!(
                "Proposed, height: {}, round: {}, no. of transactions: {}",
                propose_ballot_event.ballot.basis().height,
                propose_ballot_event.ballot.basis().round,
                propose_ballot_event.ballot.transactions().len(),
            ),
        );
    }
}

fn transit_state_handler(address: Address) -> impl Fn(&TransitStateEvent) + Send + 'static {
    move |transit_state_event| {
        log_with_context(
            Some(address),
            &format!(
                "Transited, height: {}, round: {}, state: {}",
                transit_state_event.basis.height,
                transit_state_event.basis.round,
                transit_state_event.state,
            ),
        );
    }
}

fn close_round_handler(address: Address) -> impl Fn(&CloseRoundEvent) + Send + 'static {
    move |close_round_event| {
        log_with_context(
            Some(address),
            &format!(
                "Closed Round, height: {}, round: {}, result: {}",
                close_round_event.basis.height,
                close_round_event.basis.round,
                close_round_event.vote,
            ),
        );
    }
}

fn finalize_block_handler(address: Address) -> impl Fn(&FinalizeBlockEvent) + Send + 'static {
    move |finalize_block_event| {
        log_with_context(
            Some(address),
            &format!(
                "Finalized Block, block hash: {}, height: {}, no. of transactions: {}",
                first_seven_base64_chars(&finalize_block_event.block.hash.bytes()),
                finalize_block_event.block.height,
                finalize_block_event.block.transactions.len(),
            ),
        );
    }
}
