use std::{thread, time::Duration};

use ed25519_dalek::SigningKey;
use isaac_rs::types::{
    crypto_primitives::Keypair,
    data_types::{Address, Amount},
    transaction::{Operation, Transaction, TransactionBody},
    validator_set::ValidatorSet,
};
use log::LevelFilter;
use rand_core::OsRng;

mod common;

use crate::common::{
    ledger_app::LedgerApp,
    logging::{first_seven_base64_chars, setup_logger},
    network::mock_network,
    node::{common_account, test_network_id, Node},
};

#[test]
fn payment_is_finalized_by_every_validator_test() {
    setup_logger(LevelFilter::Debug);

    // 1. Initialize test components.

    // 1.1. Create signing keys for 3 validators, and a keypair for each of 2 funded accounts.
    let mut csprg = OsRng {};
    let signing_keys: Vec<SigningKey> = (0..3).map(|_| SigningKey::generate(&mut csprg)).collect();
    let payer = Keypair::new(SigningKey::generate(&mut csprg));
    let payee = Keypair::new(SigningKey::generate(&mut csprg)).address();

    // 1.2. Create a mock network connecting the 3 validators.
    let addresses: Vec<Address> = signing_keys
        .iter()
        .map(|key| Address::from(key.verifying_key()))
        .collect();
    let network_stubs = mock_network(addresses.iter().copied());

    // 1.3. Fund the 2 accounts with 1000 each.
    let init_as = LedgerApp::initial_app_state(&[payer.address(), payee], Amount::new(1000));

    // 1.4. Every validator is in the validator set, and validator 0 proposes in every round.
    let mut validators = ValidatorSet::new();
    addresses.iter().for_each(|address| validators.put(*address));
    let proposer = addresses[0];

    // 1.5. Simultaneously start all validators.
    let mut nodes: Vec<Node> = signing_keys
        .into_iter()
        .zip(network_stubs)
        .map(|(keypair, network)| {
            Node::new(
                keypair,
                network,
                validators.clone(),
                proposer,
                init_as.clone(),
                Duration::from_millis(1000),
            )
        })
        .collect();

    // 2. Submit a payment of 100 to the proposer.
    log::debug!("Submitting a payment of 100 to the proposer.");
    let payment = Transaction::new(
        &payer,
        &test_network_id(),
        TransactionBody {
            source: payer.address(),
            fee: Amount::new(1),
            sequence_id: 0,
            operations: vec![Operation::Payment {
                target: payee,
                amount: Amount::new(100),
            }],
        },
    );
    assert!(nodes[0].submit_transaction(payment.clone()));
    assert!(!nodes[0].submit_transaction(payment.clone()));

    // 3. Poll every validator until the payment is in a finalized block, and out of its pool.
    log::debug!("Polling every validator until the payment is finalized.");
    while nodes
        .iter()
        .any(|node| !node.is_confirmed(&payment) || node.pooled_transactions() != 0)
    {
        thread::sleep(Duration::from_millis(100));
    }

    // 4. Every validator finalized the same block with the payment, and no longer runs rounds below it.
    let block = nodes[0].block_containing(&payment).unwrap();
    assert_eq!(block.transactions, vec![payment.hash()]);
    for node in &nodes {
        assert_eq!(node.block_containing(&payment).map(|b| b.hash), Some(block.hash));
        assert!(node
            .running_round_indices()
            .iter()
            .all(|index| index.height >= block.height));
    }

    // 5. Every validator applied the payment and the proposer transactions.
    for node in &nodes {
        log::debug!(
            "Checking the app state of {}.",
            first_seven_base64_chars(&node.address().bytes())
        );
        assert!(node.latest_block().height.int() >= 1);
        assert_eq!(node.balance(&payer.address()), Some(Amount::new(899)));
        assert_eq!(node.balance(&payee), Some(Amount::new(1100)));
        assert!(node.balance(&common_account()).unwrap() >= LedgerApp::INFLATION);
    }
}
