/*
    Copyright © 2024, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions for receiving messages from the P2P network.

use std::{
    sync::mpsc::{self, Receiver, TryRecvError},
    thread::{self, JoinHandle},
};

use crate::types::data_types::Address;

use super::{messages::Message, network::Network};

/// Spawn the poller thread, which polls the [`Network`] for messages and forwards them, in arrival
/// order, to the returned receiver.
///
/// The receiver is consumed by a single thread, so messages from the same peer are processed in the
/// order they arrived.
pub(crate) fn start_polling<N: Network>(
    mut network: N,
    shutdown_signal: Receiver<()>,
) -> (JoinHandle<()>, Receiver<(Address, Message)>) {
    let (to_msg_receiver, msg_receiver) = mpsc::channel();

    let poller_thread = thread::spawn(move || loop {
        match shutdown_signal.try_recv() {
            Ok(()) => return,
            Err(TryRecvError::Empty) => (),
            Err(TryRecvError::Disconnected) => {
                panic!("Poller thread disconnected from main thread")
            }
        }

        if let Some((origin, msg)) = network.recv() {
            let _ = to_msg_receiver.send((origin, msg));
        } else {
            thread::yield_now()
        }
    });

    (poller_thread, msg_receiver)
}
