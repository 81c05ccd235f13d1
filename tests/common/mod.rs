pub(crate) mod ledger_app;

pub(crate) mod logging;

pub(crate) mod mem_db;

pub(crate) mod network;

pub(crate) mod node;
