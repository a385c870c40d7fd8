//! Tests against a running broker on localhost, run them with
//! `cargo test --features integration-tests`.
#![cfg(feature = "integration-tests")]

mod confirm;
mod connection;
mod helper;
mod publish;
mod queue;
