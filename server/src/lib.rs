pub extern crate actix_web;

pub mod caption;
pub mod config;
pub mod connection;
mod connection_tx_storage;
pub mod error;
pub mod handlers;
pub mod server;
mod server_state;
