pub mod certs;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod listing;
pub mod logging;
pub mod server;
pub mod state;
pub mod supervisor;
pub mod tasks;
pub mod types;
