pub mod aggregator;
pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod polling;
pub mod sources;
pub mod transport;
