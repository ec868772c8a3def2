pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod gateway;
pub mod handoff;
pub mod logging;
pub mod market;
pub mod types;
pub mod view;

#[cfg(test)]
mod test_helpers;
