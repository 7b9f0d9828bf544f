//! Relay core library — configuration, completion client, and gateway
//! used by the relay CLI.

pub mod completion;
pub mod config;
pub mod gateway;
