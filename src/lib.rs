//! bridgefetch - Tor bridge acquisition.
//!
//! Bootstraps a local Tor client on a known entry bridge, fetches the public
//! bridge listings through it, and keeps a persistent, de-duplicated record of
//! every bridge seen per transport.

pub mod archive;
pub mod bridges;
pub mod cli;
pub mod config;
pub mod export;
pub mod http_client;
pub mod notify;
pub mod runner;
pub mod store;
pub mod tor;
