//! Script Magic: a personal script inventory.
//!
//! Scripts live in remote gists; a local JSON mapping names them and is mirrored
//! as one more gist so the inventory follows the user between machines. The
//! remote is optional at every step: when it is missing or down, the local
//! mapping stays authoritative.

pub mod config;
pub mod error;
pub mod header;
pub mod logging;
pub mod provider;
pub mod registry;
pub mod remote;
pub mod store;
pub mod sync;
pub mod tooling;
pub mod types;
