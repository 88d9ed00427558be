//! Slyck: bridge any supported asset to HyperEVM.
//!
//! The crate is split into a headless wizard core and the collaborators it
//! drives:
//!
//! - [`wizard`]: the Connect → Configure → Review → Execute state machine.
//! - [`services`]: collaborator traits (chain/token directory, quoting,
//!   execution) and the wallet session the wizard observes.
//! - [`lifi`]: LI.FI-backed implementations of those collaborators.
//! - [`cli`]: the terminal frontend, doctor and config commands.

pub mod amount;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod lifi;
pub mod model;
pub mod services;
pub mod settings;
pub mod wizard;

pub use error::{Error, Result};
