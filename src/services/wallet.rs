use std::sync::LazyLock;

use regex::Regex;
use tokio::sync::watch;

use crate::error::WalletError;

static EVM_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").ok());
static TX_HASH: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").ok());

/// Whether `address` is a 20-byte hex EVM address.
pub fn is_valid_evm_address(address: &str) -> bool {
    EVM_ADDRESS
        .as_ref()
        .is_some_and(|re| re.is_match(address.trim()))
}

/// Whether `hash` is a 32-byte hex transaction hash.
pub fn is_valid_tx_hash(hash: &str) -> bool {
    TX_HASH.as_ref().is_some_and(|re| re.is_match(hash.trim()))
}

/// Connection status published by the wallet session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletStatus {
    pub connected: bool,
    pub address: Option<String>,
}

impl WalletStatus {
    pub fn connected(address: impl Into<String>) -> Self {
        Self {
            connected: true,
            address: Some(address.into()),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    /// The account address, only while connected.
    pub fn active_address(&self) -> Option<&str> {
        if self.connected {
            self.address.as_deref()
        } else {
            None
        }
    }
}

/// Process-wide wallet session. The wizard only ever holds a receiver.
#[derive(Debug, Clone)]
pub struct WalletSession {
    tx: watch::Sender<WalletStatus>,
}

impl Default for WalletSession {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletSession {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(WalletStatus::disconnected());
        Self { tx }
    }

    pub fn connect(&self, address: &str) -> Result<(), WalletError> {
        let address = address.trim();
        if !is_valid_evm_address(address) {
            return Err(WalletError::InvalidAddress(address.to_string()));
        }
        tracing::info!(address = %address, "Wallet connected");
        self.tx.send_replace(WalletStatus::connected(address));
        Ok(())
    }

    pub fn disconnect(&self) {
        if self.tx.borrow().connected {
            tracing::info!("Wallet disconnected");
        }
        self.tx.send_replace(WalletStatus::disconnected());
    }

    pub fn status(&self) -> WalletStatus {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<WalletStatus> {
        self.tx.subscribe()
    }
}
