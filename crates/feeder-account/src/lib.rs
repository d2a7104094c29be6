//! Signer identity for the feeder.
//!
//! The account owns the private key that signs every oracle write. Other
//! crates only see its address and an alloy wallet handle; key material never
//! leaves this crate.

use alloy::network::EthereumWallet;
use async_trait::async_trait;
use feeder_types::Address;
use thiserror::Error;

pub mod implementations {
	pub mod local;
}

#[derive(Debug, Error)]
pub enum AccountError {
	#[error("Invalid key: {0}")]
	InvalidKey(String),
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// A source of signing capability.
#[async_trait]
pub trait AccountInterface: Send + Sync {
	/// Address transactions are sent from.
	async fn address(&self) -> Result<Address, AccountError>;

	/// Wallet used by the chain provider to sign outgoing transactions.
	fn wallet(&self) -> EthereumWallet;
}

pub struct AccountService {
	provider: Box<dyn AccountInterface>,
}

impl AccountService {
	pub fn new(provider: Box<dyn AccountInterface>) -> Self {
		Self { provider }
	}

	pub async fn get_address(&self) -> Result<Address, AccountError> {
		self.provider.address().await
	}

	pub fn wallet(&self) -> EthereumWallet {
		self.provider.wallet()
	}
}
