//! Transaction delivery types for the feeder.
//!
//! This module defines the chain-facing types: addresses, transaction hashes,
//! the transaction parameters built for each oracle write, and the
//! observational result of a successful submission.

use alloy::primitives::{Address as AlloyAddress, Bytes, TxKind, U256};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Blockchain address representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl From<AlloyAddress> for Address {
	fn from(addr: AlloyAddress) -> Self {
		Address(addr.0 .0)
	}
}

impl From<Address> for AlloyAddress {
	fn from(addr: Address) -> Self {
		AlloyAddress::from(addr.0)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(self.0))
	}
}

/// Blockchain transaction hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash(pub Vec<u8>);

impl TransactionHash {
	/// Short form for log lines.
	pub fn truncated(&self) -> String {
		let hash_str = hex::encode(&self.0);
		if hash_str.len() <= 8 {
			hash_str
		} else {
			format!("{}..", &hash_str[..8])
		}
	}
}

impl fmt::Display for TransactionHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{}", hex::encode(&self.0))
	}
}

/// Parameters of an oracle write transaction.
///
/// Gas limit and gas price are always set explicitly by the feeder so the
/// provider never has to estimate them.
#[derive(Debug, Clone)]
pub struct Transaction {
	/// Sender, the signer identity.
	pub from: Address,
	/// Oracle contract (None for contract creation).
	pub to: Option<Address>,
	/// ABI-encoded calldata.
	pub data: Vec<u8>,
	/// Chain ID for replay protection.
	pub chain_id: u64,
	/// Fixed gas limit for the write.
	pub gas_limit: u64,
	/// Marked-up legacy gas price in wei.
	pub gas_price: u128,
}

impl From<Transaction> for TransactionRequest {
	fn from(tx: Transaction) -> Self {
		let to = match tx.to {
			Some(addr) => TxKind::Call(addr.into()),
			None => TxKind::Create,
		};

		TransactionRequest {
			from: Some(tx.from.into()),
			to: Some(to),
			chain_id: Some(tx.chain_id),
			value: Some(U256::ZERO),
			gas: Some(tx.gas_limit),
			gas_price: Some(tx.gas_price),
			input: TransactionInput::new(Bytes::from(tx.data)),
			..Default::default()
		}
	}
}

/// Outcome of a broadcast oracle write.
///
/// Purely observational; it feeds logs and events and is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionResult {
	/// Hash of the broadcast transaction.
	pub transaction_hash: TransactionHash,
	/// Contract the transaction was sent to.
	pub recipient: Address,
	/// Gas price the transaction was priced at.
	pub gas_price: u128,
}
