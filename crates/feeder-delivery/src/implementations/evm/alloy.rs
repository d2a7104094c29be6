//! Alloy-based delivery to an EVM key-value oracle.
//!
//! Every write is a legacy transaction with an explicit gas limit and gas
//! price, signed by the feeder's wallet. The nonce is read from the node's
//! pending count before each send, so a rejected or abandoned transaction
//! never leaves a gap that would stall later writes.

use crate::{DeliveryError, DeliveryInterface};
use alloy::network::{Ethereum, EthereumWallet, ReceiptResponse};
use alloy::primitives::Address as AlloyAddress;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::sol;
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use feeder_types::{
	evm_address, hex_bytes, http_url, Address, ConfigSchema, Field, FieldType, Schema,
	SubmissionResult, Transaction, TransactionHash,
};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

sol! {
	/// On-chain key-value oracle written by the feeder.
	interface IKeyValueOracle {
		function setValue(string key, uint128 value, uint128 timestamp) external;
	}
}

const DEFAULT_DEPLOY_GAS_LIMIT: u64 = 3_000_000;
const DEFAULT_DEPLOY_TIMEOUT_SECS: u64 = 180;

/// ABI-encoded `setValue(key, value, timestamp)` calldata.
pub fn encode_set_value(key: &str, value: u128, timestamp: u64) -> Vec<u8> {
	IKeyValueOracle::setValueCall {
		key: key.to_string(),
		value,
		timestamp: u128::from(timestamp),
	}
	.abi_encode()
}

/// Contract deployment parameters, used when no address is configured.
#[derive(Debug, Clone)]
pub struct DeploySettings {
	pub bytecode: Vec<u8>,
	pub gas_limit: u64,
	pub timeout: Duration,
}

/// Delivery over an alloy HTTP provider.
pub struct AlloyDelivery {
	provider: Box<dyn Provider<Ethereum>>,
	from: Address,
	chain_id: u64,
	configured_contract: Option<Address>,
	deploy: Option<DeploySettings>,
	contract: OnceCell<Address>,
}

impl AlloyDelivery {
	pub fn new(
		rpc_url: &str,
		chain_id: u64,
		wallet: EthereumWallet,
		from: Address,
		contract: Option<Address>,
		deploy: Option<DeploySettings>,
	) -> Result<Self, DeliveryError> {
		let url = rpc_url
			.parse()
			.map_err(|e| DeliveryError::Configuration(format!("Invalid RPC URL: {}", e)))?;

		// Gas is always set explicitly, so only nonce and chain id are filled.
		let provider = ProviderBuilder::new()
			.disable_recommended_fillers()
			.with_simple_nonce_management()
			.with_chain_id(chain_id)
			.wallet(wallet)
			.connect_http(url);

		Self::with_provider(Box::new(provider), chain_id, from, contract, deploy)
	}

	/// Wraps an already connected signing provider.
	pub fn with_provider(
		provider: Box<dyn Provider<Ethereum>>,
		chain_id: u64,
		from: Address,
		contract: Option<Address>,
		deploy: Option<DeploySettings>,
	) -> Result<Self, DeliveryError> {
		if contract.is_none() && deploy.is_none() {
			return Err(DeliveryError::Configuration(
				"either contract_address or deploy_bytecode is required".to_string(),
			));
		}

		Ok(Self {
			provider,
			from,
			chain_id,
			configured_contract: contract,
			deploy,
			contract: OnceCell::new(),
		})
	}

	async fn resolve_contract(&self, gas_price: u128) -> Result<Address, DeliveryError> {
		let node_chain_id = self
			.provider
			.get_chain_id()
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to get chain ID: {}", e)))?;

		if node_chain_id != self.chain_id {
			return Err(DeliveryError::Network(format!(
				"Chain ID mismatch: expected {}, got {}",
				self.chain_id, node_chain_id
			)));
		}

		match (self.configured_contract, &self.deploy) {
			(Some(address), _) => Ok(address),
			(None, Some(deploy)) => self.deploy_contract(deploy, gas_price).await,
			(None, None) => Err(DeliveryError::Configuration(
				"no oracle contract configured".to_string(),
			)),
		}
	}

	async fn deploy_contract(
		&self,
		deploy: &DeploySettings,
		gas_price: u128,
	) -> Result<Address, DeliveryError> {
		let tx = Transaction {
			from: self.from,
			to: None,
			data: deploy.bytecode.clone(),
			chain_id: self.chain_id,
			gas_limit: deploy.gas_limit,
			gas_price,
		};

		let pending = self
			.provider
			.send_transaction(tx.into())
			.await
			.map_err(|e| DeliveryError::Submission(format!("Failed to send deployment: {}", e)))?;

		let tx_hash = TransactionHash(pending.tx_hash().0.to_vec());
		info!(tx_hash = %tx_hash, "Oracle deployment waiting to be mined");

		let receipt = tokio::time::timeout(deploy.timeout, pending.get_receipt())
			.await
			.map_err(|_| DeliveryError::Timeout(deploy.timeout))?
			.map_err(|e| DeliveryError::Network(format!("Failed to get receipt: {}", e)))?;

		if !receipt.status() {
			return Err(DeliveryError::Submission(format!(
				"Deployment {} reverted",
				tx_hash
			)));
		}

		let address: Address = receipt
			.contract_address
			.ok_or_else(|| {
				DeliveryError::Submission("Deployment receipt has no contract address".to_string())
			})?
			.into();
		info!(contract = %address, tx_hash = %tx_hash, "Deployed oracle contract");

		Ok(address)
	}
}

/// Configuration schema for the alloy delivery provider.
pub struct AlloyDeliverySchema;

impl ConfigSchema for AlloyDeliverySchema {
	fn validate(&self, config: &toml::Value) -> Result<(), feeder_types::ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("rpc_url", FieldType::String).with_validator(http_url),
				Field::new(
					"chain_id",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
			vec![
				Field::new("contract_address", FieldType::String).with_validator(evm_address),
				Field::new("deploy_bytecode", FieldType::String).with_validator(hex_bytes),
				Field::new(
					"deploy_gas_limit",
					FieldType::Integer {
						min: Some(21_000),
						max: None,
					},
				),
				Field::new(
					"deploy_timeout_secs",
					FieldType::Integer {
						min: Some(1),
						max: None,
					},
				),
			],
		);

		schema.validate(config)
	}
}

#[async_trait]
impl DeliveryInterface for AlloyDelivery {
	async fn prepare(&self, gas_price: u128) -> Result<Address, DeliveryError> {
		self.contract
			.get_or_try_init(|| self.resolve_contract(gas_price))
			.await
			.copied()
	}

	async fn suggested_gas_price(&self) -> Result<u128, DeliveryError> {
		self.provider
			.get_gas_price()
			.await
			.map_err(|e| DeliveryError::Estimation(format!("Failed to get gas price: {}", e)))
	}

	async fn write(
		&self,
		key: &str,
		value: u128,
		timestamp: u64,
		gas_price: u128,
		gas_limit: u64,
	) -> Result<SubmissionResult, DeliveryError> {
		let contract = self
			.contract
			.get()
			.copied()
			.or(self.configured_contract)
			.ok_or_else(|| {
				DeliveryError::Configuration("oracle contract not deployed yet".to_string())
			})?;

		let tx = Transaction {
			from: self.from,
			to: Some(contract),
			data: encode_set_value(key, value, timestamp),
			chain_id: self.chain_id,
			gas_limit,
			gas_price,
		};

		let pending = self
			.provider
			.send_transaction(tx.into())
			.await
			.map_err(|e| DeliveryError::Submission(format!("Failed to send transaction: {}", e)))?;

		let transaction_hash = TransactionHash(pending.tx_hash().0.to_vec());
		info!(key, tx_hash = %transaction_hash.truncated(), to = %contract, "Submitted oracle update");

		Ok(SubmissionResult {
			transaction_hash,
			recipient: contract,
			gas_price,
		})
	}
}

fn parse_address(value: &str) -> Result<Address, DeliveryError> {
	value
		.parse::<AlloyAddress>()
		.map(Address::from)
		.map_err(|e| DeliveryError::Configuration(format!("Invalid contract address: {}", e)))
}

fn positive_integer(config: &toml::Value, field: &str, default: u64) -> Result<u64, DeliveryError> {
	match config.get(field).and_then(|v| v.as_integer()) {
		Some(value) => u64::try_from(value)
			.map_err(|_| DeliveryError::Configuration(format!("{} must be positive", field))),
		None => Ok(default),
	}
}

/// Builds an alloy delivery from its `[delivery.config]` table.
pub fn create_delivery(
	config: &toml::Value,
	wallet: EthereumWallet,
	from: Address,
) -> Result<Box<dyn DeliveryInterface>, DeliveryError> {
	AlloyDeliverySchema
		.validate(config)
		.map_err(|e| DeliveryError::Configuration(e.to_string()))?;

	let rpc_url = config
		.get("rpc_url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| DeliveryError::Configuration("rpc_url is required".to_string()))?;
	let chain_id = positive_integer(config, "chain_id", 0)?;

	let contract = config
		.get("contract_address")
		.and_then(|v| v.as_str())
		.map(parse_address)
		.transpose()?;

	let deploy = match config.get("deploy_bytecode").and_then(|v| v.as_str()) {
		Some(code) => {
			let bytecode = hex::decode(code.trim_start_matches("0x")).map_err(|e| {
				DeliveryError::Configuration(format!("Invalid deploy bytecode: {}", e))
			})?;
			Some(DeploySettings {
				bytecode,
				gas_limit: positive_integer(config, "deploy_gas_limit", DEFAULT_DEPLOY_GAS_LIMIT)?,
				timeout: Duration::from_secs(positive_integer(
					config,
					"deploy_timeout_secs",
					DEFAULT_DEPLOY_TIMEOUT_SECS,
				)?),
			})
		}
		None => None,
	};

	Ok(Box::new(AlloyDelivery::new(
		rpc_url, chain_id, wallet, from, contract, deploy,
	)?))
}

#[cfg(test)]
mod tests {
	use super::*;
	use alloy::primitives::{B256, U64};
	use alloy::signers::local::PrivateKeySigner;
	use alloy::transports::mock::Asserter;

	const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

	fn wallet() -> (EthereumWallet, Address) {
		let signer: PrivateKeySigner = DEV_KEY.parse().unwrap();
		let from = Address::from(signer.address());
		(EthereumWallet::from(signer), from)
	}

	#[test]
	fn test_set_value_calldata() {
		let data = encode_set_value("CARD/USD", 5_000_000, 1_700_000_000);
		assert_eq!(&data[..4], IKeyValueOracle::setValueCall::SELECTOR.as_slice());

		let call = IKeyValueOracle::setValueCall::abi_decode(&data).unwrap();
		assert_eq!(call.key, "CARD/USD");
		assert_eq!(call.value, 5_000_000);
		assert_eq!(call.timestamp, 1_700_000_000);
	}

	#[tokio::test]
	async fn test_rejected_write_reuses_nonce() {
		let asserter = Asserter::new();
		let (wallet, from) = wallet();
		let provider = ProviderBuilder::new()
			.disable_recommended_fillers()
			.with_simple_nonce_management()
			.with_chain_id(100)
			.wallet(wallet)
			.connect_mocked_client(asserter.clone());
		let delivery = AlloyDelivery::with_provider(
			Box::new(provider),
			100,
			from,
			Some(Address([7u8; 20])),
			None,
		)
		.unwrap();

		// eth_getTransactionCount, then eth_sendRawTransaction is rejected.
		asserter.push_success(&U64::from(7));
		asserter.push_failure_msg("replacement transaction underpriced");
		let err = delivery
			.write("CARD/USD", 5_000_000, 1_700_000_000, 110, 800_725)
			.await
			.unwrap_err();
		assert!(matches!(err, DeliveryError::Submission(_)));

		// The next write asks the node for the nonce again instead of using 8.
		asserter.push_success(&U64::from(7));
		asserter.push_success(&B256::repeat_byte(0xab));
		let result = delivery
			.write("CARD/USD", 5_000_000, 1_700_000_120, 110, 800_725)
			.await
			.unwrap();

		assert_eq!(result.transaction_hash.0, vec![0xab; 32]);
		assert_eq!(result.recipient, Address([7u8; 20]));
		assert!(asserter.read_q().is_empty());
	}

	#[test]
	fn test_factory_accepts_contract_address() {
		let config: toml::Value = toml::from_str(
			r#"
rpc_url = "http://localhost:8545"
chain_id = 100
contract_address = "0x0000000000000000000000000000000000000001"
"#,
		)
		.unwrap();
		let (wallet, from) = wallet();

		assert!(create_delivery(&config, wallet, from).is_ok());
	}

	#[test]
	fn test_factory_requires_contract_or_bytecode() {
		let config: toml::Value =
			toml::from_str("rpc_url = \"http://localhost:8545\"\nchain_id = 1").unwrap();
		let (wallet, from) = wallet();

		assert!(matches!(
			create_delivery(&config, wallet, from),
			Err(DeliveryError::Configuration(_))
		));
	}

	#[test]
	fn test_schema_rejects_bad_values() {
		let bad_address: toml::Value = toml::from_str(
			"rpc_url = \"http://localhost:8545\"\nchain_id = 1\ncontract_address = \"0x12\"",
		)
		.unwrap();
		assert!(AlloyDeliverySchema.validate(&bad_address).is_err());

		let bad_chain: toml::Value =
			toml::from_str("rpc_url = \"http://localhost:8545\"\nchain_id = 0").unwrap();
		assert!(AlloyDeliverySchema.validate(&bad_chain).is_err());

		let deploy: toml::Value = toml::from_str(
			"rpc_url = \"http://localhost:8545\"\nchain_id = 1\ndeploy_bytecode = \"0x6080604052\"\ndeploy_timeout_secs = 60",
		)
		.unwrap();
		assert!(AlloyDeliverySchema.validate(&deploy).is_ok());
	}
}
