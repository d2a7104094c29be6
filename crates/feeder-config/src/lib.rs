//! Configuration loading for the oracle feeder.
//!
//! Configuration is a TOML file with `${VAR}` placeholders substituted from
//! the environment, followed by `FEEDER_*` overrides for the knobs operators
//! historically tuned through plain environment variables. The result is
//! validated once; any malformed value is fatal and the feeder does not start.

use feeder_types::FeedMode;
use regex::Regex;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

type EnvSource = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
	file_path: Option<String>,
	env_prefix: String,
	env: EnvSource,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "FEEDER_".to_string(),
			env: Box::new(|name| std::env::var(name).ok()),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_string_lossy().to_string());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Replaces the process environment as the source of substitutions
	/// and overrides.
	pub fn with_env_source<F>(mut self, env: F) -> Self
	where
		F: Fn(&str) -> Option<String> + Send + Sync + 'static,
	{
		self.env = Box::new(env);
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self.file_path.as_ref().ok_or_else(|| {
			ConfigError::FileNotFound("No configuration file specified".to_string())
		})?;

		if !Path::new(file_path).exists() {
			return Err(ConfigError::FileNotFound(file_path.clone()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		self.load_from_str(&content)
	}

	/// Parses, overrides and validates configuration from TOML text.
	pub fn load_from_str(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted_content = self.substitute_env_vars(content)?;

		let mut config: Config = toml::from_str(&substituted_content)
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		config.feeder.normalize();
		validate_config(&config)?;

		Ok(config)
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value =
				(self.env)(var_name).ok_or_else(|| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn env_override<T: std::str::FromStr>(&self, name: &str) -> Result<Option<T>, ConfigError>
	where
		T::Err: std::fmt::Display,
	{
		let var = format!("{}{}", self.env_prefix, name);
		match (self.env)(&var) {
			Some(raw) => {
				let parsed = raw
					.trim()
					.parse::<T>()
					.map_err(|e| ConfigError::ValidationError(format!("Invalid {}: {}", var, e)))?;
				debug!(variable = %var, "Applied environment override");
				Ok(Some(parsed))
			}
			None => Ok(None),
		}
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Some(secs) = self.env_override::<u64>("INTER_STEP_DELAY_SECS")? {
			config.feeder.inter_step_delay_secs = secs;
		}

		if let Some(secs) = self.env_override::<u64>("CYCLE_INTERVAL_SECS")? {
			config.feeder.cycle_interval_secs = secs;
		}

		if let Some(secs) = self.env_override::<u64>("CALL_TIMEOUT_SECS")? {
			config.feeder.call_timeout_secs = secs;
		}

		if let Some(size) = self.env_override::<usize>("BATCH_SIZE")? {
			config.feeder.batch_size = size;
		}

		if let Some(chain_id) = self.env_override::<i64>("CHAIN_ID")? {
			let table = config.delivery.config.as_table_mut().ok_or_else(|| {
				ConfigError::ValidationError("delivery.config must be a table".to_string())
			})?;
			table.insert("chain_id".to_string(), toml::Value::Integer(chain_id));
		}

		Ok(())
	}
}

/// Checks the cross-field rules of a loaded configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
	let feeder = &config.feeder;
	let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

	if feeder.cycle_interval_secs == 0 {
		return invalid("cycle_interval_secs must be positive".to_string());
	}

	if feeder.call_timeout_secs == 0 {
		return invalid("call_timeout_secs must be positive".to_string());
	}

	if feeder.inter_step_delay_secs > 0 && feeder.call_timeout_secs >= feeder.inter_step_delay_secs
	{
		return invalid(format!(
			"call_timeout_secs ({}) must be shorter than inter_step_delay_secs ({})",
			feeder.call_timeout_secs, feeder.inter_step_delay_secs
		));
	}

	if feeder.scale_factor == 0 {
		return invalid("scale_factor must be positive".to_string());
	}

	if config.delivery.gas_markup < rust_decimal::Decimal::ONE {
		return invalid(format!(
			"gas_markup must be at least 1.0, got {}",
			config.delivery.gas_markup
		));
	}

	if config.delivery.gas_limit == 0 {
		return invalid("gas_limit must be positive".to_string());
	}

	match feeder.mode {
		FeedMode::Pair => {
			if feeder.symbols.is_empty() {
				return invalid("pair mode requires at least one symbol".to_string());
			}

			let mut seen = std::collections::HashSet::new();
			for symbol in &feeder.symbols {
				if symbol.is_empty() {
					return invalid("symbols must not be empty".to_string());
				}
				if !seen.insert(symbol.as_str()) {
					return invalid(format!("duplicate symbol: {}", symbol));
				}
			}

			if let Some(base) = &feeder.pair_base {
				if base.is_empty() {
					return invalid("pair_base must not be empty".to_string());
				}
				if seen.contains(base.as_str()) {
					return invalid(format!("pair_base {} is also listed in symbols", base));
				}
			}
		}
		FeedMode::Batch => {
			if feeder.batch_size == 0 {
				return invalid("batch mode requires batch_size > 0".to_string());
			}
			if config.ranking.is_none() {
				return invalid("batch mode requires a [ranking] provider".to_string());
			}
		}
	}

	Ok(())
}
