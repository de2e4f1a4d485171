//! Runtime configuration, read from an `osmosis.toml` document.

use anyhow::Result;
use osmosis_types::err::PrefixError;
use osmosis_types::DEFAULT_MAX_TRANSFER;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OsmosisConfig {
	/// Largest payload the host will accept from the guest in one transfer.
	pub max_transfer_bytes: u32,
	/// Name under which the guest module exports its linear memory.
	pub memory_export: String,
}

impl Default for OsmosisConfig {
	fn default() -> Self {
		Self {
			max_transfer_bytes: DEFAULT_MAX_TRANSFER,
			memory_export: "memory".to_string(),
		}
	}
}

impl OsmosisConfig {
	pub fn parse(input: &str) -> Result<Self> {
		toml::from_str(input).prefix_err(|| "Failed to parse osmosis.toml")
	}

	pub fn to_toml(&self) -> Result<String> {
		toml::to_string_pretty(self).prefix_err(|| "Failed to serialize config")
	}
}
