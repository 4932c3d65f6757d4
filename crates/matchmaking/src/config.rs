// Copyright 2025 itscheems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::policy::DeferredCappedConfig;

// Logging configuration constants
/// Default log level (can be overridden by RUST_LOG environment variable)
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log directory component name
pub const LOG_COMPONENT_NAME: &str = "matchmaking";

/// Default console output enabled (can be overridden by LOG_TO_CONSOLE environment variable)
pub const DEFAULT_LOG_TO_CONSOLE: bool = false;

fn default_max_match_history() -> usize {
	100
}

fn default_inbox_capacity() -> usize {
	1024
}

/// Matchmaking service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchmakingConfig {
	/// Reference policy knobs (min queue, wait cap, tick, delta caps)
	#[serde(default)]
	pub policy: DeferredCappedConfig,
	/// Bounded match history size
	#[serde(default = "default_max_match_history")]
	pub max_match_history: usize,
	/// Engine inbox capacity
	#[serde(default = "default_inbox_capacity")]
	pub inbox_capacity: usize,
	/// Log every engine step at debug level
	#[serde(default)]
	pub verbose_logging: bool,
}

impl Default for MatchmakingConfig {
	fn default() -> Self {
		Self {
			policy: DeferredCappedConfig::default(),
			max_match_history: default_max_match_history(),
			inbox_capacity: default_inbox_capacity(),
			verbose_logging: false,
		}
	}
}

impl MatchmakingConfig {
	/// Load configuration from environment variables
	pub fn from_env() -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::Environment::with_prefix("MATCHMAKING"))
			.build()?;

		cfg.try_deserialize()
	}

	/// Load configuration from file
	pub fn from_file(path: &str) -> Result<Self, config::ConfigError> {
		let cfg = config::Config::builder()
			.add_source(config::File::with_name(path))
			.add_source(config::Environment::with_prefix("MATCHMAKING"))
			.build()?;

		cfg.try_deserialize()
	}

	/// The engine-facing slice of this configuration.
	pub fn engine_config(&self) -> EngineConfig {
		EngineConfig {
			max_match_history: self.max_match_history,
			inbox_capacity: self.inbox_capacity,
			verbose_logging: self.verbose_logging,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = MatchmakingConfig::default();
		assert_eq!(config.max_match_history, 100);
		assert_eq!(config.inbox_capacity, 1024);
		assert_eq!(config.policy.min_queue, 20);
		assert_eq!(config.policy.max_wait_ms, Some(60_000));
		assert_eq!(config.policy.tick_ms, Some(1_000));
	}

	#[test]
	fn test_deserializes_with_missing_fields() {
		let config: MatchmakingConfig = serde_json::from_str("{}").unwrap();
		assert_eq!(config.max_match_history, 100);

		let config: MatchmakingConfig =
			serde_json::from_str(r#"{"max_match_history": 5, "policy": {"min_queue": 2}}"#)
				.unwrap();
		assert_eq!(config.max_match_history, 5);
		assert_eq!(config.policy.min_queue, 2);
		assert_eq!(config.policy.tick_ms, Some(1_000));
	}
}
