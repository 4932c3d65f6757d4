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

//! Matchmaking service entry point
//!
//! Runs the matchmaking engine with the in-memory storage, the deferred
//! capped policy and the per-user topic hub a transport subscribes
//! through. There is no persistence: restarting the process empties the
//! queue by design.

use std::sync::Arc;

use anyhow::Result;
use ladder_matchmaking::{
	DeferredCappedPolicy, MatchmakingConfig, MatchmakingEngine, MemoryStorage, TopicHub, logging,
	monotonic_clock,
};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
	let _log_guard = logging::init_logging()?;

	let config = MatchmakingConfig::from_env()?;
	info!(
		min_queue = config.policy.min_queue,
		max_match_history = config.max_match_history,
		"Ladder matchmaking starting"
	);

	let hub = Arc::new(TopicHub::new());
	let engine = MatchmakingEngine::start(
		config.engine_config(),
		Box::new(MemoryStorage::new()),
		Box::new(DeferredCappedPolicy::new(config.policy.clone())),
		hub.clone(),
		monotonic_clock(),
	);

	// The transport layer plugs in here: mutations call engine.enqueue,
	// subscriptions attach through hub.subscribe.
	signal::ctrl_c().await?;
	info!("Shutting down...");
	engine.shutdown();

	Ok(())
}
