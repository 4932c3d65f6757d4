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

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
	DeltaCap, EnqueueDecision, MatchPolicy, MatchmakingMode, PolicyContext, RetryInstruction,
	TimeoutDecision,
};
use crate::types::{AttemptContext, Entry, EntryHandle, Match};

fn default_min_queue() -> usize {
	20
}

fn default_max_wait_ms() -> Option<u64> {
	Some(60_000)
}

fn default_tick_ms() -> Option<i64> {
	Some(1_000)
}

fn default_delta() -> DeltaCap {
	DeltaCap::Unbounded
}

/// Configuration for [`DeferredCappedPolicy`]
///
/// `tick_ms` is signed because configuration sources hand us signed
/// integers; non-positive values normalize to 1000 at construction, and
/// an explicit null disables the timer entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeferredCappedConfig {
	/// Queue size at which an entry is matched immediately.
	#[serde(default = "default_min_queue")]
	pub min_queue: usize,
	/// Maximum time an entry may stay deferred; `None` disables.
	#[serde(default = "default_max_wait_ms")]
	pub max_wait_ms: Option<u64>,
	/// Timer cadence; `None` disables the timer.
	#[serde(default = "default_tick_ms")]
	pub tick_ms: Option<i64>,
	/// Delta cap for non-relaxed attempts.
	#[serde(default = "default_delta")]
	pub initial_delta: DeltaCap,
	/// Delta cap for relaxed (post-timeout) attempts.
	#[serde(default = "default_delta")]
	pub relaxed_delta: DeltaCap,
}

impl Default for DeferredCappedConfig {
	fn default() -> Self {
		Self {
			min_queue: default_min_queue(),
			max_wait_ms: default_max_wait_ms(),
			tick_ms: default_tick_ms(),
			initial_delta: DeltaCap::Unbounded,
			relaxed_delta: DeltaCap::Unbounded,
		}
	}
}

struct WaitingEntry {
	user_id: String,
	inserted_at: u64,
}

/// Reference policy: defer until the queue is busy, relax after a wait cap
///
/// Entries match immediately once the queue holds `min_queue` entries.
/// Below that threshold they are deferred and recorded in a waiting set;
/// on every timer tick, entries whose wait exceeds `max_wait_ms` are
/// re-attempted as relaxed attempts. Delta caps: `initial_delta` for
/// ordinary attempts, `relaxed_delta` once an entry is past its wait
/// threshold.
pub struct DeferredCappedPolicy {
	config: DeferredCappedConfig,
	tick: Option<Duration>,
	/// Deferred entries keyed by handle; handle order is arrival order,
	/// which keeps retry emission deterministic.
	waiting: BTreeMap<EntryHandle, WaitingEntry>,
}

impl DeferredCappedPolicy {
	pub fn new(config: DeferredCappedConfig) -> Self {
		let tick = config.tick_ms.map(|ms| {
			if ms <= 0 {
				Duration::from_millis(1_000)
			} else {
				Duration::from_millis(ms as u64)
			}
		});

		Self {
			config,
			tick,
			waiting: BTreeMap::new(),
		}
	}

	fn waited(&self, inserted_at: u64, now_ms: u64) -> u64 {
		now_ms.saturating_sub(inserted_at)
	}

	fn past_wait_threshold(&self, inserted_at: u64, now_ms: u64) -> bool {
		match self.config.max_wait_ms {
			Some(max_wait) => self.waited(inserted_at, now_ms) >= max_wait,
			None => false,
		}
	}
}

impl MatchPolicy for DeferredCappedPolicy {
	fn initial_timeout(&self) -> Option<Duration> {
		self.tick
	}

	fn before_enqueue(&mut self, _entry: &Entry, _ctx: &PolicyContext) -> EnqueueDecision {
		EnqueueDecision::Proceed
	}

	fn matchmaking_mode(
		&mut self,
		handle: EntryHandle,
		entry: &Entry,
		ctx: &PolicyContext,
	) -> MatchmakingMode {
		if ctx.queue_size >= self.config.min_queue {
			return MatchmakingMode::Attempt(AttemptContext::default());
		}

		if self.past_wait_threshold(entry.inserted_at, ctx.now_ms) {
			let waited = self.waited(entry.inserted_at, ctx.now_ms);
			return MatchmakingMode::Attempt(AttemptContext::relaxed(waited));
		}

		self.waiting.insert(
			handle,
			WaitingEntry {
				user_id: entry.user_id.clone(),
				inserted_at: entry.inserted_at,
			},
		);
		MatchmakingMode::Defer
	}

	fn max_delta(
		&mut self,
		_entry: &Entry,
		_ctx: &PolicyContext,
		attempt: &AttemptContext,
	) -> DeltaCap {
		match (self.config.initial_delta, attempt.relaxed, self.config.relaxed_delta) {
			(DeltaCap::Unbounded, _, _) => DeltaCap::Unbounded,
			(_, true, DeltaCap::Unbounded) => DeltaCap::Unbounded,
			(_, true, bounded) => bounded,
			(bounded, false, _) => bounded,
		}
	}

	fn after_match(&mut self, matched: &Match, _ctx: &PolicyContext) {
		for user in &matched.users {
			self.waiting.remove(&user.handle);
		}
	}

	fn handle_timeout(&mut self, ctx: &PolicyContext) -> TimeoutDecision {
		let retries: Vec<RetryInstruction> = self
			.waiting
			.iter()
			.filter(|(_, waiting)| self.past_wait_threshold(waiting.inserted_at, ctx.now_ms))
			.map(|(handle, waiting)| {
				debug!(
					user_id = %waiting.user_id,
					waited_ms = self.waited(waiting.inserted_at, ctx.now_ms),
					"Deferred entry past wait threshold, retrying"
				);
				RetryInstruction {
					handle: *handle,
					attempt: AttemptContext::relaxed(self.waited(waiting.inserted_at, ctx.now_ms)),
				}
			})
			.collect();

		// Due handles stay in the waiting set; after_match clears them once
		// a retry actually pairs them.
		TimeoutDecision {
			retries,
			next_tick: self.tick,
		}
	}

	fn terminate(&mut self) {
		self.waiting.clear();
	}
}
