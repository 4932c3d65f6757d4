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

mod deferred;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{AttemptContext, Entry, EntryHandle, Match};

pub use deferred::{DeferredCappedConfig, DeferredCappedPolicy};

/// Manager context computed by the engine immediately before each policy
/// hook call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyContext {
	/// Live entries in storage at call time.
	pub queue_size: usize,
	/// Current monotonic millisecond clock reading.
	pub now_ms: u64,
}

/// Decision returned by [`MatchPolicy::before_enqueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueDecision {
	Proceed,
	Reject(RejectReason),
}

/// Why a policy refused an enqueue.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
	/// Mapped to `already_enqueued` externally.
	Duplicate,
	/// Surfaced as `policy rejected: {reason}`.
	Other(String),
}

/// Decision returned by [`MatchPolicy::matchmaking_mode`] for a
/// just-inserted entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchmakingMode {
	/// Run the matcher now, with this attempt context.
	Attempt(AttemptContext),
	/// Leave the entry queued; revisit on a timer tick.
	Defer,
	/// Remove the just-inserted entry and reject the call.
	Cancel,
}

/// Cap on the absolute rank difference the matcher may consider in one
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaCap {
	Unbounded,
	Bounded(u64),
}

/// One deferred-entry retry the policy asks the engine to run.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryInstruction {
	pub handle: EntryHandle,
	pub attempt: AttemptContext,
}

/// Decision returned by [`MatchPolicy::handle_timeout`].
#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutDecision {
	/// Deferred entries to re-attempt, in emission order.
	pub retries: Vec<RetryInstruction>,
	/// Delay until the next tick; `None` stops the timer.
	pub next_tick: Option<Duration>,
}

impl TimeoutDecision {
	pub fn idle(next_tick: Option<Duration>) -> Self {
		Self {
			retries: Vec::new(),
			next_tick,
		}
	}
}

/// Match Policy trait - the stateful decision module of the engine
///
/// A policy owns opaque state, updated only through these hooks, and
/// decides *when* the engine attempts a match, *how far* the matcher may
/// expand the rank delta, and *how* deferred entries are revisited on
/// timer ticks.
///
/// Hook ordering for a single enqueue: `before_enqueue` (pre-insert veto),
/// `matchmaking_mode` (post-insert dispatch), `max_delta` (if an attempt
/// was authorized), `after_match` (after storage removed both entries,
/// before publication). `handle_timeout` runs on every timer tick;
/// `terminate` on engine shutdown.
///
/// Implementations must not panic on valid inputs; every refusal is a
/// returned decision, and state must stay consistent across hooks.
pub trait MatchPolicy: Send {
	/// Delay before the first timer tick. `None` disables the timer.
	fn initial_timeout(&self) -> Option<Duration>;

	/// Veto point before the entry is inserted into storage.
	fn before_enqueue(&mut self, entry: &Entry, ctx: &PolicyContext) -> EnqueueDecision;

	/// Dispatch decision for a just-inserted entry.
	fn matchmaking_mode(
		&mut self,
		handle: EntryHandle,
		entry: &Entry,
		ctx: &PolicyContext,
	) -> MatchmakingMode;

	/// Delta cap for the attempt authorized by `attempt`.
	fn max_delta(
		&mut self,
		entry: &Entry,
		ctx: &PolicyContext,
		attempt: &AttemptContext,
	) -> DeltaCap;

	/// Bookkeeping after a match: both entries have left storage, the
	/// publisher has not fired yet.
	fn after_match(&mut self, matched: &Match, ctx: &PolicyContext);

	/// Timer tick: revisit deferred entries and schedule the next tick.
	fn handle_timeout(&mut self, ctx: &PolicyContext) -> TimeoutDecision;

	/// Cleanup on engine shutdown.
	fn terminate(&mut self) {}
}
