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

use std::collections::VecDeque;
use std::sync::Arc;

use crate::policy::{MatchPolicy, PolicyContext};
use crate::publisher::MatchPublisher;
use crate::storage::QueueStorage;
use crate::types::Match;

use super::TimeFn;

/// Coordinator state
///
/// Everything the matchmaking loop mutates lives here: storage, policy
/// state, the bounded match history, the publisher reference and the
/// clock. The loop thread is the single owner; nothing escapes.
pub struct CoordinatorState {
	pub(crate) storage: Box<dyn QueueStorage>,
	pub(crate) policy: Box<dyn MatchPolicy>,
	pub(crate) publisher: Arc<dyn MatchPublisher>,
	pub(crate) history: MatchHistory,
	pub(crate) time_fn: TimeFn,
}

impl CoordinatorState {
	pub fn new(
		storage: Box<dyn QueueStorage>,
		policy: Box<dyn MatchPolicy>,
		publisher: Arc<dyn MatchPublisher>,
		time_fn: TimeFn,
		max_match_history: usize,
	) -> Self {
		Self {
			storage,
			policy,
			publisher,
			history: MatchHistory::new(max_match_history),
			time_fn,
		}
	}

	pub(crate) fn now_ms(&self) -> u64 {
		(self.time_fn)()
	}

	/// Manager context handed to every policy hook, computed at call time.
	pub(crate) fn policy_ctx(&self) -> PolicyContext {
		PolicyContext {
			queue_size: self.storage.len(),
			now_ms: self.now_ms(),
		}
	}
}

/// Bounded most-recent-first match log, for introspection only.
pub struct MatchHistory {
	cap: usize,
	items: VecDeque<Match>,
}

impl MatchHistory {
	pub fn new(cap: usize) -> Self {
		Self {
			cap,
			items: VecDeque::new(),
		}
	}

	pub fn record(&mut self, matched: Match) {
		if self.cap == 0 {
			return;
		}
		self.items.push_front(matched);
		self.items.truncate(self.cap);
	}

	/// The most recent `limit` matches, oldest of those first.
	pub fn recent(&self, limit: usize) -> Vec<Match> {
		self.items.iter().take(limit).rev().cloned().collect()
	}

	pub fn len(&self) -> usize {
		self.items.len()
	}

	pub fn is_empty(&self) -> bool {
		self.items.is_empty()
	}
}
