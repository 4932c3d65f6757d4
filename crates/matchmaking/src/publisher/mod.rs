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

mod topics;

use serde::Serialize;
use thiserror::Error;

use crate::types::Match;

pub use topics::TopicHub;

/// Error types for publish operations
///
/// The engine converts every publish error into a logged no-op; nothing
/// here ever reaches the matching pipeline.
#[derive(Debug, Error)]
pub enum PublishError {
	#[error("delivery failed: {0}")]
	Delivery(String),
}

/// One user inside a published match payload.
///
/// Serializes with the subscription-facing field names (`userId`,
/// `userRank`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadUser {
	pub user_id: String,
	pub user_rank: u64,
}

/// Wire payload delivered on each matched user's topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchPayload {
	/// Triggering entry first, selected candidate second.
	pub users: Vec<PayloadUser>,
	pub delta: u64,
}

impl MatchPayload {
	pub fn from_match(matched: &Match) -> Self {
		Self {
			users: matched
				.users
				.iter()
				.map(|user| PayloadUser {
					user_id: user.user_id.clone(),
					user_rank: user.rank,
				})
				.collect(),
			delta: matched.delta,
		}
	}
}

/// Subscription topic carrying match notifications for one user.
pub fn topic_for(user_id: &str) -> String {
	format!("match_found:{user_id}")
}

/// Match Publisher trait - the fan-out boundary of the engine
///
/// The engine calls `publish` exactly once per completed match, after
/// storage has removed both entries and the policy's `after_match` has
/// committed. Delivery is best-effort and lossy by contract; failures
/// must not propagate into the matching pipeline, and the engine swallows
/// any error returned here.
pub trait MatchPublisher: Send + Sync {
	fn publish(&self, matched: &Match) -> Result<(), PublishError>;
}

/// Publisher that discards every match. Useful for tests and headless
/// runs.
pub struct NullPublisher;

impl MatchPublisher for NullPublisher {
	fn publish(&self, _matched: &Match) -> Result<(), PublishError> {
		Ok(())
	}
}
