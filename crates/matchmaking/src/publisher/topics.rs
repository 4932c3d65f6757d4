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

use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::debug;

use super::{MatchPayload, MatchPublisher, PublishError, topic_for};
use crate::types::Match;

const DEFAULT_TOPIC_CAPACITY: usize = 16;

/// Per-user topic registry - the delivery fabric behind the publisher
///
/// Topics are named `match_found:{userId}` and created lazily on
/// subscribe. Publishing sends to exactly the two matched users' topics;
/// a topic with no live receivers is dropped from the registry instead of
/// buffering.
///
/// Delivery is lossy by contract: subscribers that are disconnected at
/// publish time receive nothing, and a subscriber that lags past the
/// per-topic capacity loses the oldest payloads. The registry is safe for
/// concurrent subscribe and publish.
pub struct TopicHub {
	topics: DashMap<String, broadcast::Sender<MatchPayload>>,
	capacity: usize,
}

impl TopicHub {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
	}

	/// `capacity` bounds the number of undelivered payloads a slow
	/// subscriber may accumulate per topic.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			topics: DashMap::new(),
			capacity,
		}
	}

	/// Subscribe to match notifications for one user.
	///
	/// The returned receiver yields every payload published to the
	/// user's topic while the receiver is alive.
	pub fn subscribe(&self, user_id: &str) -> broadcast::Receiver<MatchPayload> {
		self.topics
			.entry(topic_for(user_id))
			.or_insert_with(|| broadcast::channel(self.capacity).0)
			.subscribe()
	}

	/// Number of registered topics, for introspection.
	pub fn topic_count(&self) -> usize {
		self.topics.len()
	}

	fn emit(&self, topic: &str, payload: &MatchPayload) {
		let Some(sender) = self.topics.get(topic) else {
			debug!(topic, "No subscribers for topic, dropping payload");
			return;
		};

		if sender.send(payload.clone()).is_err() {
			// All receivers are gone; drop the dead topic.
			drop(sender);
			self.topics
				.remove_if(topic, |_, sender| sender.receiver_count() == 0);
		}
	}
}

impl Default for TopicHub {
	fn default() -> Self {
		Self::new()
	}
}

impl MatchPublisher for TopicHub {
	fn publish(&self, matched: &Match) -> Result<(), PublishError> {
		let payload = MatchPayload::from_match(matched);
		for user in &matched.users {
			self.emit(&topic_for(&user.user_id), &payload);
		}
		Ok(())
	}
}
