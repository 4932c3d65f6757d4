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

/// Free-form attribute bag attached to an entry (source tag, wait-related
/// fields). The engine never interprets it; policies may read it.
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Opaque identity token for a live queue entry.
///
/// Handles are assigned by storage at insertion from a process-local
/// counter and are never reused for the lifetime of the process. The inner
/// value is deliberately private: handles are compared, hashed and stored,
/// never inspected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntryHandle(u64);

impl EntryHandle {
	pub(crate) fn new(raw: u64) -> Self {
		Self(raw)
	}
}

/// A queued matchmaking request.
///
/// Entries are immutable after insertion. The handle identifying an entry
/// lives beside it (assigned by storage), not inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
	/// Trimmed, non-empty user identifier; unique among live entries.
	pub user_id: String,
	/// Non-negative rank the matcher pairs on.
	pub rank: u64,
	/// Monotonic millisecond timestamp captured at acceptance.
	pub inserted_at: u64,
	/// Uninterpreted attribute bag.
	#[serde(default)]
	pub meta: Meta,
}

/// Enqueue request as handed to the engine by a transport.
///
/// `rank` is signed because transports speak signed integers; the engine
/// validates it is non-negative before anything else happens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
	pub user_id: String,
	pub rank: i64,
	#[serde(default)]
	pub meta: Meta,
}

impl EnqueueRequest {
	pub fn new(user_id: impl Into<String>, rank: i64) -> Self {
		Self {
			user_id: user_id.into(),
			rank,
			meta: Meta::new(),
		}
	}
}

/// Context a policy emits when it authorizes a matching attempt.
///
/// Handed back to the policy's `max_delta` and recorded on the resulting
/// [`Match`]. A relaxed attempt is one the policy flagged as past its wait
/// threshold; the matcher is expected to receive the relaxed (usually
/// larger) delta cap for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptContext {
	pub relaxed: bool,
	/// How long the entry had been waiting when the attempt was issued,
	/// for timer-driven retries.
	pub wait_ms: Option<u64>,
}

impl AttemptContext {
	pub fn relaxed(wait_ms: u64) -> Self {
		Self {
			relaxed: true,
			wait_ms: Some(wait_ms),
		}
	}
}

/// One side of a completed match.
///
/// The handle is carried so policies can clear per-handle bookkeeping in
/// `after_match`; it is dead (removed from storage) by the time anyone
/// sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedUser {
	pub handle: EntryHandle,
	pub user_id: String,
	pub rank: u64,
	pub inserted_at: u64,
}

/// The result of pairing two entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Match {
	/// The triggering entry first, the selected candidate second.
	pub users: [MatchedUser; 2],
	/// Absolute rank difference between the two users.
	pub delta: u64,
	/// Monotonic millisecond timestamp of the pairing.
	pub matched_at: u64,
	/// The attempt context the policy produced when authorizing the attempt.
	pub context: AttemptContext,
}

/// Outcome of a successful enqueue call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum EnqueueOutcome {
	/// The entry is live in storage, waiting for an opponent.
	Queued,
	/// The entry was paired immediately; both entries left storage.
	Matched(Match),
}

/// External error taxonomy for enqueue operations.
///
/// The `Display` forms are the stable strings transports surface verbatim,
/// so they must not change shape.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EnqueueError {
	/// User id empty or longer than 255 code points after trimming.
	#[error("invalid_user_id")]
	InvalidUserId,
	/// Rank was negative.
	#[error("invalid_rank")]
	InvalidRank,
	/// Request shape could not be decoded. Unreachable through the typed
	/// API; transports map their decode failures onto this variant so the
	/// whole taxonomy lives in one place.
	#[error("invalid_params")]
	InvalidParams,
	/// A live entry with the same user id already exists.
	#[error("already_enqueued")]
	AlreadyEnqueued,
	/// The policy refused the request, including the `cancelled` case.
	#[error("policy rejected: {0}")]
	PolicyRejected(String),
	/// Unexpected storage failure or unavailable engine.
	#[error("queue error: {0}")]
	QueueError(String),
}
