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

//! Ladder Matchmaking Engine
//!
//! This crate provides a real-time matchmaking queue: players arrive with
//! a rank, and each new arrival is paired with the queued opponent whose
//! rank is nearest, under deterministic tie-breaks and FIFO fairness.
//!
//! Architecture:
//! - Single-threaded coordinator loop for deterministic behavior
//! - Pluggable storage (rank- and arrival-indexed entry set)
//! - Pluggable policy deciding when to match, how far to expand the rank
//!   delta, and how deferred entries are revisited on timer ticks
//! - Per-user topic fan-out with lossy, best-effort delivery
//! - No persistence: process restart loses state by design

pub mod config;
pub mod engine;
pub mod logging;
pub mod matcher;
pub mod policy;
pub mod publisher;
pub mod storage;
pub mod types;

pub use config::MatchmakingConfig;
pub use engine::{
	CoordinatorState, EngineConfig, MatchHistory, MatchmakingEngine, TimeFn, monotonic_clock,
};
pub use policy::{
	DeferredCappedConfig, DeferredCappedPolicy, DeltaCap, EnqueueDecision, MatchPolicy,
	MatchmakingMode, PolicyContext, RejectReason, RetryInstruction, TimeoutDecision,
};
pub use publisher::{
	MatchPayload, MatchPublisher, NullPublisher, PayloadUser, PublishError, TopicHub, topic_for,
};
pub use storage::{InsertError, MemoryStorage, QueueStorage, Snapshot, SnapshotEntry};
pub use types::*;
