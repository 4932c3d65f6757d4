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

mod memory;

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::types::{Entry, EntryHandle};

pub use memory::MemoryStorage;

/// Error types for storage insertion
#[derive(Debug, Error)]
pub enum InsertError {
	#[error("user already queued: {0}")]
	Duplicate(String),
}

/// Read-only projection of a storage entry.
///
/// Carries just enough for candidate selection; the full [`Entry`] is
/// fetched from storage when a match is actually made.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotEntry {
	pub handle: EntryHandle,
	pub user_id: String,
	pub rank: u64,
	pub inserted_at: u64,
}

/// Read-only projection of storage at a moment in time.
///
/// Producing a snapshot never mutates storage; two snapshots without an
/// intervening mutation are equal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
	/// Per-rank buckets, each ordered by `(inserted_at, user_id)`.
	pub by_rank: BTreeMap<u64, Vec<SnapshotEntry>>,
	/// All live entries in global arrival order.
	pub arrival: Vec<SnapshotEntry>,
	/// Total live entry count.
	pub len: usize,
}

/// Queue Storage trait - the entry index under the matching engine
///
/// Storage owns the set of live entries and handle allocation. It provides
/// insertion with O(1) duplicate detection on user id, removal by opaque
/// handle, and a read-only snapshot grouped by rank and by global arrival
/// order.
///
/// Key semantic constraints:
/// - At most one live entry per user id at any time
/// - Handles are in bijection with live entries and are never reused
/// - An entry is live from a successful `insert` until the first
///   successful `remove` of its handle
/// - Entries are immutable once inserted
///
/// Tagged outcomes, never panics: duplicates and missing handles are
/// reported through `Result`/`Option` and the caller decides policy.
///
/// This abstraction is implementation-agnostic: the reference
/// implementation is an in-memory index, but the same contract could be
/// backed by an external store.
pub trait QueueStorage: Send {
	/// Insert an entry, assigning it a fresh handle.
	///
	/// Fails with [`InsertError::Duplicate`] if an entry with the same
	/// user id is live.
	fn insert(&mut self, entry: Entry) -> Result<EntryHandle, InsertError>;

	/// Remove the entry identified by `handle`.
	///
	/// Returns `None` if no live entry carries that handle.
	fn remove(&mut self, handle: EntryHandle) -> Option<Entry>;

	/// Pure read of the entry identified by `handle`.
	fn lookup(&self, handle: EntryHandle) -> Option<&Entry>;

	/// Produce a read-only snapshot of all live entries.
	fn snapshot(&self) -> Snapshot;

	/// The earliest-arrived live entry, if any.
	fn head(&self) -> Option<(EntryHandle, &Entry)>;

	/// Remove and return the earliest-arrived live entry, if any.
	fn pop_head(&mut self) -> Option<(EntryHandle, Entry)>;

	/// Number of live entries.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Remove every entry for which the predicate holds.
	///
	/// Returns the removed entries in arrival order.
	fn prune(
		&mut self,
		predicate: &mut dyn FnMut(EntryHandle, &Entry) -> bool,
	) -> Vec<(EntryHandle, Entry)>;
}
