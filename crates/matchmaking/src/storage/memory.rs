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

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::{InsertError, QueueStorage, Snapshot, SnapshotEntry};
use crate::types::{Entry, EntryHandle};

/// In-memory reference implementation of [`QueueStorage`]
///
/// Maintains four indexes over the live entry set:
/// - handle -> entry (primary)
/// - user id -> handle (duplicate detection)
/// - rank -> handles in insertion order (matcher buckets)
/// - arrival set ordered by handle
///
/// Handles are assigned from a monotonically increasing counter by the
/// single writer, so handle order coincides with arrival order and the
/// arrival index needs no timestamp of its own.
///
/// No durability: process restart loses all state.
pub struct MemoryStorage {
	entries: HashMap<EntryHandle, Entry>,
	by_user: HashMap<String, EntryHandle>,
	by_rank: BTreeMap<u64, Vec<EntryHandle>>,
	arrival: BTreeSet<EntryHandle>,
	next_handle: u64,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			entries: HashMap::new(),
			by_user: HashMap::new(),
			by_rank: BTreeMap::new(),
			arrival: BTreeSet::new(),
			next_handle: 1,
		}
	}

	fn snapshot_entry(&self, handle: EntryHandle) -> SnapshotEntry {
		let entry = &self.entries[&handle];
		SnapshotEntry {
			handle,
			user_id: entry.user_id.clone(),
			rank: entry.rank,
			inserted_at: entry.inserted_at,
		}
	}

	fn unlink(&mut self, handle: EntryHandle) -> Option<Entry> {
		let entry = self.entries.remove(&handle)?;
		self.by_user.remove(&entry.user_id);
		self.arrival.remove(&handle);
		if let Some(bucket) = self.by_rank.get_mut(&entry.rank) {
			bucket.retain(|h| *h != handle);
			if bucket.is_empty() {
				self.by_rank.remove(&entry.rank);
			}
		}
		Some(entry)
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

impl QueueStorage for MemoryStorage {
	fn insert(&mut self, entry: Entry) -> Result<EntryHandle, InsertError> {
		if self.by_user.contains_key(&entry.user_id) {
			return Err(InsertError::Duplicate(entry.user_id));
		}

		let handle = EntryHandle::new(self.next_handle);
		self.next_handle += 1;

		self.by_user.insert(entry.user_id.clone(), handle);
		self.by_rank.entry(entry.rank).or_default().push(handle);
		self.arrival.insert(handle);
		self.entries.insert(handle, entry);

		Ok(handle)
	}

	fn remove(&mut self, handle: EntryHandle) -> Option<Entry> {
		self.unlink(handle)
	}

	fn lookup(&self, handle: EntryHandle) -> Option<&Entry> {
		self.entries.get(&handle)
	}

	fn snapshot(&self) -> Snapshot {
		let mut by_rank = BTreeMap::new();
		for (rank, bucket) in &self.by_rank {
			let mut projected: Vec<SnapshotEntry> = bucket
				.iter()
				.map(|handle| self.snapshot_entry(*handle))
				.collect();
			projected.sort_by(|a, b| {
				(a.inserted_at, a.user_id.as_str()).cmp(&(b.inserted_at, b.user_id.as_str()))
			});
			by_rank.insert(*rank, projected);
		}

		let arrival = self
			.arrival
			.iter()
			.map(|handle| self.snapshot_entry(*handle))
			.collect();

		Snapshot {
			by_rank,
			arrival,
			len: self.entries.len(),
		}
	}

	fn head(&self) -> Option<(EntryHandle, &Entry)> {
		let handle = *self.arrival.first()?;
		Some((handle, &self.entries[&handle]))
	}

	fn pop_head(&mut self) -> Option<(EntryHandle, Entry)> {
		let handle = *self.arrival.first()?;
		let entry = self.unlink(handle)?;
		Some((handle, entry))
	}

	fn len(&self) -> usize {
		self.entries.len()
	}

	fn prune(
		&mut self,
		predicate: &mut dyn FnMut(EntryHandle, &Entry) -> bool,
	) -> Vec<(EntryHandle, Entry)> {
		let doomed: Vec<EntryHandle> = self
			.arrival
			.iter()
			.copied()
			.filter(|handle| predicate(*handle, &self.entries[handle]))
			.collect();

		doomed
			.into_iter()
			.filter_map(|handle| self.unlink(handle).map(|entry| (handle, entry)))
			.collect()
	}
}
