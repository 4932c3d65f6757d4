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

//! Deterministic candidate selection over a storage snapshot.
//!
//! Selection expands the rank delta from 0 upward: at each delta the
//! candidate pool is the union of the buckets at `rank - delta` and
//! `rank + delta` (the triggering entry excluded), and the first
//! non-empty pool wins. Within a pool the winner is the entry minimizing
//! `(inserted_at, user_id)` - earlier arrival first, lexicographically
//! smaller user id on timestamp ties.
//!
//! The implementation folds that scan into a single pass: minimizing the
//! key `(delta, inserted_at, user_id)` over all in-cap entries selects
//! exactly the entry the incremental expansion would stop at, without
//! walking empty deltas one by one. Given the same snapshot it is a pure
//! function: same inputs, same winner.

use crate::policy::DeltaCap;
use crate::storage::{Snapshot, SnapshotEntry};
use crate::types::EntryHandle;

/// Select the opponent for `entry_handle` at `rank`, or `None` if no
/// other entry satisfies the cap.
pub fn select_candidate(
	snapshot: &Snapshot,
	entry_handle: EntryHandle,
	rank: u64,
	cap: DeltaCap,
) -> Option<SnapshotEntry> {
	let limit = match cap {
		DeltaCap::Bounded(limit) => limit,
		// Unbounded means "as far as the snapshot reaches": the widest
		// distance between the entry's rank and any populated rank.
		DeltaCap::Unbounded => snapshot
			.by_rank
			.keys()
			.map(|other| other.abs_diff(rank))
			.max()
			.unwrap_or(0),
	};

	let mut winner: Option<(u64, &SnapshotEntry)> = None;

	for (bucket_rank, bucket) in &snapshot.by_rank {
		let delta = bucket_rank.abs_diff(rank);
		if delta > limit {
			continue;
		}

		for candidate in bucket {
			if candidate.handle == entry_handle {
				continue;
			}

			let better = match &winner {
				None => true,
				Some((best_delta, best)) => {
					(delta, candidate.inserted_at, candidate.user_id.as_str())
						< (*best_delta, best.inserted_at, best.user_id.as_str())
				}
			};
			if better {
				winner = Some((delta, candidate));
			}
		}
	}

	winner.map(|(_, candidate)| candidate.clone())
}
