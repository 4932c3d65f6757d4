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

use crossbeam::channel::Sender;

use crate::types::{AttemptContext, EnqueueError, EnqueueOutcome, EnqueueRequest, EntryHandle, Match};

/// Inbox messages for the matchmaking loop
///
/// External callers and the loop itself post these onto one bounded
/// channel; the loop drains them strictly in order, so no two steps ever
/// overlap. Reply channels are rendezvous-style: the caller blocks until
/// the loop has completed its step.
pub(crate) enum EngineCommand {
	/// Validate, insert and possibly match one request.
	Enqueue {
		request: EnqueueRequest,
		respond_to: Sender<Result<EnqueueOutcome, EnqueueError>>,
	},

	/// Read the bounded match history.
	RecentMatches {
		limit: usize,
		respond_to: Sender<Vec<Match>>,
	},

	/// Re-attempt matching for one deferred entry, posted by the loop on
	/// behalf of the policy after a timer tick. Stale handles are dropped
	/// silently.
	PolicyRetry {
		handle: EntryHandle,
		attempt: AttemptContext,
	},

	/// Stop the loop after the current step.
	Shutdown,
}
