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

mod control;
mod state;

pub use state::{CoordinatorState, MatchHistory};

use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, error, info, warn};

use crate::matcher;
use crate::policy::{EnqueueDecision, MatchPolicy, MatchmakingMode, RejectReason, TimeoutDecision};
use crate::publisher::MatchPublisher;
use crate::storage::{InsertError, QueueStorage};
use crate::types::{
	AttemptContext, EnqueueError, EnqueueOutcome, EnqueueRequest, Entry, EntryHandle, Match,
	MatchedUser,
};

use control::EngineCommand;

/// Injectable monotonic millisecond clock.
///
/// Every timestamp the policy and matcher see comes from this function.
/// Tests supply a counter so arrival order is total and reproducible.
pub type TimeFn = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Default clock: milliseconds elapsed since the first reading in this
/// process.
pub fn monotonic_clock() -> TimeFn {
	static START: OnceLock<Instant> = OnceLock::new();
	Arc::new(|| {
		let start = START.get_or_init(Instant::now);
		start.elapsed().as_millis() as u64
	})
}

/// Maximum user id length in code points, after trimming.
const MAX_USER_ID_LEN: usize = 255;

/// Configuration for the matchmaking engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
	/// Bounded match history size; 0 keeps no history.
	pub max_match_history: usize,
	/// Inbox capacity; callers block when it fills.
	pub inbox_capacity: usize,
	pub verbose_logging: bool,
}

impl Default for EngineConfig {
	fn default() -> Self {
		Self {
			max_match_history: 100,
			inbox_capacity: 1024,
			verbose_logging: false,
		}
	}
}

/// Matchmaking engine with single-threaded event loop
///
/// The engine runs the coordinator loop in a dedicated thread, consuming
/// commands from a bounded inbox. All mutations of storage, policy state,
/// the match history and the timer happen on that one thread, so a step
/// (enqueue, timer tick, policy retry) is atomic with respect to every
/// other step and the internals need no locks.
///
/// Architecture:
/// - Single-threaded: one writer, strictly ordered inbox
/// - Deterministic: given the same inputs and clock, same matches
/// - Timer by deadline: the loop waits on the inbox with a deadline; a
///   timeout IS the tick, so at most one timer is ever outstanding
/// - Pluggable: storage, policy and publisher are injected at start
pub struct MatchmakingEngine {
	command_tx: Sender<EngineCommand>,
	thread_handle: Option<JoinHandle<()>>,
}

impl MatchmakingEngine {
	/// Start the engine with the given collaborators.
	pub fn start(
		config: EngineConfig,
		storage: Box<dyn QueueStorage>,
		policy: Box<dyn MatchPolicy>,
		publisher: Arc<dyn MatchPublisher>,
		time_fn: TimeFn,
	) -> Self {
		let (command_tx, command_rx) = bounded(config.inbox_capacity);
		let retry_tx = command_tx.clone();

		let state = CoordinatorState::new(
			storage,
			policy,
			publisher,
			time_fn,
			config.max_match_history,
		);

		let thread_handle = thread::Builder::new()
			.name("matchmaking-loop".to_string())
			.spawn(move || {
				info!("Matchmaking engine started");
				Self::run_event_loop(state, &config, &command_rx, &retry_tx);
				info!("Matchmaking engine stopped");
			})
			.expect("Failed to spawn matchmaking loop thread");

		Self {
			command_tx,
			thread_handle: Some(thread_handle),
		}
	}

	/// Enqueue one request, blocking until the loop has processed it.
	pub fn enqueue(&self, request: EnqueueRequest) -> Result<EnqueueOutcome, EnqueueError> {
		let (respond_to, reply) = bounded(1);
		self.command_tx
			.send(EngineCommand::Enqueue {
				request,
				respond_to,
			})
			.map_err(|_| EnqueueError::QueueError("engine unavailable".to_string()))?;

		reply
			.recv()
			.map_err(|_| EnqueueError::QueueError("engine unavailable".to_string()))?
	}

	/// The most recent `limit` matches, oldest of those first.
	pub fn recent_matches(&self, limit: usize) -> Vec<Match> {
		let (respond_to, reply) = bounded(1);
		if self
			.command_tx
			.send(EngineCommand::RecentMatches { limit, respond_to })
			.is_err()
		{
			return Vec::new();
		}
		reply.recv().unwrap_or_default()
	}

	/// Shutdown the engine gracefully
	pub fn shutdown(mut self) {
		info!("Shutting down matchmaking engine");
		let _ = self.command_tx.send(EngineCommand::Shutdown);

		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			warn!("Matchmaking loop thread panicked: {:?}", e);
		}
	}

	/// Main coordinator loop
	///
	/// Waits on the inbox with the policy-scheduled tick as the deadline;
	/// an elapsed deadline is the timer tick. Retry instructions emitted
	/// by a tick are posted back onto the same inbox, so they interleave
	/// with enqueues in strict order.
	fn run_event_loop(
		mut state: CoordinatorState,
		config: &EngineConfig,
		inbox: &Receiver<EngineCommand>,
		retry_tx: &Sender<EngineCommand>,
	) {
		let mut next_tick = state
			.policy
			.initial_timeout()
			.map(|delay| Instant::now() + delay);

		loop {
			let received = match next_tick {
				Some(deadline) => match inbox.recv_deadline(deadline) {
					Ok(command) => Some(command),
					Err(RecvTimeoutError::Timeout) => None,
					Err(RecvTimeoutError::Disconnected) => break,
				},
				None => match inbox.recv() {
					Ok(command) => Some(command),
					Err(_) => break,
				},
			};

			match received {
				None => {
					let decision = Self::process_tick(&mut state);
					next_tick = decision.next_tick.map(|delay| Instant::now() + delay);

					for retry in decision.retries {
						if config.verbose_logging {
							debug!(handle = ?retry.handle, "Posting policy retry");
						}
						let command = EngineCommand::PolicyRetry {
							handle: retry.handle,
							attempt: retry.attempt,
						};
						if retry_tx.try_send(command).is_err() {
							// The handle stays in the policy's waiting set
							// and re-emerges on the next tick.
							warn!("Inbox full, dropping policy retry");
						}
					}
				}
				Some(EngineCommand::Enqueue {
					request,
					respond_to,
				}) => {
					let result = Self::process_enqueue(&mut state, request);
					let _ = respond_to.send(result);
				}
				Some(EngineCommand::RecentMatches { limit, respond_to }) => {
					let _ = respond_to.send(state.history.recent(limit));
				}
				Some(EngineCommand::PolicyRetry { handle, attempt }) => {
					Self::process_retry(&mut state, handle, attempt);
				}
				Some(EngineCommand::Shutdown) => break,
			}
		}

		state.policy.terminate();
	}

	/// Process a single enqueue: normalize, veto, insert, dispatch.
	fn process_enqueue(
		state: &mut CoordinatorState,
		request: EnqueueRequest,
	) -> Result<EnqueueOutcome, EnqueueError> {
		let user_id = request.user_id.trim();
		if user_id.is_empty() || user_id.chars().count() > MAX_USER_ID_LEN {
			return Err(EnqueueError::InvalidUserId);
		}
		if request.rank < 0 {
			return Err(EnqueueError::InvalidRank);
		}

		let entry = Entry {
			user_id: user_id.to_string(),
			rank: request.rank as u64,
			inserted_at: state.now_ms(),
			meta: request.meta,
		};

		let ctx = state.policy_ctx();
		match state.policy.before_enqueue(&entry, &ctx) {
			EnqueueDecision::Proceed => {}
			EnqueueDecision::Reject(RejectReason::Duplicate) => {
				return Err(EnqueueError::AlreadyEnqueued);
			}
			EnqueueDecision::Reject(RejectReason::Other(reason)) => {
				return Err(EnqueueError::PolicyRejected(reason));
			}
		}

		let handle = match state.storage.insert(entry.clone()) {
			Ok(handle) => handle,
			Err(InsertError::Duplicate(user_id)) => {
				debug!(user_id = %user_id, "Rejected duplicate enqueue");
				return Err(EnqueueError::AlreadyEnqueued);
			}
		};

		let ctx = state.policy_ctx();
		match state.policy.matchmaking_mode(handle, &entry, &ctx) {
			MatchmakingMode::Defer => Ok(EnqueueOutcome::Queued),
			MatchmakingMode::Cancel => {
				state.storage.remove(handle);
				Err(EnqueueError::PolicyRejected("cancelled".to_string()))
			}
			MatchmakingMode::Attempt(attempt) => {
				match Self::run_attempt(state, handle, attempt)? {
					Some(matched) => {
						Self::publish(state, &matched);
						Ok(EnqueueOutcome::Matched(matched))
					}
					None => Ok(EnqueueOutcome::Queued),
				}
			}
		}
	}

	/// Run one matching attempt for a live entry.
	///
	/// On a winning candidate: remove candidate then entry, build the
	/// match, run the policy's `after_match`, record history. Publication
	/// belongs to the caller.
	fn run_attempt(
		state: &mut CoordinatorState,
		handle: EntryHandle,
		attempt: AttemptContext,
	) -> Result<Option<Match>, EnqueueError> {
		let Some(entry) = state.storage.lookup(handle) else {
			return Ok(None);
		};
		let entry = entry.clone();

		let ctx = state.policy_ctx();
		let cap = state.policy.max_delta(&entry, &ctx, &attempt);

		let snapshot = state.storage.snapshot();
		let Some(candidate) = matcher::select_candidate(&snapshot, handle, entry.rank, cap)
		else {
			return Ok(None);
		};

		let candidate_entry = state.storage.remove(candidate.handle).ok_or_else(|| {
			error!(user_id = %candidate.user_id, "Selected candidate vanished from storage");
			EnqueueError::QueueError("selected candidate vanished".to_string())
		})?;
		let entry = state.storage.remove(handle).ok_or_else(|| {
			error!(user_id = %entry.user_id, "Matching entry vanished from storage");
			EnqueueError::QueueError("matching entry vanished".to_string())
		})?;

		let delta = entry.rank.abs_diff(candidate_entry.rank);
		let matched = Match {
			users: [
				MatchedUser {
					handle,
					user_id: entry.user_id,
					rank: entry.rank,
					inserted_at: entry.inserted_at,
				},
				MatchedUser {
					handle: candidate.handle,
					user_id: candidate_entry.user_id,
					rank: candidate_entry.rank,
					inserted_at: candidate_entry.inserted_at,
				},
			],
			delta,
			matched_at: state.now_ms(),
			context: attempt,
		};

		let ctx = state.policy_ctx();
		state.policy.after_match(&matched, &ctx);
		state.history.record(matched.clone());

		info!(
			user_a = %matched.users[0].user_id,
			user_b = %matched.users[1].user_id,
			delta = matched.delta,
			"Matched"
		);

		Ok(Some(matched))
	}

	/// Process one policy retry. Stale handles are dropped silently: the
	/// entry was matched or pruned between timer scheduling and execution.
	fn process_retry(state: &mut CoordinatorState, handle: EntryHandle, attempt: AttemptContext) {
		if state.storage.lookup(handle).is_none() {
			debug!(handle = ?handle, "Dropping stale policy retry");
			return;
		}

		match Self::run_attempt(state, handle, attempt) {
			Ok(Some(matched)) => Self::publish(state, &matched),
			Ok(None) => {}
			Err(e) => error!(error = %e, "Policy retry failed"),
		}
	}

	/// Process one timer tick.
	fn process_tick(state: &mut CoordinatorState) -> TimeoutDecision {
		let ctx = state.policy_ctx();
		state.policy.handle_timeout(&ctx)
	}

	/// Hand a completed match to the publisher. Failures never reach the
	/// matching pipeline.
	fn publish(state: &CoordinatorState, matched: &Match) {
		if let Err(e) = state.publisher.publish(matched) {
			warn!(error = %e, "Publisher failed, match delivery dropped");
		}
	}
}

impl Drop for MatchmakingEngine {
	fn drop(&mut self) {
		let _ = self.command_tx.try_send(EngineCommand::Shutdown);
		if let Some(handle) = self.thread_handle.take()
			&& let Err(e) = handle.join()
		{
			let _ = Err::<(), _>(e);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU64, Ordering};

	use crate::policy::{DeferredCappedConfig, DeferredCappedPolicy, DeltaCap, PolicyContext};
	use crate::publisher::{NullPublisher, PublishError};
	use crate::storage::MemoryStorage;

	/// Clock whose value tests set explicitly.
	fn manual_clock() -> (Arc<AtomicU64>, TimeFn) {
		let now = Arc::new(AtomicU64::new(0));
		let reader = now.clone();
		(now, Arc::new(move || reader.load(Ordering::SeqCst)))
	}

	/// Clock that advances one millisecond per reading.
	fn ticking_clock() -> TimeFn {
		let now = Arc::new(AtomicU64::new(0));
		Arc::new(move || now.fetch_add(1, Ordering::SeqCst))
	}

	fn create_test_state(config: DeferredCappedConfig, time_fn: TimeFn) -> CoordinatorState {
		CoordinatorState::new(
			Box::new(MemoryStorage::new()),
			Box::new(DeferredCappedPolicy::new(config)),
			Arc::new(NullPublisher),
			time_fn,
			100,
		)
	}

	fn eager_config(min_queue: usize) -> DeferredCappedConfig {
		DeferredCappedConfig {
			min_queue,
			max_wait_ms: None,
			tick_ms: None,
			initial_delta: DeltaCap::Unbounded,
			relaxed_delta: DeltaCap::Unbounded,
		}
	}

	fn enqueue(
		state: &mut CoordinatorState,
		user_id: &str,
		rank: i64,
	) -> Result<EnqueueOutcome, EnqueueError> {
		MatchmakingEngine::process_enqueue(state, EnqueueRequest::new(user_id, rank))
	}

	fn expect_match(outcome: Result<EnqueueOutcome, EnqueueError>) -> Match {
		match outcome {
			Ok(EnqueueOutcome::Matched(matched)) => matched,
			other => panic!("expected a match, got {:?}", other),
		}
	}

	#[test]
	fn test_exact_match_pairs_entry_first_candidate_second() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "A", 1500), Ok(EnqueueOutcome::Queued));

		let matched = expect_match(enqueue(&mut state, "B", 1500));
		assert_eq!(matched.users[0].user_id, "B");
		assert_eq!(matched.users[1].user_id, "A");
		assert_eq!(matched.delta, 0);
		assert_eq!(state.storage.len(), 0);
	}

	#[test]
	fn test_fifo_within_same_rank() {
		let mut state = create_test_state(eager_config(4), ticking_clock());

		assert_eq!(enqueue(&mut state, "A", 1100), Ok(EnqueueOutcome::Queued));
		assert_eq!(enqueue(&mut state, "B", 1100), Ok(EnqueueOutcome::Queued));
		assert_eq!(enqueue(&mut state, "C", 1200), Ok(EnqueueOutcome::Queued));

		let matched = expect_match(enqueue(&mut state, "new", 1100));
		assert_eq!(matched.users[0].user_id, "new");
		assert_eq!(matched.users[1].user_id, "A");
		assert_eq!(matched.delta, 0);

		let snapshot = state.storage.snapshot();
		let live: Vec<String> = snapshot
			.arrival
			.iter()
			.map(|e| e.user_id.clone())
			.collect();
		assert_eq!(live, vec!["B".to_string(), "C".to_string()]);
	}

	#[test]
	fn test_match_fires_as_soon_as_queue_is_busy_enough() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "p1", 1000), Ok(EnqueueOutcome::Queued));

		let matched = expect_match(enqueue(&mut state, "p2", 1050));
		assert_eq!(matched.users[0].user_id, "p2");
		assert_eq!(matched.users[1].user_id, "p1");
		assert_eq!(matched.delta, 50);

		assert_eq!(enqueue(&mut state, "p3", 1200), Ok(EnqueueOutcome::Queued));

		let matched = expect_match(enqueue(&mut state, "new", 1051));
		assert_eq!(matched.users[1].user_id, "p3");
		assert_eq!(matched.delta, 149);
	}

	#[test]
	fn test_closest_range_wins_over_earlier_arrival() {
		let mut state = create_test_state(eager_config(4), ticking_clock());

		assert_eq!(enqueue(&mut state, "p1", 1095), Ok(EnqueueOutcome::Queued));
		assert_eq!(enqueue(&mut state, "p2", 1103), Ok(EnqueueOutcome::Queued));
		assert_eq!(enqueue(&mut state, "p3", 1101), Ok(EnqueueOutcome::Queued));

		let matched = expect_match(enqueue(&mut state, "new", 1100));
		assert_eq!(matched.users[1].user_id, "p3");
		assert_eq!(matched.delta, 1);
	}

	struct CancelPolicy;

	impl MatchPolicy for CancelPolicy {
		fn initial_timeout(&self) -> Option<std::time::Duration> {
			None
		}

		fn before_enqueue(&mut self, _: &Entry, _: &PolicyContext) -> EnqueueDecision {
			EnqueueDecision::Proceed
		}

		fn matchmaking_mode(
			&mut self,
			_: EntryHandle,
			_: &Entry,
			_: &PolicyContext,
		) -> MatchmakingMode {
			MatchmakingMode::Cancel
		}

		fn max_delta(
			&mut self,
			_: &Entry,
			_: &PolicyContext,
			_: &AttemptContext,
		) -> DeltaCap {
			DeltaCap::Unbounded
		}

		fn after_match(&mut self, _: &Match, _: &PolicyContext) {}

		fn handle_timeout(&mut self, _: &PolicyContext) -> TimeoutDecision {
			TimeoutDecision::idle(None)
		}
	}

	#[test]
	fn test_cancel_removes_the_inserted_entry() {
		let mut state = CoordinatorState::new(
			Box::new(MemoryStorage::new()),
			Box::new(CancelPolicy),
			Arc::new(NullPublisher),
			ticking_clock(),
			100,
		);

		let before = state.storage.snapshot();
		let result = enqueue(&mut state, "x", 500);

		assert_eq!(
			result,
			Err(EnqueueError::PolicyRejected("cancelled".to_string()))
		);
		assert_eq!(state.storage.len(), 0);
		assert_eq!(state.storage.snapshot(), before);
	}

	#[test]
	fn test_timer_relaxes_deferred_entries() {
		let (now, time_fn) = manual_clock();
		let mut state = create_test_state(
			DeferredCappedConfig {
				min_queue: 10,
				max_wait_ms: Some(100),
				tick_ms: Some(10),
				initial_delta: DeltaCap::Bounded(0),
				relaxed_delta: DeltaCap::Unbounded,
			},
			time_fn,
		);

		now.store(0, Ordering::SeqCst);
		assert_eq!(enqueue(&mut state, "a", 100), Ok(EnqueueOutcome::Queued));
		now.store(1, Ordering::SeqCst);
		assert_eq!(enqueue(&mut state, "b", 200), Ok(EnqueueOutcome::Queued));

		// Nothing is due yet.
		now.store(50, Ordering::SeqCst);
		let decision = MatchmakingEngine::process_tick(&mut state);
		assert!(decision.retries.is_empty());
		assert_eq!(decision.next_tick, Some(std::time::Duration::from_millis(10)));

		// Past the wait cap both deferred entries come due.
		now.store(101, Ordering::SeqCst);
		let decision = MatchmakingEngine::process_tick(&mut state);
		assert_eq!(decision.retries.len(), 2);
		assert!(decision.retries.iter().all(|r| r.attempt.relaxed));

		// The first retry pairs both; the second finds a stale handle.
		for retry in decision.retries {
			MatchmakingEngine::process_retry(&mut state, retry.handle, retry.attempt);
		}

		assert_eq!(state.storage.len(), 0);
		assert_eq!(state.history.len(), 1);
		let matched = &state.history.recent(1)[0];
		assert_eq!(matched.delta, 100);
		assert!(matched.context.relaxed);
	}

	#[test]
	fn test_reenqueue_after_match_forms_an_independent_pair() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "A", 1500), Ok(EnqueueOutcome::Queued));
		let first = expect_match(enqueue(&mut state, "B", 1500));
		assert_eq!(first.users[1].user_id, "A");

		// "A" left storage with the first match, so enqueueing again is
		// not a duplicate and pairs with someone new.
		assert_eq!(enqueue(&mut state, "A", 1500), Ok(EnqueueOutcome::Queued));
		let second = expect_match(enqueue(&mut state, "C", 1500));
		assert_eq!(second.users[0].user_id, "C");
		assert_eq!(second.users[1].user_id, "A");

		// Two distinct pairs in the history; the re-enqueued user holds a
		// fresh handle, so no live entry is shared between the matches.
		let recent = state.history.recent(10);
		assert_eq!(recent.len(), 2);
		assert_ne!(first.users[1].handle, second.users[1].handle);
		assert_eq!(state.storage.len(), 0);
	}

	#[test]
	fn test_duplicate_user_id_is_rejected_without_state_change() {
		let mut state = create_test_state(eager_config(10), ticking_clock());

		assert_eq!(enqueue(&mut state, "alice", 1200), Ok(EnqueueOutcome::Queued));
		let before = state.storage.snapshot();

		assert_eq!(
			enqueue(&mut state, "alice", 900),
			Err(EnqueueError::AlreadyEnqueued)
		);
		assert_eq!(state.storage.snapshot(), before);
	}

	#[test]
	fn test_user_id_is_trimmed_before_uniqueness_and_storage() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "alice", 1200), Ok(EnqueueOutcome::Queued));
		assert_eq!(
			enqueue(&mut state, "  alice  ", 900),
			Err(EnqueueError::AlreadyEnqueued)
		);

		let matched = expect_match(enqueue(&mut state, " bob ", 1200));
		assert_eq!(matched.users[0].user_id, "bob");
	}

	#[test]
	fn test_user_id_validation() {
		let mut state = create_test_state(eager_config(10), ticking_clock());

		assert_eq!(enqueue(&mut state, "", 100), Err(EnqueueError::InvalidUserId));
		assert_eq!(
			enqueue(&mut state, "   ", 100),
			Err(EnqueueError::InvalidUserId)
		);
		assert_eq!(
			enqueue(&mut state, &"x".repeat(256), 100),
			Err(EnqueueError::InvalidUserId)
		);
		// 255 non-ASCII code points are fine.
		assert_eq!(
			enqueue(&mut state, &"ä".repeat(255), 100),
			Ok(EnqueueOutcome::Queued)
		);
	}

	#[test]
	fn test_negative_rank_is_rejected() {
		let mut state = create_test_state(eager_config(10), ticking_clock());

		assert_eq!(enqueue(&mut state, "a", -1), Err(EnqueueError::InvalidRank));
		assert_eq!(state.storage.len(), 0);
	}

	#[test]
	fn test_rank_boundaries_match_symmetrically() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "low", 0), Ok(EnqueueOutcome::Queued));
		let matched = expect_match(enqueue(&mut state, "high", i64::MAX));
		assert_eq!(matched.delta, i64::MAX as u64);
	}

	#[test]
	fn test_singleton_queue_never_matches() {
		let mut state = create_test_state(eager_config(1), ticking_clock());

		assert_eq!(enqueue(&mut state, "solo", 1500), Ok(EnqueueOutcome::Queued));
		assert_eq!(state.storage.len(), 1);
	}

	#[test]
	fn test_stale_retry_is_dropped_silently() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		assert_eq!(enqueue(&mut state, "a", 1000), Ok(EnqueueOutcome::Queued));
		expect_match(enqueue(&mut state, "b", 1000));

		// Both handles are dead now; retrying must not disturb anything.
		MatchmakingEngine::process_retry(&mut state, EntryHandle::new(1), AttemptContext::default());
		assert_eq!(state.history.len(), 1);
		assert_eq!(state.storage.len(), 0);
	}

	#[test]
	fn test_recent_matches_returns_oldest_of_limit_first() {
		let mut state = create_test_state(eager_config(2), ticking_clock());

		for i in 0..3u64 {
			let rank = 1000 + 100 * i as i64;
			assert_eq!(
				enqueue(&mut state, &format!("a{}", i), rank),
				Ok(EnqueueOutcome::Queued)
			);
			expect_match(enqueue(&mut state, &format!("b{}", i), rank));
		}

		let recent = state.history.recent(2);
		assert_eq!(recent.len(), 2);
		assert_eq!(recent[0].users[0].user_id, "b1");
		assert_eq!(recent[1].users[0].user_id, "b2");
	}

	#[test]
	fn test_match_history_overflow_drops_oldest() {
		let mut state = CoordinatorState::new(
			Box::new(MemoryStorage::new()),
			Box::new(DeferredCappedPolicy::new(eager_config(2))),
			Arc::new(NullPublisher),
			ticking_clock(),
			2,
		);

		for i in 0..3u64 {
			let rank = 1000 + 100 * i as i64;
			assert_eq!(
				enqueue(&mut state, &format!("a{}", i), rank),
				Ok(EnqueueOutcome::Queued)
			);
			expect_match(enqueue(&mut state, &format!("b{}", i), rank));
		}

		let recent = state.history.recent(10);
		assert_eq!(recent.len(), 2);
		assert_eq!(recent[0].users[0].user_id, "b1");
		assert_eq!(recent[1].users[0].user_id, "b2");
	}

	#[test]
	fn test_monotonic_arrival_order() {
		let mut state = create_test_state(eager_config(100), ticking_clock());

		for i in 0..10 {
			assert_eq!(
				enqueue(&mut state, &format!("user_{}", i), 1000 + i),
				Ok(EnqueueOutcome::Queued)
			);
		}

		let snapshot = state.storage.snapshot();
		let stamps: Vec<u64> = snapshot.arrival.iter().map(|e| e.inserted_at).collect();
		let mut sorted = stamps.clone();
		sorted.sort_unstable();
		assert_eq!(stamps, sorted);
	}

	struct FailingPublisher;

	impl MatchPublisher for FailingPublisher {
		fn publish(&self, _: &Match) -> Result<(), PublishError> {
			Err(PublishError::Delivery("socket gone".to_string()))
		}
	}

	#[test]
	fn test_publisher_failures_are_swallowed() {
		let mut state = CoordinatorState::new(
			Box::new(MemoryStorage::new()),
			Box::new(DeferredCappedPolicy::new(eager_config(2))),
			Arc::new(FailingPublisher),
			ticking_clock(),
			100,
		);

		assert_eq!(enqueue(&mut state, "a", 1000), Ok(EnqueueOutcome::Queued));
		let matched = expect_match(enqueue(&mut state, "b", 1000));
		assert_eq!(matched.delta, 0);
		assert_eq!(state.history.len(), 1);
	}
}
