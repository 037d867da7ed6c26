//! SearchController tests.
//!
//! Drive a single search directly against a `ScriptedEngine` and check the
//! chunks it submits and the outcome it settles on.

#[cfg(test)]
mod tests {
  use std::{num::NonZeroUsize, sync::Arc, time::Duration};

  use pretty_assertions::assert_eq;
  use tokio::sync::Semaphore;
  use tokio_util::sync::CancellationToken;

  use crate::{
    actor::{
      __tests__::helpers::{Call, ScriptedEngine, work},
      search::{Outcome, SearchController, SearchRange, Termination, engine_slot},
    },
    domain::config::FailurePolicy,
  };

  fn controller(
    engine: Arc<ScriptedEngine>,
    len: usize,
    start: i64,
    end: i64,
    batch_size: usize,
    policy: FailurePolicy,
    cancel: CancellationToken,
  ) -> SearchController {
    controller_on_slot(engine, engine_slot(), len, start, end, batch_size, policy, cancel)
  }

  #[allow(clippy::too_many_arguments)]
  fn controller_on_slot(
    engine: Arc<ScriptedEngine>,
    slot: Arc<Semaphore>,
    len: usize,
    start: i64,
    end: i64,
    batch_size: usize,
    policy: FailurePolicy,
    cancel: CancellationToken,
  ) -> SearchController {
    let work = work("search", len);
    let range = SearchRange::from_inclusive(start, end, work.items.len()).expect("valid range");
    SearchController::new(
      engine,
      work,
      range,
      NonZeroUsize::new(batch_size).expect("non-zero batch"),
      policy,
      slot,
      cancel,
    )
  }

  async fn run(engine: &Arc<ScriptedEngine>, len: usize, start: i64, end: i64, batch_size: usize) -> Outcome {
    controller(
      engine.clone(),
      len,
      start,
      end,
      batch_size,
      FailurePolicy::Mask,
      CancellationToken::new(),
    )
    .run()
    .await
  }

  // ==========================================================================
  // Match / exhaustion
  // ==========================================================================

  #[tokio::test]
  async fn test_match_in_second_chunk_stops_search() {
    let engine = Arc::new(ScriptedEngine::new(4).matching(5));

    let outcome = run(&engine, 10, 0, 9, 4).await;

    assert_eq!(outcome.matched, Some(5));
    assert_eq!(outcome.termination, Termination::MatchFound);
    // Only the first chunk resolved without a match
    assert_eq!(outcome.processed, 4);
    // Chunk [8-9] is never submitted
    assert_eq!(
      engine.calls(),
      vec![Call { start: 0, len: 4 }, Call { start: 4, len: 4 }]
    );
  }

  #[tokio::test]
  async fn test_no_match_processes_whole_range() {
    let engine = Arc::new(ScriptedEngine::new(4));

    let outcome = run(&engine, 10, 0, 9, 4).await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 10);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(
      engine.calls(),
      vec![
        Call { start: 0, len: 4 },
        Call { start: 4, len: 4 },
        Call { start: 8, len: 2 },
      ]
    );
  }

  #[tokio::test]
  async fn test_single_template_range() {
    let engine = Arc::new(ScriptedEngine::new(4));

    let outcome = run(&engine, 10, 5, 5, 4).await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 1);
    assert_eq!(engine.calls(), vec![Call { start: 5, len: 1 }]);
  }

  #[tokio::test]
  async fn test_single_template_match() {
    let engine = Arc::new(ScriptedEngine::new(4).matching(5));

    let outcome = run(&engine, 10, 5, 5, 4).await;

    assert_eq!(outcome.matched, Some(5));
    assert_eq!(outcome.processed, 0);
  }

  #[tokio::test]
  async fn test_empty_range_makes_no_calls() {
    let engine = Arc::new(ScriptedEngine::new(4).matching(3));

    let outcome = run(&engine, 10, 6, 2, 4).await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(engine.call_count(), 0);
  }

  #[tokio::test]
  async fn test_match_outside_range_is_not_seen() {
    let engine = Arc::new(ScriptedEngine::new(4).matching(1));

    let outcome = run(&engine, 10, 2, 9, 4).await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 8);
    assert_eq!(engine.calls().first(), Some(&Call { start: 2, len: 4 }));
  }

  #[tokio::test]
  async fn test_batch_larger_than_range() {
    let engine = Arc::new(ScriptedEngine::new(64).matching(7));

    let outcome = run(&engine, 10, 0, 9, 64).await;

    assert_eq!(outcome.matched, Some(7));
    assert_eq!(engine.calls(), vec![Call { start: 0, len: 10 }]);
  }

  #[tokio::test]
  async fn test_one_call_in_flight_in_ascending_order() {
    let engine = Arc::new(ScriptedEngine::new(3));

    run(&engine, 20, 0, 19, 3).await;

    assert_eq!(engine.max_in_flight(), 1);
    let starts: Vec<usize> = engine.calls().iter().map(|c| c.start).collect();
    assert_eq!(starts, vec![0, 3, 6, 9, 12, 15, 18]);
  }

  // ==========================================================================
  // Engine failures
  // ==========================================================================

  #[tokio::test]
  async fn test_masked_failure_continues_search() {
    let engine = Arc::new(ScriptedEngine::new(4).failing_at(4).matching(9));

    let outcome = run(&engine, 10, 0, 9, 4).await;

    assert_eq!(outcome.matched, Some(9));
    assert_eq!(outcome.masked_failures, 1);
    // The failed chunk counts as processed
    assert_eq!(outcome.processed, 8);
    assert_eq!(engine.call_count(), 3);
  }

  #[tokio::test]
  async fn test_masked_failure_hides_match_in_failed_chunk() {
    let engine = Arc::new(ScriptedEngine::new(4).failing_at(4).matching(5));

    let outcome = run(&engine, 10, 0, 9, 4).await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(outcome.processed, 10);
  }

  #[tokio::test]
  async fn test_propagated_failure_aborts_search() {
    let engine = Arc::new(ScriptedEngine::new(4).failing_at(4).matching(9));

    let outcome = controller(
      engine.clone(),
      10,
      0,
      9,
      4,
      FailurePolicy::Propagate,
      CancellationToken::new(),
    )
    .run()
    .await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 4);
    assert!(matches!(outcome.termination, Termination::Aborted { ref error } if error.contains("scripted failure")));
    assert_eq!(engine.call_count(), 2);
  }

  // ==========================================================================
  // Cancellation
  // ==========================================================================

  #[tokio::test]
  async fn test_cancel_before_start_makes_no_calls() {
    let engine = Arc::new(ScriptedEngine::new(4).matching(0));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let outcome = controller(engine.clone(), 10, 0, 9, 4, FailurePolicy::Mask, cancel)
      .run()
      .await;

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(engine.call_count(), 0);
  }

  #[tokio::test]
  async fn test_cancel_returns_without_waiting_for_engine() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(ScriptedEngine::new(4).matching(2).gated(gate.clone()));
    let cancel = CancellationToken::new();

    let search = tokio::spawn(controller(engine.clone(), 10, 0, 9, 4, FailurePolicy::Mask, cancel.clone()).run());
    assert!(engine.wait_for_calls(1, Duration::from_secs(5)).await);

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(1), search)
      .await
      .expect("cancelled search returns while the engine call is held")
      .expect("search task");

    // The in-flight chunk would have matched, but its result is discarded
    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 0);
    assert_eq!(outcome.termination, Termination::Cancelled);

    gate.add_permits(8);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(engine.call_count(), 1, "no chunk submitted after cancel");
  }

  #[tokio::test]
  async fn test_cancel_between_chunks_keeps_progress() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(ScriptedEngine::new(4).gated(gate.clone()));
    let cancel = CancellationToken::new();

    let search = tokio::spawn(controller(engine.clone(), 10, 0, 9, 4, FailurePolicy::Mask, cancel.clone()).run());
    assert!(engine.wait_for_calls(1, Duration::from_secs(5)).await);
    gate.add_permits(1);
    assert!(engine.wait_for_calls(2, Duration::from_secs(5)).await);

    cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(1), search)
      .await
      .expect("search returns")
      .expect("search task");

    assert_eq!(outcome.matched, None);
    assert_eq!(outcome.processed, 4);
    assert_eq!(outcome.termination, Termination::Cancelled);
    gate.add_permits(8);
  }

  #[tokio::test]
  async fn test_next_search_waits_for_detached_call() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(ScriptedEngine::new(4).gated(gate.clone()));
    let slot = engine_slot();

    let first_cancel = CancellationToken::new();
    let first = tokio::spawn(
      controller_on_slot(engine.clone(), slot.clone(), 10, 0, 9, 4, FailurePolicy::Mask, first_cancel.clone()).run(),
    );
    assert!(engine.wait_for_calls(1, Duration::from_secs(5)).await);
    first_cancel.cancel();
    let outcome = tokio::time::timeout(Duration::from_secs(1), first)
      .await
      .expect("cancelled search returns while its call is held")
      .expect("search task");
    assert_eq!(outcome.termination, Termination::Cancelled);

    let second = tokio::spawn(
      controller_on_slot(engine.clone(), slot, 10, 0, 9, 4, FailurePolicy::Mask, CancellationToken::new()).run(),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.call_count(), 1, "second search must not submit while the first call is in flight");

    gate.add_permits(64);
    let outcome = tokio::time::timeout(Duration::from_secs(5), second)
      .await
      .expect("second search finishes")
      .expect("search task");
    assert_eq!(outcome.processed, 10);
    assert_eq!(engine.max_in_flight(), 1);
  }

  #[tokio::test]
  async fn test_cancel_while_waiting_for_slot() {
    let gate = Arc::new(Semaphore::new(0));
    let engine = Arc::new(ScriptedEngine::new(4).gated(gate.clone()));
    let slot = engine_slot();
    let held = slot.clone().acquire_owned().await.expect("slot open");

    let cancel = CancellationToken::new();
    let search = tokio::spawn(controller_on_slot(engine.clone(), slot, 10, 0, 9, 4, FailurePolicy::Mask, cancel.clone()).run());
    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let outcome = tokio::time::timeout(Duration::from_secs(1), search)
      .await
      .expect("search returns")
      .expect("search task");
    assert_eq!(outcome.termination, Termination::Cancelled);
    assert_eq!(engine.call_count(), 0);
    drop(held);
  }
}
