//! Tests for the three-phase pipeline and its cleanup stack.

mod helpers;

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;

use helpers::{MockDriver, RecordingStep, RecordingUi};
use vsforge::error::VsforgeError;
use vsforge::pipeline::{Pipeline, RunOutcome};
use vsforge::state::StateBag;

fn bag(cancel: CancellationToken) -> StateBag {
    StateBag::new(
        Arc::new(MockDriver::new()),
        Arc::new(RecordingUi::default()),
        cancel,
    )
}

fn log() -> Arc<Mutex<Vec<String>>> {
    Arc::new(Mutex::new(Vec::new()))
}

#[test]
fn test_steps_run_in_phase_order_and_clean_up_in_reverse() {
    let log = log();
    let mut pipeline = Pipeline::new(
        vec![RecordingStep::new("a", &log).boxed()],
        vec![RecordingStep::new("b", &log).boxed()],
        vec![RecordingStep::new("c", &log).boxed()],
    );
    let mut bag = bag(CancellationToken::new());

    assert_eq!(pipeline.run(&mut bag), RunOutcome::Completed);
    assert_eq!(
        *log.lock().unwrap(),
        ["run:a", "run:b", "run:c", "cleanup:c", "cleanup:b", "cleanup:a"]
    );
    assert!(bag.error().is_none());
}

#[test]
fn test_halt_stops_the_run_and_skips_unstarted_steps() {
    let log = log();
    let mut pipeline = Pipeline::new(
        vec![
            RecordingStep::new("a", &log).boxed(),
            RecordingStep::new("b", &log).halting().boxed(),
        ],
        vec![RecordingStep::new("c", &log).boxed()],
        vec![],
    );
    let mut bag = bag(CancellationToken::new());

    assert_eq!(pipeline.run(&mut bag), RunOutcome::Halted { step: "b" });
    assert_eq!(*log.lock().unwrap(), ["run:a", "run:b", "cleanup:b", "cleanup:a"]);
    assert_eq!(bag.error().map(|e| e.to_string()), Some("configuration error: b failed".to_string()));
}

#[test]
fn test_cancellation_is_observed_before_the_next_step() {
    let log = log();
    let cancel = CancellationToken::new();
    let mut pipeline = Pipeline::new(
        vec![RecordingStep::new("a", &log).cancelling(cancel.clone()).boxed()],
        vec![RecordingStep::new("b", &log).boxed()],
        vec![],
    );
    let mut bag = bag(cancel);

    assert_eq!(pipeline.run(&mut bag), RunOutcome::Cancelled { before: "b" });
    assert_eq!(*log.lock().unwrap(), ["run:a", "cleanup:a"]);
    assert!(matches!(bag.error(), Some(VsforgeError::Cancelled(_))));
}

#[test]
fn test_cancelled_before_start_runs_nothing() {
    let log = log();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut pipeline = Pipeline::new(vec![RecordingStep::new("a", &log).boxed()], vec![], vec![]);
    let mut bag = bag(cancel);

    assert_eq!(pipeline.run(&mut bag), RunOutcome::Cancelled { before: "a" });
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_empty_pipeline_completes() {
    let mut pipeline = Pipeline::new(vec![], vec![], vec![]);
    assert!(pipeline.is_empty());
    assert_eq!(pipeline.total_steps(), 0);
    assert_eq!(pipeline.run(&mut bag(CancellationToken::new())), RunOutcome::Completed);
}

#[test]
fn test_first_error_wins() {
    let mut bag = bag(CancellationToken::new());
    assert!(bag.set_error(VsforgeError::Config("first".to_string())));
    assert!(!bag.set_error(VsforgeError::Config("second".to_string())));
    assert_eq!(
        bag.take_error().map(|e| e.to_string()),
        Some("configuration error: first".to_string())
    );
}
