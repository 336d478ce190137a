mod common;

use std::time::Duration;

use serde_json::json;

use common::{
    AlwaysFails, Gated, Record, Sleep, UntilCancelled, fast_config, history_of, processor,
    stats_when, wait_for, wait_for_status,
};
use tasklane_core::domain::{NewTask, Priority, ProcessorError, TaskId, TaskStatus, ValidationError};
use tasklane_core::typed::TaskParams;

const WITHIN: Duration = Duration::from_secs(5);

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn busy_low_lane_does_not_delay_urgent_work() {
    let (processor, probe) = processor(fast_config());
    processor.start().await.unwrap();

    // Low has a single worker; block it and queue more behind it.
    let mut blocked = Vec::new();
    for _ in 0..3 {
        let id = processor
            .submit_task(NewTask::new(Gated::TYPE, json!({})).priority(Priority::Low))
            .await
            .unwrap();
        blocked.push(id);
    }
    wait_for_status(&processor, blocked[0], TaskStatus::Running, WITHIN).await;

    let urgent = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 1 })).priority(Priority::Urgent))
        .await
        .unwrap();
    wait_for_status(&processor, urgent, TaskStatus::Completed, WITHIN).await;

    for id in &blocked[1..] {
        let record = processor.get_task_status(*id).await.unwrap().unwrap();
        assert_eq!(record.status, TaskStatus::Pending);
    }

    probe.release();
    for id in &blocked {
        wait_for_status(&processor, *id, TaskStatus::Completed, WITHIN).await;
    }
    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn single_worker_lane_runs_in_submission_order() {
    let (processor, probe) = processor(fast_config());
    processor.start().await.unwrap();

    let mut ids = Vec::new();
    for seq in 0..5u32 {
        let id = processor
            .submit_task(NewTask::new(Record::TYPE, json!({ "seq": seq })).priority(Priority::Low))
            .await
            .unwrap();
        ids.push(id);
    }
    for id in &ids {
        wait_for_status(&processor, *id, TaskStatus::Completed, WITHIN).await;
    }

    assert_eq!(probe.order().await, vec![0, 1, 2, 3, 4]);
    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dependent_task_starts_after_its_dependency_completes() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let first = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 100 })))
        .await
        .unwrap();
    let second = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 1 })).depends_on([first]))
        .await
        .unwrap();

    let second_done = wait_for_status(&processor, second, TaskStatus::Completed, WITHIN).await;
    let first_done = processor.get_task_status(first).await.unwrap().unwrap();
    assert_eq!(first_done.status, TaskStatus::Completed);
    assert!(second_done.started_at.unwrap() >= first_done.completed_at.unwrap());

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_dependency_keeps_dependent_pending() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let doomed = processor
        .submit_task(NewTask::new(AlwaysFails::TYPE, json!({})).max_retries(0))
        .await
        .unwrap();
    let dependent = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 1 })).depends_on([doomed]))
        .await
        .unwrap();

    wait_for_status(&processor, doomed, TaskStatus::Failed, WITHIN).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let record = processor.get_task_status(dependent).await.unwrap().unwrap();
    assert_eq!(record.status, TaskStatus::Pending);

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn zero_retries_fails_after_one_attempt() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let id = processor
        .submit_task(NewTask::new(AlwaysFails::TYPE, json!({})).max_retries(0).owner("once"))
        .await
        .unwrap();
    let record = wait_for_status(&processor, id, TaskStatus::Failed, WITHIN).await;
    assert_eq!(record.retry_count, 0);

    let history = history_of(&processor, "once", 1, WITHIN).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, TaskStatus::Failed);

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn running_task_can_be_cancelled() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let id = processor
        .submit_task(NewTask::new(UntilCancelled::TYPE, json!({})))
        .await
        .unwrap();
    let running = wait_for(&processor, id, WITHIN, |r| {
        r.status == TaskStatus::Running && r.progress == 50.0
    })
    .await;
    assert_eq!(running.progress_message.as_deref(), Some("waiting for cancel"));
    let stats = processor.get_statistics().await.unwrap();
    assert_eq!(stats.running, 1);
    assert!(stats.utilization > 0.0);

    assert!(!processor.cancel_task(id).await.unwrap());
    assert!(processor.request_cancellation(id).await.unwrap());

    let record = wait_for_status(&processor, id, TaskStatus::Cancelled, WITHIN).await;
    assert!(record.result.is_none());
    assert_eq!(record.error_message.as_deref(), Some("Task was cancelled"));

    let stats = stats_when(&processor, WITHIN, |s| s.cancelled == 1).await;
    assert_eq!(stats.running, 0);

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test]
async fn cancelling_unknown_task_is_not_found() {
    let (processor, _) = processor(fast_config());
    let unknown: TaskId = "01ARZ3NDEKTSV4RRFFQ69G5FAV".parse().unwrap();

    assert!(matches!(
        processor.cancel_task(unknown).await,
        Err(ProcessorError::NotFound(id)) if id == unknown
    ));
    assert!(matches!(
        processor.request_cancellation(unknown).await,
        Err(ProcessorError::NotFound(_))
    ));
}

#[tokio::test]
async fn invalid_submissions_are_rejected_before_persisting() {
    let (processor, _) = processor(fast_config());

    assert!(matches!(
        processor.submit_task(NewTask::new("  ", json!({}))).await,
        Err(ProcessorError::Validation(ValidationError::EmptyTaskType))
    ));
    assert!(matches!(
        processor
            .submit_task(NewTask::new("file_processing", json!({})).timeout_seconds(0))
            .await,
        Err(ProcessorError::Validation(ValidationError::ZeroTimeout))
    ));
    assert!(matches!(
        processor
            .submit_task(NewTask::new("web_scraping", json!({ "url": "ftp://example.com" })))
            .await,
        Err(ProcessorError::Validation(ValidationError::InvalidParameters { .. }))
    ));

    let stats = processor.get_statistics().await.unwrap();
    assert!(stats.totals_by_status.is_empty());
    assert_eq!(stats.submitted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unregistered_type_runs_on_the_generic_handler() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let id = processor
        .submit_task(NewTask::new("custom_thing", json!({ "k": 1 })))
        .await
        .unwrap();
    let record = wait_for_status(&processor, id, TaskStatus::Completed, WITHIN).await;
    let result = record.result.unwrap();
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["task_type"], json!("custom_thing"));

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn start_and_stop_are_idempotent() {
    let (processor, _) = processor(fast_config());
    let workers = processor.config().total_workers();

    processor.start().await.unwrap();
    processor.start().await.unwrap();
    let stats = processor.get_statistics().await.unwrap();
    assert!(stats.is_running);
    assert_eq!(stats.workers, workers);

    assert!(processor.stop(WITHIN).await);
    assert!(processor.stop(WITHIN).await);
    assert!(!processor.is_running().await);

    // Submitted while stopped: persisted, picked up by the recovery tick.
    let id = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 1 })))
        .await
        .unwrap();
    processor.start().await.unwrap();
    wait_for_status(&processor, id, TaskStatus::Completed, WITHIN).await;
    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn future_schedule_waits_for_its_time() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let at = chrono::Utc::now() + chrono::Duration::milliseconds(300);
    let id = processor
        .submit_task(NewTask::new(Sleep::TYPE, json!({ "millis": 1 })).scheduled_at(at))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    let early = processor.get_task_status(id).await.unwrap().unwrap();
    assert_eq!(early.status, TaskStatus::Pending);

    let record = wait_for_status(&processor, id, TaskStatus::Completed, WITHIN).await;
    assert!(record.started_at.unwrap() >= at);

    assert!(processor.stop(WITHIN).await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn progress_is_persisted_while_running() {
    let (processor, _) = processor(fast_config());
    processor.start().await.unwrap();

    let id = processor
        .submit_task(
            NewTask::new("database_maintenance", json!({ "collections": ["a", "b", "c", "d"] })),
        )
        .await
        .unwrap();
    let record = wait_for(&processor, id, WITHIN, |r| r.status.is_terminal()).await;
    assert_eq!(record.status, TaskStatus::Completed);
    assert_eq!(record.progress, 100.0);
    assert!(record.progress_message.is_some());

    assert!(processor.stop(WITHIN).await);
}
