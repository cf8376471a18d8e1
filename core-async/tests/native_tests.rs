//! Integration tests for core-async on the Tokio runtime.

use core_async::{sync, task, time, DelayedTask};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_task_spawn_blocking() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    assert_eq!(handle.await.unwrap(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_sleep_on_paused_clock() {
    let start = time::Instant::now();
    time::sleep(time::Duration::from_millis(50)).await;
    assert_eq!(start.elapsed(), time::Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(100)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_mpsc_channel() {
    let (tx, mut rx) = sync::mpsc::unbounded_channel();
    task::spawn(async move {
        for i in 0..3 {
            tx.send(i).unwrap();
        }
    });

    let mut received = Vec::new();
    while let Some(v) = rx.recv().await {
        received.push(v);
    }
    assert_eq!(received, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_watch_channel_latest_value() {
    let (tx, mut rx) = sync::watch::channel("hidden");
    tx.send_replace("visible");
    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow_and_update(), "visible");
}

#[tokio::test(start_paused = true)]
async fn test_delayed_task_drop_cancels() {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    let task = DelayedTask::schedule(time::Duration::from_millis(10), move || {
        inner.fetch_add(1, Ordering::SeqCst);
    });
    drop(task);

    time::sleep(time::Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_delayed_task_async_action() {
    let (tx, rx) = sync::oneshot::channel();
    let _task = DelayedTask::schedule_async(time::Duration::from_millis(10), async move {
        let _ = tx.send("done");
    });
    assert_eq!(rx.await.unwrap(), "done");
}
