//! # Example: single-flight sync loop
//!
//! A periodic "sync" loop controlled by one [`SingleTask`]:
//! - a second start is dropped while the loop runs;
//! - a stubborn run shows the stop timeout and a later successful stop;
//! - an external hold freezes start/stop while results are processed.
//!
//! Run with: `RUST_LOG=taskgate=debug cargo run --example single_flight`

use std::{sync::Arc, time::Duration};

use taskgate::{
    AdmissionPolicy, Config, ControllerError, LogWriter, SingleTask, Subscribe, TaskError, attach,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

async fn sync_loop(token: CancellationToken) -> Result<(), TaskError> {
    let mut round = 0u32;
    while !token.is_cancelled() {
        round += 1;
        println!("[sync] round {round}");
        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }
    println!("[sync] cancelled after {round} rounds");
    Err(TaskError::Canceled)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskgate=debug".into()))
        .init();

    let cfg = Config {
        stop_timeout: Duration::from_secs(2),
        ..Config::default()
    };
    let bus = cfg.bus();
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let listener = attach(&bus, subs);

    let task = SingleTask::new(cfg, bus);

    // 1) Start, then a redundant start that is dropped.
    task.start("sync", AdmissionPolicy::DropIfRunning, sync_loop).await?;
    task.start("sync", AdmissionPolicy::DropIfRunning, sync_loop).await?;
    tokio::time::sleep(Duration::from_millis(350)).await;
    task.stop().await?;

    // 2) A run that ignores its signal for a while.
    task.start("stubborn", AdmissionPolicy::FailIfRunning, |_token| async {
        tokio::time::sleep(Duration::from_millis(600)).await;
        println!("[stubborn] finally done");
        Ok(())
    })
    .await?;
    match task.stop_within(Duration::from_millis(200)).await {
        Err(ControllerError::StopTimedOut { label, timeout }) => {
            println!("[main] {label} did not stop within {timeout:?}, waiting again");
            task.stop().await?;
        }
        other => other?,
    }

    // 3) Hold the gate while processing results; start waits for at most max_hold.
    task.wait_lock_externally(Duration::from_millis(300)).await?;
    println!("[main] gate held, processing results");
    let res = task
        .start("sync", AdmissionPolicy::FailIfRunning, sync_loop)
        .await;
    println!("[main] start while held: {res:?}");
    task.release_lock_externally()?;

    task.start("sync", AdmissionPolicy::FailIfRunning, sync_loop).await?;
    tokio::time::sleep(Duration::from_millis(150)).await;
    task.stop_then(Duration::from_secs(1), || println!("[main] stopped, slot free"))
        .await?;

    listener.shutdown().await;
    Ok(())
}
