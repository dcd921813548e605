//! # Example: debounced save
//!
//! Simulates a user typing: each keystroke triggers a save, but the save only
//! runs once typing pauses for 250ms.
//!
//! Run with: `cargo run --example debounce`

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use taskgate::{Bus, DebouncedTask, Launch, LogCategory, LogLevel, LogWriter, Subscribe, attach};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "taskgate=debug".into()))
        .init();

    let bus = Bus::default();
    let writer = LogWriter::new()
        .with_min_level(LogLevel::Debug)
        .with_categories(LogCategory::DEBOUNCE | LogCategory::TASK);
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(writer)];
    let listener = attach(&bus, subs);

    let saves = Arc::new(AtomicUsize::new(0));
    let counter = saves.clone();
    let save = DebouncedTask::new("save-draft", bus.clone(), move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        // Blocking file IO would go here.
        std::thread::sleep(Duration::from_millis(20));
        println!("[save] draft written (#{n})");
        Ok(())
    })
    .with_launch(Launch::Threaded);

    for burst in 0..3 {
        println!("[typing] burst {burst}");
        for _ in 0..8 {
            save.start(Duration::from_millis(250)).await;
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    // A trailing keystroke followed by closing the editor: the pending save is dropped.
    save.start(Duration::from_millis(250)).await;
    save.cancel().await;

    println!("[main] {} saves for 25 keystrokes", saves.load(Ordering::SeqCst));
    listener.shutdown().await;
    Ok(())
}
