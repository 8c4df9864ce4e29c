//! ``src/tasks/fetch_task.rs``
//! ============================================================================
//! # Background Fetch Task
//!
//! Runs one file's fetch pipeline on the runtime, fire-and-forget. The
//! tracker lets callers wait for every spawned pipeline to finish.

use std::time::Instant;

use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::fetch::{pipeline::FetchPipeline, state::FetchState};

/// Spawn `pipeline` on `runtime`, tracked by `tracker`.
///
/// Callable from any thread, inside or outside the runtime.
pub fn spawn_fetch_task(
    tracker: &TaskTracker,
    runtime: &Handle,
    pipeline: FetchPipeline,
) -> JoinHandle<FetchState> {
    let file_id = pipeline.file().id;
    debug!(file_id, "Spawning fetch pipeline");

    tracker.spawn_on(
        async move {
            let started = Instant::now();
            let state = pipeline.run().await;

            info!(
                marker = "FETCH_PIPELINE",
                operation_type = "pipeline_complete",
                file_id,
                state = state.as_str(),
                elapsed_ms = started.elapsed().as_millis(),
                "Fetch pipeline finished"
            );

            state
        },
        runtime,
    )
}
