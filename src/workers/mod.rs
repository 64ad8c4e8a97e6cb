//! Worker Pipeline
//!
//! Background jobs share one contract: a handle with an idempotent
//! `cancel()`, and a per-worker FIFO event channel delivering
//! `Progress -> Finished | Failed | Cancelled`. Results are pure data;
//! the main thread applies them to the project through commands.
//!
//! Events from one worker arrive in emission order. Events from
//! different workers are unordered with respect to each other.

pub mod audio_extract;
pub mod frame_cache;
pub mod transcribe;
pub mod tts;
pub mod waveform;

pub use audio_extract::start_audio_extraction;
pub use frame_cache::{start_frame_extraction, FrameCache};
pub use transcribe::{start_transcription, TranscribeOptions, Transcriber, TranscriptSegment};
pub use tts::{
    start_tts_synthesis, AudioMixSettings, ScriptSegment, TtsEngine, TtsRequest, TtsResult,
    Voice,
};
pub use waveform::{start_waveform, WaveformCache, WaveformData};

use std::future::Future;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::process::{CancelToken, ProcessError};

// =============================================================================
// Events
// =============================================================================

/// Event stream emitted by a worker, FIFO per worker.
#[derive(Debug)]
pub enum WorkerEvent<T> {
    Progress {
        current: u64,
        total: u64,
        message: Option<String>,
    },
    /// Terminal: the job completed with a result.
    Finished(T),
    /// Terminal: the job failed.
    Failed(CoreError),
    /// Terminal: the job observed cancellation. Never emitted together
    /// with `Finished` for the same worker.
    Cancelled,
}

// =============================================================================
// Handle
// =============================================================================

/// Owner-side handle to a running worker.
pub struct WorkerHandle<T> {
    cancel: CancelToken,
    events: mpsc::UnboundedReceiver<WorkerEvent<T>>,
}

impl<T> WorkerHandle<T> {
    /// Requests cooperative cancellation. Safe to call repeatedly and
    /// after completion.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Receives the next event, or `None` when the worker is gone.
    pub async fn recv(&mut self) -> Option<WorkerEvent<T>> {
        self.events.recv().await
    }

    /// Non-blocking drain for a host main loop.
    pub fn try_recv(&mut self) -> Option<WorkerEvent<T>> {
        self.events.try_recv().ok()
    }

    /// Drains events until the terminal one.
    ///
    /// Returns `Ok(Some(result))` on finish, `Ok(None)` on cancellation,
    /// `Err` on failure. Progress events are discarded.
    pub async fn await_result(mut self) -> CoreResult<Option<T>> {
        while let Some(event) = self.events.recv().await {
            match event {
                WorkerEvent::Progress { .. } => continue,
                WorkerEvent::Finished(value) => return Ok(Some(value)),
                WorkerEvent::Failed(err) => return Err(err),
                WorkerEvent::Cancelled => return Ok(None),
            }
        }
        Ok(None)
    }
}

// =============================================================================
// Worker Context & Spawning
// =============================================================================

/// Given to a worker body for progress reporting and cancel checks.
pub struct WorkerContext<T> {
    cancel: CancelToken,
    tx: mpsc::UnboundedSender<WorkerEvent<T>>,
}

impl<T> WorkerContext<T> {
    pub fn progress(&self, current: u64, total: u64) {
        let _ = self.tx.send(WorkerEvent::Progress {
            current,
            total,
            message: None,
        });
    }

    pub fn progress_message(&self, current: u64, total: u64, message: impl Into<String>) {
        let _ = self.tx.send(WorkerEvent::Progress {
            current,
            total,
            message: Some(message.into()),
        });
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Outcome of a worker body: `Ok(Some)` finished, `Ok(None)` observed
/// cancellation at a safe point.
pub type WorkerOutcome<T> = CoreResult<Option<T>>;

/// Spawns a worker task and returns its handle.
///
/// Exactly one terminal event is emitted. An error that is really a
/// cancellation (the process layer's `Cancelled`) is normalized to the
/// `Cancelled` event so hosts never treat a user's cancel as a failure.
pub fn spawn_worker<T, F, Fut>(name: &'static str, body: F) -> WorkerHandle<T>
where
    T: Send + 'static,
    F: FnOnce(WorkerContext<T>) -> Fut + Send + 'static,
    Fut: Future<Output = WorkerOutcome<T>> + Send + 'static,
{
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::unbounded_channel();

    let ctx = WorkerContext {
        cancel: cancel.clone(),
        tx: tx.clone(),
    };

    tokio::spawn(async move {
        debug!("worker '{}' started", name);
        let terminal = match body(ctx).await {
            Ok(Some(value)) => WorkerEvent::Finished(value),
            Ok(None) => WorkerEvent::Cancelled,
            Err(CoreError::Process(ProcessError::Cancelled)) => WorkerEvent::Cancelled,
            Err(err) => WorkerEvent::Failed(err),
        };
        debug!(
            "worker '{}' terminal event: {}",
            name,
            match &terminal {
                WorkerEvent::Finished(_) => "finished",
                WorkerEvent::Cancelled => "cancelled",
                WorkerEvent::Failed(_) => "failed",
                WorkerEvent::Progress { .. } => unreachable!(),
            }
        );
        let _ = tx.send(terminal);
    });

    WorkerHandle { cancel, events: rx }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_emission_order() {
        let mut handle = spawn_worker("order", |ctx| async move {
            for i in 0..5u64 {
                ctx.progress(i, 5);
            }
            Ok(Some(42))
        });

        let mut seen = Vec::new();
        while let Some(event) = handle.recv().await {
            match event {
                WorkerEvent::Progress { current, .. } => seen.push(current),
                WorkerEvent::Finished(value) => {
                    assert_eq!(value, 42);
                    break;
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_cancelled_worker_emits_single_terminal_event() {
        let mut handle = spawn_worker("cancellable", |ctx| async move {
            loop {
                if ctx.is_cancelled() {
                    return Ok(None);
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            #[allow(unreachable_code)]
            Ok(Some(()))
        });

        handle.cancel();
        handle.cancel(); // idempotent

        let mut terminals = 0;
        while let Some(event) = handle.recv().await {
            if matches!(event, WorkerEvent::Cancelled | WorkerEvent::Finished(_)) {
                terminals += 1;
            }
        }
        assert_eq!(terminals, 1);
    }

    #[tokio::test]
    async fn test_finish_wins_when_already_done() {
        // A worker that crosses the finish line before observing the
        // flag must still report Finished.
        let mut handle = spawn_worker("fast", |_ctx| async move { Ok(Some("done")) });
        // Give the worker time to finish, then cancel.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        handle.cancel();

        let mut finished = false;
        while let Some(event) = handle.recv().await {
            match event {
                WorkerEvent::Finished(v) => {
                    assert_eq!(v, "done");
                    finished = true;
                }
                WorkerEvent::Cancelled => panic!("must not emit Cancelled after finishing"),
                _ => {}
            }
        }
        assert!(finished);
    }

    #[tokio::test]
    async fn test_failed_worker_surfaces_error() {
        let handle = spawn_worker::<(), _, _>("failing", |_ctx| async move {
            Err(CoreError::OutOfRange("boom".to_string()))
        });
        let result = handle.await_result().await;
        assert!(matches!(result, Err(CoreError::OutOfRange(_))));
    }

    #[tokio::test]
    async fn test_process_cancelled_normalizes_to_cancelled_event() {
        let handle = spawn_worker::<(), _, _>("proc-cancel", |_ctx| async move {
            Err(CoreError::Process(ProcessError::Cancelled))
        });
        let result = handle.await_result().await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_await_result_skips_progress() {
        let handle = spawn_worker("progressive", |ctx| async move {
            ctx.progress_message(1, 2, "halfway");
            ctx.progress(2, 2);
            Ok(Some(7))
        });
        assert_eq!(handle.await_result().await.unwrap(), Some(7));
    }
}
