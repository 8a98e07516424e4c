use std::future::Future;

use anyhow::{Context, Result};
use image::RgbaImage;
use tokio::task::JoinHandle;

use super::keypoint::Pose;

/// Pose-estimation backend seen from the overlay pipeline.
///
/// `initialize` selects and loads the computation backend and may fail; the
/// session retries it a bounded number of times. `estimate_poses` returns
/// every person found in the frame with keypoints in video pixel space.
/// The session may drop an `estimate_poses` future on timeout; backends that
/// run blocking work should keep it in a [`BlockingSlot`].
pub trait KeypointExtractor: Send {
    fn initialize(&mut self) -> impl Future<Output = Result<()>> + Send;

    fn estimate_poses(&mut self, frame: &RgbaImage)
        -> impl Future<Output = Result<Vec<Pose>>> + Send;
}

/// Holds the one blocking inference job of an extractor.
///
/// If the caller gives up on a run (e.g. the session's timeout drops the
/// future), the job keeps its slot and the next `run` waits for that job
/// instead of spawning another one. `job` is discarded in that case.
pub struct BlockingSlot<T> {
    pending: Option<JoinHandle<Result<T>>>,
}

impl<T: Send + 'static> BlockingSlot<T> {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// A previous job is still unfinished or unclaimed.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
    }

    pub async fn run<F>(&mut self, job: F) -> Result<T>
    where
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let handle = self
            .pending
            .get_or_insert_with(|| tokio::task::spawn_blocking(job));
        let joined = handle.await;
        self.pending = None;
        joined.context("Inference task panicked")?
    }
}

impl<T: Send + 'static> Default for BlockingSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_returns_job_result() {
        let mut slot = BlockingSlot::new();
        assert_eq!(slot.run(|| Ok(7)).await.unwrap(), 7);
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn test_job_error_propagates() {
        let mut slot: BlockingSlot<u32> = BlockingSlot::new();
        assert!(slot.run(|| anyhow::bail!("backend lost")).await.is_err());
        assert!(!slot.is_busy());
    }

    #[tokio::test]
    async fn test_abandoned_job_is_resumed_not_duplicated() {
        let started = Arc::new(AtomicU32::new(0));
        let mut slot = BlockingSlot::new();

        let s = started.clone();
        let slow = slot.run(move || {
            s.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(300));
            Ok(1)
        });
        assert!(tokio::time::timeout(Duration::from_millis(20), slow).await.is_err());
        assert!(slot.is_busy());

        // 2 つ目のジョブは起動されず、前のジョブの結果が返る
        let s = started.clone();
        let result = slot
            .run(move || {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await
            .unwrap();
        assert_eq!(result, 1);
        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert!(!slot.is_busy());
    }
}
