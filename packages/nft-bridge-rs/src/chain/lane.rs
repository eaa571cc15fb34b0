//! Per-signer submission lane
//!
//! Nonce assignment and broadcast for one signing identity must not
//! interleave. Every submission runs inside [`SubmissionLane::submit`];
//! reads never touch the lane.

use std::future::Future;

use tokio::sync::Mutex;

/// Serializes transaction submission for one signer.
#[derive(Debug, Default)]
pub struct SubmissionLane {
    lock: Mutex<()>,
}

impl SubmissionLane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lane. Waiters are served in FIFO order.
    pub async fn submit<F, Fut, T>(&self, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        f().await
    }

    /// True while no submission holds the lane.
    pub fn is_idle(&self) -> bool {
        self.lock.try_lock().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_concurrent_submissions_run_one_at_a_time() {
        let lane = Arc::new(SubmissionLane::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for nonce in 0..8u64 {
            let lane = lane.clone();
            let in_flight = in_flight.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                lane.submit(|| async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    nonce
                })
                .await
            }));
        }

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results.sort_unstable();

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(results, (0..8u64).collect::<Vec<_>>());
        assert!(lane.is_idle());
    }

    #[tokio::test]
    async fn test_second_submission_waits_for_holder() {
        let lane = Arc::new(SubmissionLane::new());
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let holder = {
            let lane = lane.clone();
            tokio::spawn(async move {
                lane.submit(|| async move {
                    entered_tx.send(()).unwrap();
                    release_rx.await.unwrap();
                })
                .await
            })
        };
        entered_rx.await.unwrap();
        assert!(!lane.is_idle());

        // A second submission waits behind the holder.
        let queued = {
            let lane = lane.clone();
            tokio::spawn(async move { lane.submit(|| async { "queued" }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!queued.is_finished());

        release_tx.send(()).unwrap();
        holder.await.unwrap();
        assert_eq!(queued.await.unwrap(), "queued");
        assert!(lane.is_idle());
    }
}
