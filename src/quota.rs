// ===============================
// src/quota.rs
// ===============================
//
// Sliding-window admission gate untuk panggilan ke LLM endpoint:
// - maksimal `max_requests` admission per `window`
// - caller yang kelebihan kuota menunggu (tidak ditolak)
// - antrian FIFO: tokio::sync::Mutex adil, waiter memegang lock selama tidur
//
use std::collections::VecDeque;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout, Duration, Instant};
use tracing::debug;

use crate::metrics::{QUOTA_ADMITTED, QUOTA_WAITS, QUOTA_WAIT_MS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("quota wait exceeded {0:?}")]
    WaitTimeout(Duration),
}

#[derive(Debug)]
pub struct QuotaGate {
    max_requests: usize,
    window: Duration,
    admitted: Mutex<VecDeque<Instant>>,
}

impl QuotaGate {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self { max_requests, window, admitted: Mutex::new(VecDeque::with_capacity(max_requests)) }
    }

    pub fn max_requests(&self) -> usize { self.max_requests }

    pub fn window(&self) -> Duration { self.window }

    /// Wait until the window has room, then record the admission.
    pub async fn acquire(&self) {
        let entered = Instant::now();
        let mut log = self.admitted.lock().await;
        loop {
            let now = Instant::now();
            while let Some(&oldest) = log.front() {
                if oldest + self.window <= now {
                    log.pop_front();
                } else {
                    break;
                }
            }

            if log.len() < self.max_requests {
                log.push_back(now);
                QUOTA_ADMITTED.inc();
                QUOTA_WAIT_MS.observe(now.duration_since(entered).as_secs_f64() * 1_000.0);
                return;
            }

            // log penuh -> front pasti ada
            let Some(&oldest) = log.front() else { continue };
            let wait = (oldest + self.window).saturating_duration_since(now);
            QUOTA_WAITS.inc();
            debug!(wait_ms = wait.as_millis() as u64, in_window = log.len(), "quota full, waiting");
            sleep(wait).await;
        }
    }

    /// `acquire` bounded by `limit`. Nothing is recorded when the wait expires.
    pub async fn acquire_within(&self, limit: Duration) -> Result<(), QuotaError> {
        timeout(limit, self.acquire()).await.map_err(|_| QuotaError::WaitTimeout(limit))
    }

    /// Admissions still inside the window. `None` while a waiter holds the log.
    pub fn in_window(&self) -> Option<usize> {
        let log = self.admitted.try_lock().ok()?;
        let now = Instant::now();
        Some(log.iter().filter(|&&t| t + self.window > now).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admits_up_to_limit_without_waiting() {
        let gate = QuotaGate::new(3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            gate.acquire().await;
        }
        assert_eq!(Instant::now(), start);
        assert_eq!(gate.in_window(), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_fifteen_serializes_through_window() {
        let window = Duration::from_millis(60_000);
        let gate = QuotaGate::new(10, window);
        let mut admitted = Vec::new();
        for _ in 0..15 {
            gate.acquire().await;
            admitted.push(Instant::now());
        }
        for n in 10..15 {
            assert!(admitted[n] >= admitted[n - 10] + window, "call {} admitted too early", n + 1);
        }
        // the first ten pass immediately
        assert_eq!(admitted[9], admitted[0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_admitted_in_fifo_order() {
        let gate = Arc::new(QuotaGate::new(1, Duration::from_secs(10)));
        gate.acquire().await;

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for id in 0..4u32 {
            let gate = gate.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                gate.acquire().await;
                order.lock().await.push(id);
            }));
            // pastikan urutan lock() sesuai urutan spawn
            tokio::task::yield_now().await;
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(*order.lock().await, vec![0, 1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_within_times_out_and_records_nothing() {
        let gate = QuotaGate::new(1, Duration::from_secs(60));
        gate.acquire().await;
        let err = gate.acquire_within(Duration::from_secs(5)).await.unwrap_err();
        assert_eq!(err, QuotaError::WaitTimeout(Duration::from_secs(5)));
        assert_eq!(gate.in_window(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_expiry_frees_capacity() {
        let gate = QuotaGate::new(2, Duration::from_secs(1));
        gate.acquire().await;
        gate.acquire().await;
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(gate.in_window(), Some(0));
        let before = Instant::now();
        gate.acquire().await;
        assert_eq!(Instant::now(), before);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let gate = QuotaGate::new(0, Duration::from_secs(1));
        assert_eq!(gate.max_requests(), 1);
    }
}
