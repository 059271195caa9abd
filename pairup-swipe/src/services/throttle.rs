use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Allows one registration attempt per client address per interval.
#[derive(Debug)]
pub struct RegistrationThrottle {
    interval: Duration,
    last_attempt: Mutex<HashMap<IpAddr, Instant>>,
}

impl RegistrationThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Records an attempt from `ip`, or returns how long it must wait.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        self.check_at(ip, Instant::now())
    }

    pub fn check_at(&self, ip: IpAddr, now: Instant) -> Result<(), Duration> {
        let mut attempts = self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(last) = attempts.get(&ip) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.interval {
                return Err(self.interval - elapsed);
            }
        }
        attempts.insert(ip, now);
        Ok(())
    }

    /// Drops addresses whose interval has passed. Returns how many were removed.
    pub fn evict_expired(&self, now: Instant) -> usize {
        let mut attempts = self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner);
        let before = attempts.len();
        attempts.retain(|_, last| now.saturating_duration_since(*last) < self.interval);
        before - attempts.len()
    }

    pub fn tracked(&self) -> usize {
        self.last_attempt.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Evicts expired entries once per interval for the lifetime of the process.
pub fn spawn_eviction(throttle: Arc<RegistrationThrottle>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(throttle.interval().max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            let evicted = throttle.evict_expired(Instant::now());
            if evicted > 0 {
                tracing::debug!(evicted, remaining = throttle.tracked(), "registration throttle evicted");
            }
        }
    })
}
