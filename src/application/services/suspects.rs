//! Short-lived record of clients flagged by the injection detectors.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Clients whose input recently matched a heuristic detector.
///
/// A flagged client is subject to the `strict` limiter until the flag expires.
pub struct SuspectList {
    entries: Mutex<HashMap<IpAddr, Instant>>,
    ttl: Duration,
}

impl SuspectList {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Flags `ip`, extending an existing flag.
    pub fn flag(&self, ip: IpAddr) {
        let expires_at = Instant::now() + self.ttl;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(ip, expires_at);
    }

    pub fn contains(&self, ip: IpAddr) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&ip) {
            Some(expires_at) if *expires_at > Instant::now() => true,
            Some(_) => {
                entries.remove(&ip);
                false
            }
            None => false,
        }
    }

    /// Drops every expired flag. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, expires_at| *expires_at > now);
        before - entries.len()
    }

    /// Number of stored flags, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a background task purging expired flags every `every`.
    ///
    /// Flags are otherwise only dropped when the same client is looked up again,
    /// so clients that never return would stay in memory.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired suspect flags");
                }
            }
        })
    }
}

impl Default for SuspectList {
    fn default() -> Self {
        Self::new(Duration::from_secs(15 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_and_contains() {
        let suspects = SuspectList::default();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        assert!(!suspects.contains(ip));
        suspects.flag(ip);
        assert!(suspects.contains(ip));
    }

    #[test]
    fn test_flag_expires() {
        let suspects = SuspectList::new(Duration::from_millis(10));
        let ip: IpAddr = "203.0.113.7".parse().unwrap();

        suspects.flag(ip);
        std::thread::sleep(Duration::from_millis(25));

        assert!(!suspects.contains(ip));
    }

    #[test]
    fn test_purge_drops_only_expired_flags() {
        let suspects = SuspectList::new(Duration::from_millis(10));
        for last in 1..=3u8 {
            suspects.flag(IpAddr::from([198, 51, 100, last]));
        }
        std::thread::sleep(Duration::from_millis(25));

        let fresh: IpAddr = "203.0.113.7".parse().unwrap();
        suspects.flag(fresh);

        assert_eq!(suspects.len(), 4);
        assert_eq!(suspects.purge_expired(), 3);
        assert_eq!(suspects.len(), 1);
        assert!(suspects.contains(fresh));
    }

    #[tokio::test]
    async fn test_sweeper_removes_flags_without_lookups() {
        let suspects = Arc::new(SuspectList::new(Duration::from_millis(10)));
        for last in 1..=50u8 {
            suspects.flag(IpAddr::from([198, 51, 100, last]));
        }
        assert_eq!(suspects.len(), 50);

        let sweeper = suspects.clone().spawn_sweeper(Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(60)).await;
        sweeper.abort();

        assert!(suspects.is_empty());
    }
}
