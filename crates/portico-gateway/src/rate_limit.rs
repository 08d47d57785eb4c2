// SPDX-FileCopyrightText: 2026 Portico Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-window request rate limiting.
//!
//! Keying is session-id-first with originating-IP fallback: a request that
//! names a session consumes that session's budget, so one IP hammering the
//! gateway without a session cannot exhaust the budget of a session shared
//! behind a NAT, and vice versa.

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use portico_config::model::LimitsConfig;

/// Bucket table size above which stale entries are pruned opportunistically.
const PRUNE_THRESHOLD: usize = 4096;

#[derive(Debug)]
struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request may proceed.
    Allow,
    /// Request is over budget; retry after the given delay.
    Limited {
        /// Milliseconds until the window resets.
        retry_after_ms: u64,
    },
}

/// Fixed-window limiter with separate session and IP tables.
pub struct RateLimiter {
    sessions: DashMap<String, Bucket>,
    ips: DashMap<IpAddr, Bucket>,
    window: Duration,
    session_max: u32,
    ip_max: u32,
}

impl RateLimiter {
    /// Creates a limiter from the configured limits.
    pub fn new(config: &LimitsConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            ips: DashMap::new(),
            window: Duration::from_millis(config.window_ms.max(1)),
            session_max: config.session_max_requests,
            ip_max: config.ip_max_requests,
        }
    }

    /// Checks one request. Session-id-first, IP-fallback.
    pub fn check(&self, session_id: Option<&str>, peer: IpAddr) -> RateLimitDecision {
        match session_id {
            Some(session_id) => {
                self.prune_if_large();
                Self::check_bucket(
                    self.sessions.entry(session_id.to_string()).or_insert(Bucket {
                        window_start: Instant::now(),
                        count: 0,
                    }),
                    self.window,
                    self.session_max,
                )
            }
            None => {
                self.prune_if_large();
                Self::check_bucket(
                    self.ips.entry(peer).or_insert(Bucket {
                        window_start: Instant::now(),
                        count: 0,
                    }),
                    self.window,
                    self.ip_max,
                )
            }
        }
    }

    fn check_bucket(
        mut bucket: impl std::ops::DerefMut<Target = Bucket>,
        window: Duration,
        max_requests: u32,
    ) -> RateLimitDecision {
        let now = Instant::now();
        if now.duration_since(bucket.window_start) >= window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= max_requests {
            let elapsed = now.duration_since(bucket.window_start);
            let retry_after_ms =
                u64::try_from(window.saturating_sub(elapsed).as_millis()).unwrap_or(u64::MAX);
            RateLimitDecision::Limited { retry_after_ms }
        } else {
            bucket.count = bucket.count.saturating_add(1);
            RateLimitDecision::Allow
        }
    }

    /// Drops buckets whose window closed long ago once the tables get big.
    fn prune_if_large(&self) {
        let stale = self.window * 2;
        if self.sessions.len() > PRUNE_THRESHOLD {
            self.sessions
                .retain(|_, bucket| bucket.window_start.elapsed() < stale);
        }
        if self.ips.len() > PRUNE_THRESHOLD {
            self.ips
                .retain(|_, bucket| bucket.window_start.elapsed() < stale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(session_max: u32, ip_max: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(&LimitsConfig {
            session_max_requests: session_max,
            ip_max_requests: ip_max,
            window_ms,
        })
    }

    fn peer() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    #[test]
    fn allows_up_to_session_budget() {
        let limiter = limiter(3, 100, 60_000);
        for _ in 0..3 {
            assert_eq!(
                limiter.check(Some("s1"), peer()),
                RateLimitDecision::Allow
            );
        }
        assert!(matches!(
            limiter.check(Some("s1"), peer()),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn sessions_have_independent_budgets() {
        let limiter = limiter(1, 100, 60_000);
        assert_eq!(limiter.check(Some("s1"), peer()), RateLimitDecision::Allow);
        assert_eq!(limiter.check(Some("s2"), peer()), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check(Some("s1"), peer()),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn sessionless_requests_use_ip_budget() {
        let limiter = limiter(1, 2, 60_000);
        assert_eq!(limiter.check(None, peer()), RateLimitDecision::Allow);
        assert_eq!(limiter.check(None, peer()), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check(None, peer()),
            RateLimitDecision::Limited { .. }
        ));
    }

    #[test]
    fn ip_traffic_does_not_drain_session_budget() {
        let limiter = limiter(2, 1, 60_000);
        // Exhaust the IP budget.
        assert_eq!(limiter.check(None, peer()), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check(None, peer()),
            RateLimitDecision::Limited { .. }
        ));
        // Session keyed requests from the same IP still pass.
        assert_eq!(limiter.check(Some("s1"), peer()), RateLimitDecision::Allow);
    }

    #[test]
    fn window_reset_restores_budget() {
        let limiter = limiter(1, 100, 10);
        assert_eq!(limiter.check(Some("s1"), peer()), RateLimitDecision::Allow);
        assert!(matches!(
            limiter.check(Some("s1"), peer()),
            RateLimitDecision::Limited { .. }
        ));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.check(Some("s1"), peer()), RateLimitDecision::Allow);
    }

    #[test]
    fn limited_decision_reports_retry_delay() {
        let limiter = limiter(1, 100, 60_000);
        limiter.check(Some("s1"), peer());
        match limiter.check(Some("s1"), peer()) {
            RateLimitDecision::Limited { retry_after_ms } => {
                assert!(retry_after_ms <= 60_000);
                assert!(retry_after_ms > 0);
            }
            other => panic!("expected limited, got {other:?}"),
        }
    }
}
