//! Session throttling.
//!
//! A session may make at most `max_requests` generation calls. The next
//! check after that starts a cooldown of `block_duration`; once it expires
//! the counter starts over.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::session::Session;

/// Default number of requests allowed before a cooldown.
pub(crate) const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Default cooldown length (15 minutes).
pub(crate) const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(15 * 60);

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The request may proceed.
    Admit,
    /// The session is cooling down for this many more seconds.
    Blocked { remaining_secs: u64 },
}

/// Gates generation requests per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    max_requests: u32,
    block_duration: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_BLOCK_DURATION)
    }
}

impl RateLimiter {
    /// Create a limiter allowing `max_requests` before a `block_duration` cooldown.
    pub fn new(max_requests: u32, block_duration: Duration) -> Self {
        Self {
            max_requests,
            block_duration,
        }
    }

    /// Returns the request allowance per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Returns the cooldown length.
    pub fn block_duration(&self) -> Duration {
        self.block_duration
    }

    /// Decide whether `session` may make another request at `now`.
    ///
    /// Clears an expired cooldown (resetting the request counter) and starts
    /// a new one when the allowance is used up. Does not count the request
    /// itself; callers increment `request_count` after a successful call.
    pub fn check_and_admit(&self, session: &mut Session, now: DateTime<Utc>) -> Decision {
        if let Some(until) = session.blocked_until {
            if now < until {
                return Decision::Blocked {
                    remaining_secs: seconds_between(now, until),
                };
            }
            info!(count = session.request_count, "cooldown expired, resetting session");
            session.blocked_until = None;
            session.request_count = 0;
        }

        if session.request_count >= self.max_requests {
            let until = self.block_end(now);
            info!(count = session.request_count, %until, "session limit reached, blocking");
            session.blocked_until = Some(until);
            return Decision::Blocked {
                remaining_secs: seconds_between(now, until),
            };
        }

        debug!(count = session.request_count, max = self.max_requests, "request admitted");
        Decision::Admit
    }

    /// What [`check_and_admit`](Self::check_and_admit) would decide at `now`,
    /// without touching `session`.
    pub fn peek(&self, session: &Session, now: DateTime<Utc>) -> Decision {
        let count = match session.blocked_until {
            Some(until) if now < until => {
                return Decision::Blocked {
                    remaining_secs: seconds_between(now, until),
                };
            }
            Some(_) => 0,
            None => session.request_count,
        };
        if count >= self.max_requests {
            Decision::Blocked {
                remaining_secs: seconds_between(now, self.block_end(now)),
            }
        } else {
            Decision::Admit
        }
    }

    /// Requests counted in the current window at `now`; an expired cooldown counts as zero.
    pub fn used(&self, session: &Session, now: DateTime<Utc>) -> u32 {
        match session.blocked_until {
            Some(until) if now >= until => 0,
            _ => session.request_count,
        }
    }

    fn block_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let block = chrono::Duration::from_std(self.block_duration).unwrap_or(chrono::Duration::MAX);
        now.checked_add_signed(block).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Whole seconds from `now` until `until`, rounded up so a pending cooldown
/// never reports zero.
fn seconds_between(now: DateTime<Utc>, until: DateTime<Utc>) -> u64 {
    let delta = until - now;
    let secs = delta.num_seconds();
    let has_fraction = delta > chrono::Duration::seconds(secs);
    u64::try_from(secs).unwrap_or(0) + u64::from(has_fraction)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_760_000_000 + secs, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn test_should_admit_until_limit_then_block() {
        let limiter = RateLimiter::default();
        let mut session = Session::new();

        for _ in 0..5 {
            assert_eq!(limiter.check_and_admit(&mut session, at(0)), Decision::Admit);
            session.request_count += 1;
        }

        assert_eq!(
            limiter.check_and_admit(&mut session, at(0)),
            Decision::Blocked {
                remaining_secs: 900
            }
        );
        assert_eq!(session.blocked_until, Some(at(900)));
        assert_eq!(session.request_count, 5);
    }

    #[test]
    fn test_should_report_strictly_decreasing_remaining_time() {
        let limiter = RateLimiter::default();
        let mut session = Session::builder().request_count(5).build();
        limiter.check_and_admit(&mut session, at(0));

        let mut previous = u64::MAX;
        for t in [1, 60, 450, 899] {
            let Decision::Blocked { remaining_secs } =
                limiter.check_and_admit(&mut session, at(t))
            else {
                panic!("should still be blocked at t={t}");
            };
            assert!(remaining_secs < previous);
            previous = remaining_secs;
        }
        assert_eq!(previous, 1);
        // Blocked checks never move the deadline.
        assert_eq!(session.blocked_until, Some(at(900)));
    }

    #[test]
    fn test_should_admit_and_reset_counter_after_cooldown() {
        let limiter = RateLimiter::default();
        let mut session = Session::builder().request_count(5).build();
        limiter.check_and_admit(&mut session, at(0));

        assert_eq!(
            limiter.check_and_admit(&mut session, at(900)),
            Decision::Admit
        );
        assert!(session.blocked_until.is_none());
        assert_eq!(session.request_count, 0);
    }

    #[test]
    fn test_should_round_partial_seconds_up() {
        let limiter = RateLimiter::default();
        let mut session = Session::builder()
            .blocked_until(at(10))
            .request_count(5)
            .build();
        let now = at(9) + chrono::Duration::milliseconds(500);

        assert_eq!(
            limiter.check_and_admit(&mut session, now),
            Decision::Blocked { remaining_secs: 1 }
        );
    }

    #[test]
    fn test_should_honor_custom_limits() {
        let limiter = RateLimiter::new(1, Duration::from_secs(30));
        let mut session = Session::new();

        assert_eq!(limiter.check_and_admit(&mut session, at(0)), Decision::Admit);
        session.request_count += 1;
        assert_eq!(
            limiter.check_and_admit(&mut session, at(5)),
            Decision::Blocked { remaining_secs: 30 }
        );
        assert_eq!(limiter.max_requests(), 1);
        assert_eq!(limiter.block_duration(), Duration::from_secs(30));
    }

    #[test]
    fn test_should_block_immediately_with_zero_allowance() {
        let limiter = RateLimiter::new(0, Duration::from_secs(60));
        let mut session = Session::new();
        assert_eq!(
            limiter.check_and_admit(&mut session, at(0)),
            Decision::Blocked { remaining_secs: 60 }
        );
    }

    #[test]
    fn test_should_peek_without_changing_session() {
        let limiter = RateLimiter::default();
        let mut session = Session::builder().request_count(5).build();
        let before = session.clone();

        assert_eq!(
            limiter.peek(&session, at(0)),
            Decision::Blocked {
                remaining_secs: 900
            }
        );
        assert_eq!(session, before);

        limiter.check_and_admit(&mut session, at(0));
        let now = at(100) + chrono::Duration::milliseconds(250);
        assert_eq!(
            limiter.peek(&session, now),
            limiter.check_and_admit(&mut session.clone(), now)
        );
        assert_eq!(
            limiter.peek(&session, now),
            Decision::Blocked {
                remaining_secs: 800
            }
        );
    }

    #[test]
    fn test_should_peek_admit_after_cooldown() {
        let limiter = RateLimiter::default();
        let session = Session::builder()
            .request_count(5)
            .blocked_until(at(900))
            .build();

        assert_eq!(limiter.peek(&session, at(900)), Decision::Admit);
        assert_eq!(limiter.used(&session, at(900)), 0);
        assert_eq!(limiter.used(&session, at(899)), 5);
        assert_eq!(limiter.peek(&Session::new(), at(0)), Decision::Admit);
    }
}
