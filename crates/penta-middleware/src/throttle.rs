//! Request throttling.
//!
//! Throttles run after authentication, so key strategies can look at the
//! caller's [`Identity`]. Every throttle in the chain is consulted; when any
//! of them denies, the request fails with the longest known wait.
//!
//! ## Algorithm
//!
//! [`RateThrottle`] keeps a sliding history of request instants per key.
//! Entries older than the window are dropped on each check, and a request
//! is denied while the history holds `num_requests` entries. Keys with no
//! request inside the window are swept away.

use parking_lot::Mutex;
use penta_core::{Identity, PentaError, PentaResult, Request};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Rate limit header names.
pub mod headers {
    /// Seconds to wait before retrying (on 429).
    pub const RETRY_AFTER: &str = "retry-after";
}

/// Whole seconds for a `Retry-After` header, rounded up and at least one.
#[must_use]
pub fn retry_after_secs(wait: Duration) -> u64 {
    let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
    secs.max(1)
}

/// Outcome of a single throttle check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// The request may proceed.
    Allow,
    /// The request is over the limit.
    Deny {
        /// Time until a request would be allowed, when known.
        wait: Option<Duration>,
    },
}

/// One member of a throttle chain.
pub trait Throttle: Send + Sync + 'static {
    /// Records and checks `request`.
    fn check(&self, request: &Request, identity: &Identity) -> ThrottleDecision;
}

/// How a [`RateThrottle`] keys its histories.
#[derive(Clone, Default)]
pub enum ThrottleKey {
    /// Client IP, applied to unauthenticated callers only.
    Anonymous,
    /// Caller identity, applied to authenticated callers only.
    Authenticated,
    /// Caller identity when authenticated, else client IP.
    #[default]
    User,
    /// Client IP for everyone.
    Ip,
    /// Value of a request header; requests without it are not throttled.
    Header(String),
    /// One shared history.
    Global,
    /// Application-defined key; `None` skips the throttle.
    Custom(Arc<dyn Fn(&Request, &Identity) -> Option<String> + Send + Sync>),
}

impl fmt::Debug for ThrottleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "ThrottleKey::Anonymous"),
            Self::Authenticated => write!(f, "ThrottleKey::Authenticated"),
            Self::User => write!(f, "ThrottleKey::User"),
            Self::Ip => write!(f, "ThrottleKey::Ip"),
            Self::Header(h) => f.debug_tuple("ThrottleKey::Header").field(h).finish(),
            Self::Global => write!(f, "ThrottleKey::Global"),
            Self::Custom(_) => write!(f, "ThrottleKey::Custom(<fn>)"),
        }
    }
}

impl ThrottleKey {
    fn extract(&self, request: &Request, identity: &Identity) -> Option<String> {
        let ip = || format!("ip:{}", request.client_ip().unwrap_or_else(|| "unknown".to_string()));
        match self {
            Self::Anonymous => (!identity.is_authenticated()).then(ip),
            Self::Authenticated => identity.is_authenticated().then(|| identity.log_id()),
            Self::User if identity.is_authenticated() => Some(identity.log_id()),
            Self::User | Self::Ip => Some(ip()),
            Self::Header(name) => request.header(name).map(|value| format!("header:{value}")),
            Self::Global => Some("global".to_string()),
            Self::Custom(f) => f(request, identity),
        }
    }
}

/// Parses a rate such as `10/m`, `1000/day` or `5/10s`.
///
/// The unit is read from its first letter (`s`, `m`, `h`, `d`), so long
/// names are accepted. An optional multiplier scales the period.
///
/// # Errors
///
/// Returns a configuration error for malformed rates or a zero count.
pub fn parse_rate(rate: &str) -> PentaResult<(usize, Duration)> {
    let invalid = || PentaError::configuration(format!("invalid throttle rate '{rate}'"));

    let (count, period) = rate.trim().split_once('/').ok_or_else(invalid)?;
    let count: usize = count.trim().parse().map_err(|_| invalid())?;
    if count == 0 {
        return Err(invalid());
    }

    let period = period.trim();
    let unit_start = period
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let multiplier: u64 = if unit_start == 0 {
        1
    } else {
        period[..unit_start].parse().map_err(|_| invalid())?
    };
    let seconds = match period[unit_start..].chars().next().map(|c| c.to_ascii_lowercase()) {
        Some('s') => 1,
        Some('m') => 60,
        Some('h') => 3_600,
        Some('d') => 86_400,
        _ => return Err(invalid()),
    };
    if multiplier == 0 {
        return Err(invalid());
    }
    let total = multiplier.checked_mul(seconds).ok_or_else(invalid)?;
    Ok((count, Duration::from_secs(total)))
}

/// Sliding-window rate throttle.
///
/// # Example
///
/// ```rust
/// use penta_core::{Identity, Request};
/// use penta_middleware::{RateThrottle, Throttle, ThrottleDecision, ThrottleKey};
///
/// let throttle = RateThrottle::new("1/m").unwrap().key(ThrottleKey::Global);
/// let request = Request::builder().build();
/// assert_eq!(throttle.check(&request, &Identity::Anonymous), ThrottleDecision::Allow);
/// assert!(matches!(
///     throttle.check(&request, &Identity::Anonymous),
///     ThrottleDecision::Deny { .. }
/// ));
/// ```
pub struct RateThrottle {
    rate: String,
    num_requests: usize,
    duration: Duration,
    key: ThrottleKey,
    history: Mutex<Histories>,
}

/// Request instants per key.
///
/// Keys whose newest entry has left the window are swept at most once per
/// window, so the map only holds keys seen during the last two windows.
#[derive(Default)]
struct Histories {
    keys: HashMap<String, VecDeque<Instant>>,
    swept: Option<Instant>,
}

impl Histories {
    fn sweep(&mut self, now: Instant, window: Duration) {
        if self
            .swept
            .is_some_and(|swept| now.saturating_duration_since(swept) < window)
        {
            return;
        }
        self.keys.retain(|_, history| {
            history
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) < window)
        });
        self.swept = Some(now);
    }
}

impl RateThrottle {
    /// Creates a throttle keyed by [`ThrottleKey::User`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `rate` does not parse.
    pub fn new(rate: &str) -> PentaResult<Self> {
        let (num_requests, duration) = parse_rate(rate)?;
        Ok(Self {
            rate: rate.to_string(),
            num_requests,
            duration,
            key: ThrottleKey::default(),
            history: Mutex::new(Histories::default()),
        })
    }

    /// Sets the key strategy.
    #[must_use]
    pub fn key(mut self, key: ThrottleKey) -> Self {
        self.key = key;
        self
    }

    /// Returns the configured rate text.
    #[must_use]
    pub fn rate(&self) -> &str {
        &self.rate
    }

    /// Checks a request as if it arrived at `now`.
    pub fn check_at(&self, request: &Request, identity: &Identity, now: Instant) -> ThrottleDecision {
        let Some(key) = self.key.extract(request, identity) else {
            return ThrottleDecision::Allow;
        };

        let mut histories = self.history.lock();
        histories.sweep(now, self.duration);
        let history = histories.keys.entry(key).or_default();
        while history
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.duration)
        {
            history.pop_front();
        }

        if history.len() >= self.num_requests {
            let wait = history.front().map(|oldest| {
                let remaining = self.duration.saturating_sub(now.saturating_duration_since(*oldest));
                let available = self.num_requests + 1 - history.len();
                remaining / u32::try_from(available).unwrap_or(u32::MAX)
            });
            return ThrottleDecision::Deny { wait };
        }

        history.push_back(now);
        ThrottleDecision::Allow
    }

    /// Forgets every recorded request.
    pub fn reset(&self) {
        *self.history.lock() = Histories::default();
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.history.lock().keys.len()
    }
}

impl Throttle for RateThrottle {
    fn check(&self, request: &Request, identity: &Identity) -> ThrottleDecision {
        self.check_at(request, identity, Instant::now())
    }
}

impl fmt::Debug for RateThrottle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateThrottle")
            .field("rate", &self.rate)
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// An ordered throttle chain.
#[derive(Clone, Default)]
pub struct ThrottleGate {
    throttles: Vec<Arc<dyn Throttle>>,
}

impl ThrottleGate {
    /// Creates a gate over `throttles`.
    #[must_use]
    pub fn new(throttles: Vec<Arc<dyn Throttle>>) -> Self {
        Self { throttles }
    }

    /// Returns the number of throttles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.throttles.len()
    }

    /// Returns `true` if the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.throttles.is_empty()
    }

    /// Consults every throttle.
    ///
    /// # Errors
    ///
    /// Returns [`PentaError::Throttled`] carrying the longest known wait when
    /// any throttle denies.
    pub fn check(&self, request: &Request, identity: &Identity) -> PentaResult<()> {
        let mut denied = false;
        let mut longest: Option<Duration> = None;
        for throttle in &self.throttles {
            if let ThrottleDecision::Deny { wait } = throttle.check(request, identity) {
                denied = true;
                longest = longest.max(wait);
            }
        }
        if denied {
            tracing::debug!(
                http.path = %request.path(),
                identity = %identity.log_id(),
                wait = ?longest,
                "request throttled"
            );
            return Err(PentaError::throttled(longest));
        }
        Ok(())
    }
}

impl fmt::Debug for ThrottleGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThrottleGate")
            .field("throttles", &self.throttles.len())
            .finish()
    }
}
