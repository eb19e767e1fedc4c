//! Request-scoped context threaded explicitly through the pipeline.
//!
//! No ambient state: the correlation id and the deadline ride in a value the
//! HTTP boundary constructs (or the orchestrator mints) and every stage
//! receives. All external calls derive their budgets from the deadline.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: String,
    deadline: Instant,
}

impl RequestContext {
    /// Context with a caller-provided correlation id, or a fresh UUID when
    /// the boundary didn't send one.
    pub fn new(correlation_id: Option<String>, timeout: Duration) -> Self {
        Self {
            correlation_id: correlation_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            deadline: Instant::now() + timeout,
        }
    }

    /// Budget left before the request deadline. Zero once expired.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn expired(&self) -> bool {
        self.remaining().is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mints_correlation_id_when_absent() {
        let ctx = RequestContext::new(None, Duration::from_secs(30));
        assert!(!ctx.correlation_id.is_empty());

        let blank = RequestContext::new(Some("   ".into()), Duration::from_secs(30));
        assert!(!blank.correlation_id.trim().is_empty());
    }

    #[test]
    fn keeps_caller_correlation_id() {
        let ctx = RequestContext::new(Some("req-123".into()), Duration::from_secs(30));
        assert_eq!(ctx.correlation_id, "req-123");
    }

    #[test]
    fn deadline_counts_down() {
        let ctx = RequestContext::new(None, Duration::from_millis(50));
        assert!(!ctx.expired());
        std::thread::sleep(Duration::from_millis(60));
        assert!(ctx.expired());
        assert_eq!(ctx.remaining(), Duration::ZERO);
    }
}
