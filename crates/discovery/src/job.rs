use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Discovery job lifecycle.
///
/// `Pending → InFlight` is guarded by a compare-and-set; everything after
/// `InFlight` is owned by exactly one worker. Terminal states are retained
/// for the configured window and then swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    RejectedNoEvidence,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::Failed | JobState::RejectedNoEvidence
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobState::Pending => "pending",
            JobState::InFlight => "in_flight",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
            JobState::RejectedNoEvidence => "rejected_no_evidence",
        };
        f.write_str(label)
    }
}

/// One unknown-query job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryJob {
    pub job_id: String,
    /// Canonicalized query the job will validate.
    pub query: String,
    pub state: JobState,
    /// Retry counter, 0-indexed (0 = first attempt not yet retried).
    pub attempts: u32,
    /// Earliest instant a retried job may run again.
    pub next_attempt_after: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DiscoveryJob {
    /// Whether a pending job may run at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending
            && self.next_attempt_after.map(|t| t <= now).unwrap_or(true)
    }
}

/// Stream event emitted on every transition into `Pending`.
#[derive(Debug, Clone, PartialEq)]
pub struct JobEvent {
    pub job_id: String,
    pub query: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::InFlight.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::RejectedNoEvidence.is_terminal());
    }

    #[test]
    fn due_respects_next_attempt_after() {
        let now = Utc::now();
        let mut job = DiscoveryJob {
            job_id: "j1".into(),
            query: "Quercetin Phytosome".into(),
            state: JobState::Pending,
            attempts: 1,
            next_attempt_after: Some(now + Duration::seconds(30)),
            last_error: None,
            enqueued_at: now,
            completed_at: None,
        };
        assert!(!job.is_due(now));
        assert!(job.is_due(now + Duration::seconds(31)));

        job.state = JobState::InFlight;
        assert!(!job.is_due(now + Duration::seconds(31)));
    }
}
