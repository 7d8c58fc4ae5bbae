use chrono::{DateTime, Utc};

/// Wall-clock bounds of one completed upload, for client-side duration
/// reporting. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferStats {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Outcome of one health-probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeStats {
    /// `true` when the server answered `Serving`.
    pub ok: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Server-side receive timestamp echoed back in the response.
    pub server_received_at: String,
}

impl ProbeStats {
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn duration_in_milliseconds() {
        let started_at = Utc::now();
        let stats = TransferStats {
            started_at,
            finished_at: started_at + TimeDelta::milliseconds(1500),
        };
        assert_eq!(stats.duration_ms(), 1500);
    }

    #[test]
    fn probe_duration() {
        let started_at = Utc::now();
        let stats = ProbeStats {
            ok: true,
            started_at,
            finished_at: started_at + TimeDelta::milliseconds(42),
            server_received_at: "2024-06-01T00:00:00Z".into(),
        };
        assert_eq!(stats.duration_ms(), 42);
    }
}
