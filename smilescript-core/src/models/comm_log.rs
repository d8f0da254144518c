use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One transcript and its summary, as stored in `comm_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommLog {
    pub id: i64,
    pub transcript: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CommLog {
    /// Timestamp to record on the next summary change. Strictly later than the
    /// current `updated_at` even when the wall clock has not moved.
    pub fn next_updated_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::microseconds(1)
        }
    }
}
