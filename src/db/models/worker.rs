use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

use crate::db::codec::parse_timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct WorkerRegistration {
    pub worker_id: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    pub capabilities: Map<String, Value>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_heartbeat: String,
}

/// Assignment of one execution to one worker.
///
/// `lease_version` is the fencing token: a dispatcher renewing or reassigning
/// must write a strictly larger value than the one it read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExecutionLease {
    pub execution_id: String,
    pub worker_id: String,
    #[ts(type = "number")]
    pub lease_version: i64,
    pub lease_expires_at: String,
    #[ts(type = "number")]
    pub run_attempt: i64,
}

impl ExecutionLease {
    /// An unparsable expiry counts as expired.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        parse_timestamp(&self.lease_expires_at)
            .map(|expires_at| expires_at > now)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::db::codec::format_timestamp;

    fn lease_expiring(at: &str) -> ExecutionLease {
        ExecutionLease {
            execution_id: "exec_1".into(),
            worker_id: "w1".into(),
            lease_version: 1,
            lease_expires_at: at.into(),
            run_attempt: 1,
        }
    }

    #[test]
    fn lease_liveness_compares_against_expiry() {
        let now = Utc::now();
        assert!(lease_expiring(&format_timestamp(now + Duration::seconds(30))).is_live_at(now));
        assert!(!lease_expiring(&format_timestamp(now - Duration::seconds(1))).is_live_at(now));
        assert!(!lease_expiring("garbage").is_live_at(now));
    }
}
