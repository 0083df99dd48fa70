//! `qstat -xf -F json` response shape

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level document printed by `qstat -F json`
///
/// `Jobs` is omitted entirely when nothing matched the query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QstatDocument {
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub pbs_version: Option<String>,
    #[serde(default)]
    pub pbs_server: Option<String>,
    #[serde(rename = "Jobs", default)]
    pub jobs: HashMap<String, QstatJob>,
}

/// Attributes of one job listing
///
/// Only the attributes the poller reads are typed; the rest are kept raw.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QstatJob {
    #[serde(rename = "Job_Name", default)]
    pub job_name: Option<String>,
    #[serde(default)]
    pub job_state: Option<String>,
    #[serde(rename = "Exit_status", default)]
    pub exit_status: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}
