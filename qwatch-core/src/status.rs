//! Batch-queue status parsing
//!
//! Turns the text printed by a status query into a [`JobReport`] and a
//! [`PollResult`]. Two report formats are understood:
//!
//! - JSON, as printed by `qstat -xf -F json <id>`
//! - line-delimited `key = value` text, as printed by `qstat -xf <id>`, with
//!   or without the leading `Job Id:` header
//!
//! A job that is missing from the listing, or listed as finished, has left
//! the queue; its exit status then decides success or failure.

use thiserror::Error;

use crate::domain::job::JobHandle;
use crate::domain::poll::{FailureReason, PollResult};
use crate::dto::qstat::QstatDocument;

/// PBS `job_state` values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Queued,
    Running,
    Held,
    Waiting,
    Transit,
    Exiting,
    Suspended,
    UserSuspended,
    ArrayBegun,
    Moved,
    Expired,
    Finished,
}

impl QueueState {
    /// Parses a single-letter PBS state code
    pub fn from_code(code: &str) -> Option<Self> {
        let state = match code.trim().to_ascii_uppercase().as_str() {
            "Q" => Self::Queued,
            "R" => Self::Running,
            "H" => Self::Held,
            "W" => Self::Waiting,
            "T" => Self::Transit,
            "E" => Self::Exiting,
            "S" => Self::Suspended,
            "U" => Self::UserSuspended,
            "B" => Self::ArrayBegun,
            "M" => Self::Moved,
            "X" => Self::Expired,
            "F" => Self::Finished,
            _ => return None,
        };
        Some(state)
    }

    /// Whether the job still occupies the queue
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Finished | Self::Expired)
    }
}

/// Whether the job appeared in the listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPresence {
    Listed(QueueState),
    Absent,
}

/// Status of one job as extracted from a status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub presence: JobPresence,
    pub exit_status: Option<i32>,
    pub comment: Option<String>,
}

impl JobReport {
    /// Report for a job that no longer appears in the listing
    pub fn absent() -> Self {
        Self {
            presence: JobPresence::Absent,
            exit_status: None,
            comment: None,
        }
    }

    /// Whether the job has left the queue
    pub fn is_complete(&self) -> bool {
        match self.presence {
            JobPresence::Listed(state) => !state.is_active(),
            JobPresence::Absent => true,
        }
    }

    /// Resolves the report into a poll result
    ///
    /// Returns `None` for a completed job whose exit status is not known yet;
    /// the caller has to ask for it separately.
    pub fn outcome(&self) -> Option<PollResult> {
        if !self.is_complete() {
            return Some(PollResult::Running);
        }

        if let Some(code) = self.exit_status {
            return Some(interpret_exit_status(code));
        }

        // Jobs deleted before they started never get an exit status
        match &self.comment {
            Some(comment) if comment.to_ascii_lowercase().contains("deleted") => {
                Some(PollResult::Failed(FailureReason::Reported {
                    message: comment.clone(),
                }))
            }
            _ => None,
        }
    }
}

/// Errors raised while parsing a status report
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("status report is empty")]
    Empty,

    #[error("status report is not valid JSON: {0}")]
    Json(String),

    #[error("unrecognised job state '{0}'")]
    UnknownState(String),

    #[error("status report contains no job attributes")]
    Unrecognised,
}

/// Parses the output of a status query for `handle`
pub fn parse_status_report(handle: &JobHandle, text: &str) -> Result<JobReport, StatusParseError> {
    let text = text.trim();

    if text.is_empty() {
        return Err(StatusParseError::Empty);
    }

    if text.starts_with('{') {
        parse_json_report(handle, text)
    } else {
        parse_text_report(handle, text)
    }
}

fn parse_json_report(handle: &JobHandle, text: &str) -> Result<JobReport, StatusParseError> {
    let doc: QstatDocument =
        serde_json::from_str(text).map_err(|e| StatusParseError::Json(e.to_string()))?;

    let job = doc
        .jobs
        .iter()
        .find(|(id, _)| same_job(handle, id))
        .map(|(_, job)| job);

    let Some(job) = job else {
        return Ok(JobReport::absent());
    };

    let presence = match &job.job_state {
        Some(code) => JobPresence::Listed(
            QueueState::from_code(code)
                .ok_or_else(|| StatusParseError::UnknownState(code.clone()))?,
        ),
        None => JobPresence::Absent,
    };

    Ok(JobReport {
        presence,
        exit_status: job.exit_status,
        comment: job.comment.clone(),
    })
}

fn parse_text_report(handle: &JobHandle, text: &str) -> Result<JobReport, StatusParseError> {
    let mut saw_header = false;
    let mut in_block = false;
    let mut saw_attribute = false;

    let mut state: Option<String> = None;
    let mut exit_status: Option<i32> = None;
    let mut comment: Option<String> = None;

    for line in text.lines() {
        if let Some(id) = line.trim().strip_prefix("Job Id:") {
            saw_header = true;
            in_block = same_job(handle, id.trim());
            continue;
        }

        if saw_header && !in_block {
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            continue;
        };

        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "job_state" => {
                state = Some(value.to_string());
                saw_attribute = true;
            }
            "exit_status" => {
                exit_status = value.parse().ok();
                saw_attribute = true;
            }
            "comment" => {
                comment = Some(value.to_string());
                saw_attribute = true;
            }
            _ => {}
        }
    }

    if !saw_attribute {
        // A listing that only contains other jobs means ours has gone
        if saw_header {
            return Ok(JobReport::absent());
        }
        return Err(StatusParseError::Unrecognised);
    }

    let presence = match state {
        Some(code) if code.eq_ignore_ascii_case("absent") => JobPresence::Absent,
        Some(code) => JobPresence::Listed(
            QueueState::from_code(&code).ok_or(StatusParseError::UnknownState(code))?,
        ),
        None => JobPresence::Absent,
    };

    Ok(JobReport {
        presence,
        exit_status,
        comment,
    })
}

/// PBS may print the server suffix in full (`12345.gadi-pbs.nci.org.au`)
fn same_job(handle: &JobHandle, listed: &str) -> bool {
    let listed = listed.trim();
    if listed == handle.as_str() {
        return true;
    }

    listed.split('.').next() == Some(handle.sequence())
        && (listed.starts_with(handle.as_str()) || handle.as_str().starts_with(listed))
}

/// Maps a PBS exit status onto a poll result
///
/// - `0` is success
/// - negative values are batch-system failures (the job never ran properly)
/// - values above 256 mean the job was killed by signal `code - 256`
/// - anything else is the job script's own exit status
pub fn interpret_exit_status(code: i32) -> PollResult {
    match code {
        0 => PollResult::Succeeded,
        c if c < 0 => PollResult::Failed(FailureReason::Scheduler { code: c }),
        c if c > 256 => PollResult::Failed(FailureReason::Signal { signal: c - 256 }),
        c => PollResult::Failed(FailureReason::ExitStatus { code: c }),
    }
}

/// Whether a status command's stderr says the job is no longer listed
pub fn is_unknown_job_message(stderr: &str) -> bool {
    let lowered = stderr.to_ascii_lowercase();
    lowered.contains("unknown job id") || lowered.contains("job has finished")
}

/// Parses the output of a separate exit-status query
///
/// Accepts a bare integer or an `Exit_status = N` line.
pub fn parse_exit_status(text: &str) -> Option<i32> {
    let text = text.trim();

    if let Ok(code) = text.parse() {
        return Some(code);
    }

    text.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("exit_status") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> JobHandle {
        JobHandle::new("12345.gadi-pbs").unwrap()
    }

    fn json_for(state: &str, exit: Option<i32>) -> String {
        let exit = exit
            .map(|c| format!(", \"Exit_status\": {}", c))
            .unwrap_or_default();
        format!(
            r#"{{"pbs_server": "gadi-pbs", "Jobs": {{"12345.gadi-pbs": {{"job_state": "{}"{}}}}}}}"#,
            state, exit
        )
    }

    #[test]
    fn test_json_running_job() {
        let report = parse_status_report(&handle(), &json_for("R", None)).unwrap();
        assert_eq!(report.presence, JobPresence::Listed(QueueState::Running));
        assert!(!report.is_complete());
        assert_eq!(report.outcome(), Some(PollResult::Running));
    }

    #[test]
    fn test_json_queued_and_held_are_running() {
        for state in ["Q", "H", "W", "E", "S"] {
            let report = parse_status_report(&handle(), &json_for(state, None)).unwrap();
            assert_eq!(report.outcome(), Some(PollResult::Running), "state {}", state);
        }
    }

    #[test]
    fn test_json_finished_success() {
        let report = parse_status_report(&handle(), &json_for("F", Some(0))).unwrap();
        assert!(report.is_complete());
        assert_eq!(report.outcome(), Some(PollResult::Succeeded));
    }

    #[test]
    fn test_json_finished_failure() {
        let report = parse_status_report(&handle(), &json_for("F", Some(1))).unwrap();
        assert_eq!(
            report.outcome(),
            Some(PollResult::Failed(FailureReason::ExitStatus { code: 1 }))
        );
    }

    #[test]
    fn test_json_job_missing_is_absent() {
        let json = r#"{"pbs_server": "gadi-pbs", "Jobs": {"777.gadi-pbs": {"job_state": "R"}}}"#;
        let report = parse_status_report(&handle(), json).unwrap();
        assert_eq!(report, JobReport::absent());
        assert_eq!(report.outcome(), None);
    }

    #[test]
    fn test_json_full_server_suffix_matches() {
        let json = r#"{"Jobs": {"12345.gadi-pbs.nci.org.au": {"job_state": "Q"}}}"#;
        let report = parse_status_report(&handle(), json).unwrap();
        assert_eq!(report.presence, JobPresence::Listed(QueueState::Queued));
    }

    #[test]
    fn test_json_unknown_state() {
        let err = parse_status_report(&handle(), &json_for("Z", None)).unwrap_err();
        assert_eq!(err, StatusParseError::UnknownState("Z".to_string()));
    }

    #[test]
    fn test_json_malformed() {
        let err = parse_status_report(&handle(), "{\"Jobs\": ").unwrap_err();
        assert!(matches!(err, StatusParseError::Json(_)));
    }

    #[test]
    fn test_text_report() {
        let text = "Job Id: 12345.gadi-pbs\n    Job_Name = sync_ls8\n    job_state = F\n    comment = Job run at Mon and finished\n    Exit_status = 271\n";
        let report = parse_status_report(&handle(), text).unwrap();
        assert_eq!(report.presence, JobPresence::Listed(QueueState::Finished));
        assert_eq!(report.exit_status, Some(271));
        assert_eq!(
            report.outcome(),
            Some(PollResult::Failed(FailureReason::Signal { signal: 15 }))
        );
    }

    #[test]
    fn test_text_report_skips_other_jobs() {
        let text = "Job Id: 1.gadi-pbs\n    job_state = R\n\nJob Id: 12345.gadi-pbs\n    job_state = Q\n";
        let report = parse_status_report(&handle(), text).unwrap();
        assert_eq!(report.presence, JobPresence::Listed(QueueState::Queued));
    }

    #[test]
    fn test_text_report_only_other_jobs_is_absent() {
        let text = "Job Id: 1.gadi-pbs\n    job_state = R\n";
        let report = parse_status_report(&handle(), text).unwrap();
        assert_eq!(report, JobReport::absent());
    }

    #[test]
    fn test_line_delimited_absent_with_exit() {
        let report = parse_status_report(&handle(), "job_state=absent\nexit_status=0\n").unwrap();
        assert_eq!(report.presence, JobPresence::Absent);
        assert_eq!(report.outcome(), Some(PollResult::Succeeded));

        let report = parse_status_report(&handle(), "exit_status=1").unwrap();
        assert_eq!(
            report.outcome(),
            Some(PollResult::Failed(FailureReason::ExitStatus { code: 1 }))
        );
    }

    #[test]
    fn test_garbage_is_unrecognised() {
        let err = parse_status_report(&handle(), "%%garbage%%").unwrap_err();
        assert_eq!(err, StatusParseError::Unrecognised);
        assert_eq!(
            parse_status_report(&handle(), "  \n"),
            Err(StatusParseError::Empty)
        );
    }

    #[test]
    fn test_deleted_job_without_exit_status() {
        let text = "job_state = F\ncomment = Job deleted by user before it ran";
        let report = parse_status_report(&handle(), text).unwrap();
        assert!(matches!(
            report.outcome(),
            Some(PollResult::Failed(FailureReason::Reported { .. }))
        ));
    }

    #[test]
    fn test_interpret_exit_status() {
        assert_eq!(interpret_exit_status(0), PollResult::Succeeded);
        assert_eq!(
            interpret_exit_status(2),
            PollResult::Failed(FailureReason::ExitStatus { code: 2 })
        );
        assert_eq!(
            interpret_exit_status(256),
            PollResult::Failed(FailureReason::ExitStatus { code: 256 })
        );
        assert_eq!(
            interpret_exit_status(265),
            PollResult::Failed(FailureReason::Signal { signal: 9 })
        );
        assert_eq!(
            interpret_exit_status(-3),
            PollResult::Failed(FailureReason::Scheduler { code: -3 })
        );
    }

    #[test]
    fn test_unknown_job_messages() {
        assert!(is_unknown_job_message(
            "qstat: Unknown Job Id 12345.gadi-pbs\n"
        ));
        assert!(is_unknown_job_message(
            "qstat: 12345.gadi-pbs Job has finished, use -x or -H to obtain historical job information"
        ));
        assert!(!is_unknown_job_message("ssh: connect to host gadi port 22"));
    }

    #[test]
    fn test_parse_exit_status() {
        assert_eq!(parse_exit_status("0\n"), Some(0));
        assert_eq!(parse_exit_status("  -1 "), Some(-1));
        assert_eq!(parse_exit_status("job_state = F\nExit_status = 3"), Some(3));
        assert_eq!(parse_exit_status("nothing here"), None);
    }
}
