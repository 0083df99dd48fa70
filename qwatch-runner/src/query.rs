//! Status-query command templates
//!
//! Templates use a `{job_id}` placeholder which is replaced by the job
//! handle verbatim. Handles are validated on construction, so substitution
//! cannot alter the shape of the command line.

use qwatch_core::domain::job::JobHandle;

/// Placeholder replaced by the job handle
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Default status query: full attributes, including finished jobs, as JSON
pub const DEFAULT_STATUS_COMMAND: &str = "qstat -xf -F json {job_id}";

/// Commands issued against the batch system for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCommands {
    /// Lists the job's current state
    pub status: String,
    /// Reports the exit status of a job that has left the listing
    pub exit_status: Option<String>,
}

impl QueryCommands {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            exit_status: None,
        }
    }

    pub fn with_exit_status(mut self, command: impl Into<String>) -> Self {
        self.exit_status = Some(command.into());
        self
    }

    /// Status command for `handle`
    pub fn status_command(&self, handle: &JobHandle) -> String {
        render(&self.status, handle)
    }

    /// Exit-status command for `handle`, if one is configured
    pub fn exit_status_command(&self, handle: &JobHandle) -> Option<String> {
        self.exit_status.as_deref().map(|t| render(t, handle))
    }

    /// Checks every template references the job
    pub fn validate(&self) -> Result<(), String> {
        if !self.status.contains(JOB_ID_PLACEHOLDER) {
            return Err(format!(
                "status command '{}' must contain {}",
                self.status, JOB_ID_PLACEHOLDER
            ));
        }

        if let Some(exit) = &self.exit_status {
            if !exit.contains(JOB_ID_PLACEHOLDER) {
                return Err(format!(
                    "exit-status command '{}' must contain {}",
                    exit, JOB_ID_PLACEHOLDER
                ));
            }
        }

        Ok(())
    }
}

impl Default for QueryCommands {
    fn default() -> Self {
        Self::new(DEFAULT_STATUS_COMMAND)
    }
}

fn render(template: &str, handle: &JobHandle) -> String {
    template.replace(JOB_ID_PLACEHOLDER, handle.as_str())
}
