//! Job poller
//!
//! Waits for one remote batch job to leave the queue. Each attempt issues a
//! status query over a borrowed channel, decodes the response and folds the
//! result into the poller's state machine. Transport and decode problems are
//! retried until the timeout; only terminal states are reported.

use qwatch_client::{ChannelError, RemoteQueryChannel};
use qwatch_core::domain::job::JobHandle;
use qwatch_core::domain::poll::{FailureReason, PollResult, PollerState, WaitOutcome};
use qwatch_core::encoding::maybe_decode_base64;
use qwatch_core::status::{
    JobReport, interpret_exit_status, is_unknown_job_message, parse_exit_status,
    parse_status_report,
};
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::config::PollerConfig;

const NO_EXIT_STATUS: &str = "job left the queue without an exit status";

/// Poller for a single remote job
///
/// Created per job and discarded after it resolves. The timeout is measured
/// from creation.
pub struct JobPoller {
    handle: JobHandle,
    config: PollerConfig,
    state: PollerState,
    polls: u32,
    created: Instant,
    started_at: chrono::DateTime<chrono::Utc>,
}

impl JobPoller {
    /// Creates a new poller in the `Pending` state
    pub fn new(handle: JobHandle, config: PollerConfig) -> Self {
        Self {
            handle,
            config,
            state: PollerState::Pending,
            polls: 0,
            created: Instant::now(),
            started_at: chrono::Utc::now(),
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn state(&self) -> &PollerState {
        &self.state
    }

    /// Number of status queries issued so far
    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Wall time since creation
    pub fn elapsed(&self) -> Duration {
        self.created.elapsed()
    }

    /// Time left before the poller gives up
    pub fn remaining(&self) -> Duration {
        self.config.timeout.saturating_sub(self.elapsed())
    }

    /// Performs a single poll attempt
    ///
    /// A terminal poller returns its final result without querying again.
    pub async fn poke(&mut self, channel: &dyn RemoteQueryChannel) -> PollResult {
        if let Some(result) = self.state.terminal_result() {
            debug!("Job {} already resolved, not polling", self.handle);
            return result;
        }

        self.polls += 1;
        debug!(
            "Polling job {} (attempt {}) via {}",
            self.handle,
            self.polls,
            channel.describe()
        );

        let result = self.query(channel).await;

        let next = self.state.clone().advance(&result);
        if next != self.state {
            info!("Job {}: {} -> {}", self.handle, self.state, next);
        }
        self.state = next;

        result
    }

    /// Polls until the job resolves or the timeout elapses
    ///
    /// Sleeps between attempts. Dropping the returned future abandons the
    /// poller; an in-flight query is not interrupted on the remote side.
    pub async fn wait(&mut self, channel: &dyn RemoteQueryChannel) -> WaitOutcome {
        info!(
            "Waiting for job {} (interval: {:?}, timeout: {:?})",
            self.handle, self.config.poll_interval, self.config.timeout
        );

        loop {
            if self.state.is_terminal() {
                return self.outcome();
            }

            let elapsed = self.elapsed();
            if elapsed >= self.config.timeout {
                self.state = self.state.clone().time_out(elapsed);
                warn!(
                    "Gave up waiting for job {} after {:?} ({} polls)",
                    self.handle, elapsed, self.polls
                );
                return self.outcome();
            }

            let result = self.poke(channel).await;
            if result.is_terminal() {
                return self.outcome();
            }

            let pause = self.config.poll_interval.min(self.remaining());
            debug!("Job {} not done ({}), next poll in {:?}", self.handle, result, pause);
            time::sleep(pause).await;
        }
    }

    /// Snapshot of the operation so far
    pub fn outcome(&self) -> WaitOutcome {
        WaitOutcome {
            handle: self.handle.clone(),
            state: self.state.clone(),
            polls: self.polls,
            elapsed: self.elapsed(),
            started_at: self.started_at,
            finished_at: chrono::Utc::now(),
        }
    }

    /// Issues one status query and interprets the response
    async fn query(&self, channel: &dyn RemoteQueryChannel) -> PollResult {
        let command = self.config.commands.status_command(&self.handle);

        let capture = match channel.execute(&command).await {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Status query for job {} failed: {}", self.handle, e);
                return PollResult::Unknown(e.to_string());
            }
        };

        let report = match capture.into_success() {
            Ok(capture) => match self.decode_report(&capture.stdout) {
                Ok(report) => report,
                Err(unknown) => return unknown,
            },
            Err(ChannelError::CommandFailed { stderr, .. }) if is_unknown_job_message(&stderr) => {
                debug!("Job {} no longer listed: {}", self.handle, stderr);
                JobReport::absent()
            }
            Err(e) => {
                warn!("Status query for job {} failed: {}", self.handle, e);
                return PollResult::Unknown(e.to_string());
            }
        };

        match report.outcome() {
            Some(result) => result,
            None => self.query_exit_status(channel).await,
        }
    }

    fn decode_report(&self, stdout: &[u8]) -> Result<JobReport, PollResult> {
        let text = maybe_decode_base64(stdout, self.config.encoding).map_err(|e| {
            warn!("Could not decode status of job {}: {}", self.handle, e);
            PollResult::Unknown(e.to_string())
        })?;

        parse_status_report(&self.handle, &text).map_err(|e| {
            warn!("Could not parse status of job {}: {}", self.handle, e);
            PollResult::Unknown(format!("{}: {}", e, truncate(&text, 200)))
        })
    }

    /// Asks for the exit status of a job that left the listing without one
    ///
    /// Without an exit-status command there is nothing more to learn, so the
    /// job resolves as failed. A failed exit-status query is retried.
    async fn query_exit_status(&self, channel: &dyn RemoteQueryChannel) -> PollResult {
        let Some(command) = self.config.commands.exit_status_command(&self.handle) else {
            warn!("Job {} left the queue without an exit status", self.handle);
            return PollResult::Failed(FailureReason::Reported {
                message: NO_EXIT_STATUS.to_string(),
            });
        };

        let capture = match channel.execute(&command).await.and_then(|c| c.into_success()) {
            Ok(capture) => capture,
            Err(e) => {
                warn!("Exit-status query for job {} failed: {}", self.handle, e);
                return PollResult::Unknown(e.to_string());
            }
        };

        let text = match maybe_decode_base64(&capture.stdout, self.config.encoding) {
            Ok(text) => text,
            Err(e) => {
                warn!("Could not decode exit status of job {}: {}", self.handle, e);
                return PollResult::Unknown(e.to_string());
            }
        };

        match parse_exit_status(&text) {
            Some(code) => interpret_exit_status(code),
            None => PollResult::Unknown(format!(
                "unrecognised exit status: {}",
                truncate(&text, 200)
            )),
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    let text = text.trim();
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryCommands;
    use crate::scheduler::testing::{ScriptedChannel, absent, b64, listed, unknown_job};
    use qwatch_client::ExecCapture;
    use qwatch_core::encoding::ResponseEncoding;

    fn handle(id: &str) -> JobHandle {
        JobHandle::new(id).unwrap()
    }

    fn config(interval: u64, timeout: u64) -> PollerConfig {
        PollerConfig::new(Duration::from_secs(interval), Duration::from_secs(timeout))
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_running_succeeded() {
        let channel = ScriptedChannel::new(vec![
            listed("12345.gadi-pbs", "R", None),
            listed("12345.gadi-pbs", "R", None),
            listed("12345.gadi-pbs", "F", Some(0)),
        ]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 3));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.polls, 3);
        assert_eq!(channel.calls(), 3);
        assert_eq!(outcome.elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_running_times_out() {
        let channel = ScriptedChannel::repeating(listed("99999.gadi-pbs", "R", None));

        let mut poller = JobPoller::new(handle("99999.gadi-pbs"), config(1, 5));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.timed_out());
        assert!(!outcome.succeeded() && !outcome.failed());
        assert_eq!(outcome.elapsed, Duration::from_secs(5));
        assert_eq!(outcome.polls, 5);
        assert_eq!(
            outcome.state,
            PollerState::TimedOut {
                waited: Duration::from_secs(5)
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_queued_never_resolves_early() {
        let channel = ScriptedChannel::repeating(listed("42.gadi-pbs", "Q", None));

        let mut poller = JobPoller::new(handle("42.gadi-pbs"), config(7, 60));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.timed_out());
        assert!(outcome.elapsed >= Duration::from_secs(60));
        // Polls at 0, 7, ..., 56; the final sleep is clamped to the deadline
        assert_eq!(outcome.polls, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_nth_poll() {
        for n in 1..=6usize {
            let mut script = vec![listed("7.gadi-pbs", "Q", None); n - 1];
            script.push(absent(Some(0)));
            let channel = ScriptedChannel::new(script);

            let mut poller = JobPoller::new(handle("7.gadi-pbs"), config(60, 86_400));
            let outcome = poller.wait(&channel).await;

            assert!(outcome.succeeded(), "n = {}", n);
            assert_eq!(outcome.polls as usize, n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_with_exit_one_fails() {
        let channel = ScriptedChannel::new(vec![absent(Some(1))]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 3));
        let outcome = poller.wait(&channel).await;

        assert_eq!(
            outcome.state,
            PollerState::Failed {
                reason: FailureReason::ExitStatus { code: 1 }
            }
        );
        assert_eq!(outcome.polls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_response_is_retried() {
        let channel = ScriptedChannel::new(vec![
            ExecCapture::ok("%%not-base64%%"),
            b64(&absent_text(0)),
        ]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 10));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strict_base64_decode_error_is_retried() {
        let channel = ScriptedChannel::new(vec![
            ExecCapture::ok("%%not-base64%%"),
            b64(&absent_text(0)),
        ]);

        let config = config(1, 10).with_encoding(ResponseEncoding::Base64);
        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config);

        let first = poller.poke(&channel).await;
        assert!(matches!(first, PollResult::Unknown(_)));
        assert_eq!(poller.state(), &PollerState::Pending);

        let outcome = poller.wait(&channel).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.polls, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_channel_errors_are_retried() {
        let channel = ScriptedChannel::new(vec![])
            .then_unreachable()
            .then_unreachable()
            .then(listed("12345.gadi-pbs", "R", None))
            .then(listed("12345.gadi-pbs", "F", Some(0)));

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 100));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.succeeded());
        assert_eq!(outcome.polls, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_job_stderr_means_absent() {
        let channel = ScriptedChannel::new(vec![unknown_job("12345.gadi-pbs")])
            .then(ExecCapture::ok("0\n"));

        let commands = QueryCommands::default().with_exit_status("pbs-exit-status {job_id}");
        let config = config(1, 10).with_commands(commands);
        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config);

        let result = poller.poke(&channel).await;
        assert_eq!(result, PollResult::Succeeded);
        assert_eq!(
            channel.commands(),
            vec![
                "qstat -xf -F json 12345.gadi-pbs".to_string(),
                "pbs-exit-status 12345.gadi-pbs".to_string(),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_without_exit_query_fails() {
        let channel = ScriptedChannel::new(vec![unknown_job("12345.gadi-pbs")]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 10));
        let result = poller.poke(&channel).await;

        assert_eq!(
            result,
            PollResult::Failed(FailureReason::Reported {
                message: NO_EXIT_STATUS.to_string()
            })
        );
        assert!(poller.state().is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_without_exit_status_resolves_immediately() {
        let channel = ScriptedChannel::repeating(ExecCapture::ok(
            r#"{"Jobs": {"5.gadi-pbs": {"job_state": "F"}}}"#,
        ));

        let mut poller = JobPoller::new(handle("5.gadi-pbs"), config(1, 3));
        let outcome = poller.wait(&channel).await;

        assert!(outcome.failed());
        assert!(!outcome.timed_out());
        assert_eq!(outcome.polls, 1);
        assert_eq!(channel.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_exit_status_query_is_retried() {
        let channel = ScriptedChannel::new(vec![listed("5.gadi-pbs", "F", None)])
            .then_unreachable()
            .then(listed("5.gadi-pbs", "F", None))
            .then(ExecCapture::ok("Exit_status = 0\n"));

        let commands = QueryCommands::default().with_exit_status("pbs-exit-status {job_id}");
        let mut poller = JobPoller::new(handle("5.gadi-pbs"), config(1, 10).with_commands(commands));

        let first = poller.poke(&channel).await;
        assert!(matches!(first, PollResult::Unknown(_)));
        assert!(!poller.state().is_terminal());

        let outcome = poller.wait(&channel).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.polls, 2);
        assert_eq!(channel.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_until_timeout() {
        let channel = ScriptedChannel::new(vec![]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 5));
        let outcome = poller.wait(&channel).await;

        assert_eq!(
            outcome.state,
            PollerState::TimedOut {
                waited: Duration::from_secs(5)
            }
        );
        assert_eq!(outcome.polls, 5);
        assert_eq!(channel.calls(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_command_failures_are_unknown() {
        let channel = ScriptedChannel::new(vec![ExecCapture {
            stdout: Vec::new(),
            stderr: b"qstat: cannot connect to server gadi-pbs (errno=15010)".to_vec(),
            exit_code: 2,
        }]);

        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config(1, 10));
        let result = poller.poke(&channel).await;

        assert!(matches!(result, PollResult::Unknown(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_poller_does_not_requery() {
        let channel = ScriptedChannel::new(vec![listed("1.gadi-pbs", "F", Some(271))]);

        let mut poller = JobPoller::new(handle("1.gadi-pbs"), config(1, 10));
        let first = poller.poke(&channel).await;
        let second = poller.poke(&channel).await;
        let outcome = poller.wait(&channel).await;

        assert_eq!(
            first,
            PollResult::Failed(FailureReason::Signal { signal: 15 })
        );
        assert_eq!(second, first);
        assert!(outcome.failed());
        assert_eq!(channel.calls(), 1);
        assert_eq!(poller.polls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transitions() {
        let channel = ScriptedChannel::new(vec![
            listed("1.gadi-pbs", "Q", None),
            listed("1.gadi-pbs", "F", Some(0)),
        ]);

        let mut poller = JobPoller::new(handle("1.gadi-pbs"), config(1, 10));
        assert_eq!(poller.state(), &PollerState::Pending);

        poller.poke(&channel).await;
        assert_eq!(poller.state(), &PollerState::Running);

        poller.poke(&channel).await;
        assert_eq!(poller.state(), &PollerState::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_text_report() {
        let channel = ScriptedChannel::new(vec![ExecCapture::ok(
            "Job Id: 12345.gadi-pbs\n    job_state = F\n    Exit_status = 0\n",
        )]);

        let config = config(1, 10).with_encoding(ResponseEncoding::Plain);
        let mut poller = JobPoller::new(handle("12345.gadi-pbs"), config);

        assert_eq!(poller.poke(&channel).await, PollResult::Succeeded);
    }

    fn absent_text(code: i32) -> String {
        format!("job_state=absent\nexit_status={}\n", code)
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("  short  ", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc");
    }
}
