//! Scripted channel for poller tests

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use qwatch_client::{ChannelError, ExecCapture, RemoteQueryChannel};
use std::collections::VecDeque;
use std::sync::Mutex;

enum Step {
    Reply(ExecCapture),
    Unreachable,
}

/// Replays canned responses in order, recording the commands it receives
pub struct ScriptedChannel {
    steps: Mutex<VecDeque<Step>>,
    repeat: Option<ExecCapture>,
    commands: Mutex<Vec<String>>,
}

impl ScriptedChannel {
    pub fn new(replies: Vec<ExecCapture>) -> Self {
        Self {
            steps: Mutex::new(replies.into_iter().map(Step::Reply).collect()),
            repeat: None,
            commands: Mutex::new(Vec::new()),
        }
    }

    /// Answers every query with the same reply
    pub fn repeating(reply: ExecCapture) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    pub fn then(self, reply: ExecCapture) -> Self {
        self.steps.lock().unwrap().push_back(Step::Reply(reply));
        self
    }

    pub fn then_unreachable(self) -> Self {
        self.steps.lock().unwrap().push_back(Step::Unreachable);
        self
    }

    pub fn calls(&self) -> usize {
        self.commands.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteQueryChannel for ScriptedChannel {
    async fn execute(&self, command: &str) -> Result<ExecCapture, ChannelError> {
        self.commands.lock().unwrap().push(command.to_string());

        let step = self.steps.lock().unwrap().pop_front();
        match step {
            Some(Step::Reply(reply)) => Ok(reply),
            Some(Step::Unreachable) => Err(ChannelError::Unreachable {
                host: "gadi".to_string(),
                detail: "Connection timed out".to_string(),
            }),
            None => match &self.repeat {
                Some(reply) => Ok(reply.clone()),
                None => Err(ChannelError::Unreachable {
                    host: "gadi".to_string(),
                    detail: "script exhausted".to_string(),
                }),
            },
        }
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// `qstat -F json` reply listing `id` in `state`
pub fn listed(id: &str, state: &str, exit: Option<i32>) -> ExecCapture {
    let exit = exit
        .map(|c| format!(", \"Exit_status\": {}", c))
        .unwrap_or_default();
    ExecCapture::ok(format!(
        r#"{{"pbs_server": "gadi-pbs", "Jobs": {{"{}": {{"job_state": "{}"{}}}}}}}"#,
        id, state, exit
    ))
}

/// Line-delimited reply for a job that has left the queue
pub fn absent(exit: Option<i32>) -> ExecCapture {
    match exit {
        Some(code) => ExecCapture::ok(format!("job_state=absent\nexit_status={}\n", code)),
        None => ExecCapture::ok("job_state=absent\n"),
    }
}

/// qstat's reply for a job it no longer knows about
pub fn unknown_job(id: &str) -> ExecCapture {
    ExecCapture {
        stdout: Vec::new(),
        stderr: format!("qstat: Unknown Job Id {}\n", id).into_bytes(),
        exit_code: 153,
    }
}

/// Base64-wrapped reply
pub fn b64(text: &str) -> ExecCapture {
    ExecCapture::ok(STANDARD.encode(text))
}
