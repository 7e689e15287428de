//! Test-only scripted collaborators for driving the controller loop.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use serde_json::Value;

use crate::core::protocol::Endpoint;
use crate::core::types::{ExecutionResult, Program};
use crate::io::executor::Executor;
use crate::io::self_destruct::KillSwitch;
use crate::io::transport::{Reply, Transport, TransportError};

/// Transport that replays queued replies and records every request.
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Result<Reply, TransportError>>>,
    requests: RefCell<Vec<(Endpoint, Option<Value>)>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Result<Reply, TransportError>>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// A failure standing in for an unreachable controller.
    pub fn unavailable() -> TransportError {
        TransportError::Status {
            url: "http://scripted".to_string(),
            status: 503,
        }
    }

    pub fn requests(&self) -> Vec<(Endpoint, Option<Value>)> {
        self.requests.borrow().clone()
    }

    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.requests.borrow().iter().map(|(e, _)| *e).collect()
    }

    pub fn count(&self, endpoint: Endpoint) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .count()
    }
}

impl Transport for ScriptedTransport {
    fn request(
        &self,
        endpoint: Endpoint,
        payload: Option<&Value>,
    ) -> Result<Reply, TransportError> {
        self.requests
            .borrow_mut()
            .push((endpoint, payload.cloned()));
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted reply left for {}", endpoint.path()))
    }
}

/// Executor that replays queued results and records the programs it ran.
pub struct ScriptedExecutor {
    results: RefCell<VecDeque<ExecutionResult>>,
    programs: RefCell<Vec<Program>>,
}

impl ScriptedExecutor {
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: RefCell::new(results.into()),
            programs: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.programs.borrow().len()
    }

    pub fn programs(&self) -> Vec<Program> {
        self.programs.borrow().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn run(&self, program: &Program) -> ExecutionResult {
        self.programs.borrow_mut().push(program.clone());
        self.results
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted result left for {program:?}"))
    }
}

/// Kill switch that counts triggers instead of exiting.
#[derive(Default)]
pub struct RecordingKillSwitch {
    triggered: Cell<u32>,
}

impl RecordingKillSwitch {
    pub fn triggered(&self) -> u32 {
        self.triggered.get()
    }
}

impl KillSwitch for RecordingKillSwitch {
    fn trigger(&self) {
        self.triggered.set(self.triggered.get() + 1);
    }
}

/// Shorthand for a failing execution with captured output.
pub fn failed(exit_status: i32, stdout: &str, stderr: &str) -> ExecutionResult {
    ExecutionResult::exited(
        exit_status,
        stdout.as_bytes().to_vec(),
        stderr.as_bytes().to_vec(),
    )
}

/// Shorthand for a successful execution.
pub fn passed(stdout: &str) -> ExecutionResult {
    ExecutionResult::exited(0, stdout.as_bytes().to_vec(), Vec::new())
}
