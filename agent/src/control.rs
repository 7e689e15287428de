//! The execute/evaluate/repair loop.
//!
//! One run walks ping → generate → (execute → fix)* and stops on the first
//! terminal condition. Every failure is local to its phase: the loop never
//! retries a request, it only retries programs.

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};

use crate::core::budget::AttemptBudget;
use crate::core::protocol::{
    Endpoint, FixRequest, FixVerdict, GenRequest, decode_fix, decode_program,
};
use crate::core::report::diagnostic_report;
use crate::core::types::{AgentOutcome, Program, RunStats};
use crate::io::config::AgentConfig;
use crate::io::executor::Executor;
use crate::io::self_destruct::KillSwitch;
use crate::io::transport::Transport;

/// Parameters for one run of the loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Task description sent with `/gen` and `/fix`.
    pub master_prompt: String,
    /// Repairs allowed after the first execution.
    pub max_retries: u32,
}

impl From<&AgentConfig> for LoopConfig {
    fn from(cfg: &AgentConfig) -> Self {
        Self {
            master_prompt: cfg.master_prompt.clone(),
            max_retries: cfg.max_retries,
        }
    }
}

/// Run the agent until a program succeeds, the server resolves or abandons
/// the task, the budget is spent, or the terminate signal arrives.
///
/// Returns `Err` only when a request body cannot be encoded.
#[instrument(skip_all, fields(max_retries = config.max_retries))]
pub fn run_agent<T: Transport, E: Executor, K: KillSwitch>(
    transport: &T,
    executor: &E,
    kill_switch: &K,
    config: &LoopConfig,
) -> Result<AgentOutcome> {
    match transport.request(Endpoint::Ping, None) {
        Ok(reply) if reply.control_signal => {
            kill_switch.trigger();
            return Ok(AgentOutcome::Destroyed);
        }
        Ok(_) => info!("server ping: OK"),
        Err(err) => {
            error!(err = %err, "could not reach server");
            return Ok(AgentOutcome::Unreachable);
        }
    }

    let Some(program) = fetch_program(transport, &config.master_prompt)? else {
        error!("no code received or failed to parse");
        return Ok(AgentOutcome::NoProgram);
    };

    repair_loop(transport, executor, config, program)
}

fn fetch_program<T: Transport>(transport: &T, master_prompt: &str) -> Result<Option<Program>> {
    let body = serde_json::to_value(GenRequest { master_prompt }).context("encode /gen body")?;
    match transport.request(Endpoint::Gen, Some(&body)) {
        Ok(reply) => Ok(decode_program(&reply.body)),
        Err(err) => {
            warn!(err = %err, "failed to generate initial payload");
            Ok(None)
        }
    }
}

fn repair_loop<T: Transport, E: Executor>(
    transport: &T,
    executor: &E,
    config: &LoopConfig,
    mut program: Program,
) -> Result<AgentOutcome> {
    let mut budget = AttemptBudget::new(config.max_retries);
    let mut stats = RunStats::default();

    loop {
        info!(
            attempt = budget.attempt() + 1,
            of = budget.max_executions(),
            "starting attempt"
        );
        let result = executor.run(&program);
        stats.executions += 1;

        if result.succeeded() {
            info!(output = %result.stdout_lossy(), "payload executed successfully");
            return Ok(AgentOutcome::Succeeded(stats));
        }
        warn!(exit_code = result.exit_status, "payload failed");

        if !budget.advance() {
            warn!("max retries reached, giving up");
            return Ok(AgentOutcome::GaveUp(stats));
        }

        info!("requesting fix from server");
        let report = diagnostic_report(&result);
        let body = serde_json::to_value(FixRequest {
            code: program.as_str(),
            error: &report,
            master_prompt: &config.master_prompt,
        })
        .context("encode /fix body")?;
        stats.fix_requests += 1;

        let reply = match transport.request(Endpoint::Fix, Some(&body)) {
            Ok(reply) => reply,
            Err(err) => {
                error!(err = %err, "failed to request fix");
                return Ok(AgentOutcome::RepairFailed(stats));
            }
        };

        match decode_fix(&reply.body) {
            FixVerdict::Resolved => {
                info!("server signaled no error, stopping");
                return Ok(AgentOutcome::Resolved(stats));
            }
            FixVerdict::Replace(next) => program = next,
            FixVerdict::NoFix => {
                warn!("server returned no fix");
                return Ok(AgentOutcome::NoFix(stats));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ExecutionResult;
    use crate::io::transport::Reply;
    use crate::test_support::{RecordingKillSwitch, ScriptedExecutor, ScriptedTransport};

    fn config() -> LoopConfig {
        LoopConfig {
            master_prompt: "stress test".to_string(),
            max_retries: 4,
        }
    }

    #[test]
    fn terminate_on_ping_fires_kill_switch_before_generation() {
        let transport = ScriptedTransport::new(vec![Ok(Reply::terminate())]);
        let executor = ScriptedExecutor::new(Vec::new());
        let kill_switch = RecordingKillSwitch::default();

        let outcome = run_agent(&transport, &executor, &kill_switch, &config()).expect("run");

        assert_eq!(outcome, AgentOutcome::Destroyed);
        assert_eq!(kill_switch.triggered(), 1);
        assert_eq!(transport.endpoints(), vec![Endpoint::Ping]);
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    fn ping_failure_is_unreachable() {
        let transport = ScriptedTransport::new(vec![Err(ScriptedTransport::unavailable())]);
        let executor = ScriptedExecutor::new(Vec::new());
        let kill_switch = RecordingKillSwitch::default();

        let outcome = run_agent(&transport, &executor, &kill_switch, &config()).expect("run");

        assert_eq!(outcome, AgentOutcome::Unreachable);
        assert_eq!(transport.endpoints(), vec![Endpoint::Ping]);
        assert_eq!(kill_switch.triggered(), 0);
    }

    #[test]
    fn gen_failure_is_no_program() {
        let transport = ScriptedTransport::new(vec![
            Ok(Reply::ok("")),
            Err(ScriptedTransport::unavailable()),
        ]);
        let executor = ScriptedExecutor::new(Vec::new());

        let outcome =
            run_agent(&transport, &executor, &RecordingKillSwitch::default(), &config())
                .expect("run");

        assert_eq!(outcome, AgentOutcome::NoProgram);
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    fn gen_request_carries_master_prompt() {
        let transport = ScriptedTransport::new(vec![
            Ok(Reply::ok("")),
            Ok(Reply::ok(r#"{"code":"print(1)"}"#)),
        ]);
        let executor =
            ScriptedExecutor::new(vec![ExecutionResult::exited(0, Vec::new(), Vec::new())]);

        run_agent(&transport, &executor, &RecordingKillSwitch::default(), &config())
            .expect("run");

        let requests = transport.requests();
        assert_eq!(requests[0].1, None);
        assert_eq!(
            requests[1].1,
            Some(serde_json::json!({ "master_prompt": "stress test" }))
        );
    }

    #[test]
    fn fix_transport_failure_stops_loop() {
        let transport = ScriptedTransport::new(vec![
            Ok(Reply::ok("")),
            Ok(Reply::ok(r#"{"code":"exit 1"}"#)),
            Err(ScriptedTransport::unavailable()),
        ]);
        let executor =
            ScriptedExecutor::new(vec![ExecutionResult::exited(1, Vec::new(), Vec::new())]);

        let outcome =
            run_agent(&transport, &executor, &RecordingKillSwitch::default(), &config())
                .expect("run");

        assert_eq!(
            outcome,
            AgentOutcome::RepairFailed(RunStats {
                executions: 1,
                fix_requests: 1
            })
        );
    }

    #[test]
    fn fix_without_code_stops_loop() {
        let transport = ScriptedTransport::new(vec![
            Ok(Reply::ok("")),
            Ok(Reply::ok(r#"{"code":"exit 1"}"#)),
            Ok(Reply::ok(r#"{"status":"retry"}"#)),
        ]);
        let executor =
            ScriptedExecutor::new(vec![ExecutionResult::exited(1, Vec::new(), Vec::new())]);

        let outcome =
            run_agent(&transport, &executor, &RecordingKillSwitch::default(), &config())
                .expect("run");

        assert!(matches!(outcome, AgentOutcome::NoFix(stats) if stats.executions == 1));
    }

    #[test]
    fn launch_failure_counts_against_budget() {
        let transport = ScriptedTransport::new(vec![
            Ok(Reply::ok("")),
            Ok(Reply::ok(r#"{"code":"a"}"#)),
            Ok(Reply::ok(r#"{"code":"b"}"#)),
        ]);
        let executor = ScriptedExecutor::new(vec![
            ExecutionResult::launch_failed(),
            ExecutionResult::launch_failed(),
        ]);
        let config = LoopConfig {
            max_retries: 1,
            ..config()
        };

        let outcome = run_agent(&transport, &executor, &RecordingKillSwitch::default(), &config)
            .expect("run");

        assert_eq!(
            outcome,
            AgentOutcome::GaveUp(RunStats {
                executions: 2,
                fix_requests: 1
            })
        );
        let fix_error = transport.requests()[2].1.clone().expect("fix body")["error"]
            .as_str()
            .expect("error string")
            .to_string();
        assert_eq!(fix_error, "Exit Code: -1\nStderr: \nStdout: ");
    }
}
