//! Tests against a local mock controller over real HTTP.
//!
//! A `tiny_http` server answers a fixed script of responses and records what
//! the agent sent, so these cover the transport, the executor and the
//! self-destruct path without a real controller.

use std::fs;
use std::io::Read;
use std::process::Command;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use reflex_agent::control::{LoopConfig, run_agent};
use reflex_agent::core::protocol::Endpoint;
use reflex_agent::core::types::{AgentOutcome, RunStats};
use reflex_agent::exit_codes;
use reflex_agent::io::config::ExecutorConfig;
use reflex_agent::io::executor::InterpreterExecutor;
use reflex_agent::io::transport::{HttpTransport, Transport, TransportError};
use reflex_agent::test_support::RecordingKillSwitch;
use tiny_http::{Response, Server};

#[derive(Debug)]
struct Recorded {
    post: bool,
    url: String,
    content_type: Option<String>,
    body: String,
}

struct MockController {
    base_url: String,
    handle: JoinHandle<Vec<Recorded>>,
}

impl MockController {
    /// Serve `script` in order, one response per request, then stop.
    fn start(script: Vec<(u16, &'static str)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("bind mock controller");
        let addr = server.server_addr().to_ip().expect("ip listener");
        let handle = thread::spawn(move || {
            let mut recorded = Vec::new();
            for (status, body) in script {
                let mut request = server.recv().expect("receive request");
                let mut sent = String::new();
                request
                    .as_reader()
                    .read_to_string(&mut sent)
                    .expect("read request body");
                let content_type = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Content-Type"))
                    .map(|h| h.value.as_str().to_string());
                recorded.push(Recorded {
                    post: matches!(request.method(), tiny_http::Method::Post),
                    url: request.url().to_string(),
                    content_type,
                    body: sent,
                });
                // The agent may exit right after reading a 418, closing the socket early.
                let _ = request.respond(Response::from_string(body).with_status_code(status));
            }
            recorded
        });
        Self {
            base_url: format!("http://{addr}"),
            handle,
        }
    }

    fn transport(&self) -> HttpTransport {
        HttpTransport::new(
            &self.base_url,
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
    }

    fn finish(self) -> Vec<Recorded> {
        self.handle.join().expect("mock controller thread")
    }
}

fn sh_executor(workdir: &std::path::Path) -> InterpreterExecutor {
    let config = ExecutorConfig {
        interpreter: "sh".to_string(),
        workdir: workdir.to_path_buf(),
        ..ExecutorConfig::default()
    };
    InterpreterExecutor::new(&config, Some(Duration::from_secs(30)))
}

#[test]
fn ping_418_sets_control_signal() {
    let controller = MockController::start(vec![(418, "I'm a teapot")]);

    let reply = controller
        .transport()
        .request(Endpoint::Ping, None)
        .expect("reply");

    assert!(reply.control_signal);
    assert_eq!(reply.status, 418);
    let recorded = controller.finish();
    assert!(!recorded[0].post);
    assert_eq!(recorded[0].url, "/ping");
}

#[test]
fn teapot_on_other_endpoints_is_not_a_signal() {
    let controller = MockController::start(vec![(418, "")]);
    let body = serde_json::json!({ "master_prompt": "p" });

    let err = controller
        .transport()
        .request(Endpoint::Gen, Some(&body))
        .unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 418, .. }), "{err}");
    controller.finish();
}

#[test]
fn post_sends_json_and_returns_body() {
    let controller = MockController::start(vec![(200, r#"{"code":"print(1)"}"#)]);
    let body = serde_json::json!({ "master_prompt": "stress" });

    let reply = controller
        .transport()
        .request(Endpoint::Gen, Some(&body))
        .expect("reply");

    assert!(!reply.control_signal);
    assert_eq!(reply.body, r#"{"code":"print(1)"}"#);
    let recorded = controller.finish();
    assert!(recorded[0].post);
    assert_eq!(recorded[0].url, "/gen");
    assert_eq!(recorded[0].content_type.as_deref(), Some("application/json"));
    let sent: serde_json::Value = serde_json::from_str(&recorded[0].body).expect("json");
    assert_eq!(sent, body);
}

#[test]
fn server_error_is_transport_failure() {
    let controller = MockController::start(vec![(500, "Error: upstream model timeout")]);

    let err = controller
        .transport()
        .request(Endpoint::Ping, None)
        .unwrap_err();

    assert!(matches!(err, TransportError::Status { status: 500, .. }), "{err}");
    controller.finish();
}

#[test]
fn full_run_repairs_program_over_http() {
    let temp = tempfile::tempdir().expect("tempdir");
    let controller = MockController::start(vec![
        (200, ""),
        (200, r#"{"code":"echo boom >&2\nexit 2\n"}"#),
        (200, r#"{"code":"echo fixed\n"}"#),
    ]);
    let transport = controller.transport();
    let executor = sh_executor(temp.path());
    let kill_switch = RecordingKillSwitch::default();
    let config = LoopConfig {
        master_prompt: "print a word".to_string(),
        max_retries: 4,
    };

    let outcome = run_agent(&transport, &executor, &kill_switch, &config).expect("run");

    assert_eq!(
        outcome,
        AgentOutcome::Succeeded(RunStats {
            executions: 2,
            fix_requests: 1
        })
    );
    let recorded = controller.finish();
    let urls: Vec<&str> = recorded.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["/ping", "/gen", "/fix"]);

    let fix: serde_json::Value = serde_json::from_str(&recorded[2].body).expect("fix json");
    assert_eq!(fix["code"], "echo boom >&2\nexit 2\n");
    assert_eq!(fix["error"], "Exit Code: 2\nStderr: boom\n\nStdout: ");
    assert_eq!(fix["master_prompt"], "print a word");
    assert_eq!(fs::read_dir(temp.path()).expect("read dir").count(), 0);
}

/// Runs a copy of the real binary so the self-destruct path can delete it.
#[test]
fn binary_deletes_itself_on_terminate_signal() {
    let temp = tempfile::tempdir().expect("tempdir");
    let copy = temp.path().join("reflex-agent-copy");
    fs::copy(env!("CARGO_BIN_EXE_reflex-agent"), &copy).expect("copy binary");
    let controller = MockController::start(vec![(418, "")]);

    let status = Command::new(&copy)
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .arg("--server-url")
        .arg(&controller.base_url)
        .arg("--quiet")
        .current_dir(temp.path())
        .status()
        .expect("run binary");

    assert_eq!(status.code(), Some(exit_codes::OK));
    assert!(!copy.exists(), "binary should have deleted itself");
    let recorded = controller.finish();
    assert_eq!(recorded.len(), 1);
    assert_eq!(recorded[0].url, "/ping");
}

#[test]
fn binary_exits_nonzero_when_controller_unreachable() {
    let temp = tempfile::tempdir().expect("tempdir");
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("addr").port()
    };

    let status = Command::new(env!("CARGO_BIN_EXE_reflex-agent"))
        .arg("--config")
        .arg(temp.path().join("absent.toml"))
        .arg("--server-url")
        .arg(format!("http://127.0.0.1:{port}"))
        .arg("--quiet")
        .current_dir(temp.path())
        .status()
        .expect("run binary");

    assert_eq!(status.code(), Some(exit_codes::ABORTED));
}
