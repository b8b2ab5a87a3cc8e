#![cfg(feature = "cli")]

use std::collections::HashMap;
use std::process::{Command, Output};
use std::time::Duration;

use conduitwire::frame::{FrameReader, FrameWriter};
use conduitwire::session::{Action, Command as PeerCommand, InboundEvent};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const STEP: Duration = Duration::from_secs(10);

/// Peer that records commands, keeps stored values, answers retrieves,
/// greets joins and echoes sends.
async fn start_peer() -> (u16, mpsc::UnboundedReceiver<PeerCommand>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (recorded, commands) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut stored: HashMap<String, Vec<String>> = HashMap::new();
        while let Ok((stream, _)) = listener.accept().await {
            let (read, write) = stream.into_split();
            let mut reader = FrameReader::new(read);
            let mut writer = FrameWriter::new(write);

            while let Ok(payload) = reader.read_frame().await {
                let Ok(cmd) = PeerCommand::decode(&payload) else {
                    continue;
                };
                let _ = recorded.send(cmd.clone());

                let replies: Vec<InboundEvent> = match cmd.action {
                    Action::Connect => {
                        vec![InboundEvent::new(0, format!("joined {}", cmd.target))]
                    }
                    Action::Send => vec![InboundEvent::new(1, cmd.message.clone())],
                    Action::Store => {
                        let key = cmd.key.clone().unwrap_or_default();
                        stored.entry(key).or_default().push(cmd.message.clone());
                        Vec::new()
                    }
                    Action::Retrieve => {
                        let key = cmd.key.clone().unwrap_or_default();
                        let values = stored.get(&key).cloned().unwrap_or_default();
                        let values: Vec<String> = if cmd.single == Some(true) {
                            values.last().cloned().into_iter().collect()
                        } else {
                            values
                        };
                        values
                            .into_iter()
                            .map(|v| InboundEvent::new(7, v))
                            .collect()
                    }
                    Action::Disconnect => Vec::new(),
                };
                for event in replies {
                    if writer.send(&event.encode().unwrap()).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    (port, commands)
}

async fn next_command(commands: &mut mpsc::UnboundedReceiver<PeerCommand>) -> PeerCommand {
    tokio::time::timeout(STEP, commands.recv())
        .await
        .expect("timed out waiting for command")
        .expect("peer stopped")
}

async fn conduitwire(port: u16, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_conduitwire"));
    cmd.env_remove("CONDUITWIRE_HOST")
        .env_remove("CONDUITWIRE_TLS")
        .env("CONDUITWIRE_PORT", port.to_string())
        .args(["--log-level", "error"])
        .args(args);
    let run = tokio::task::spawn_blocking(move || cmd.output().expect("binary should run"));
    tokio::time::timeout(STEP, run)
        .await
        .expect("binary timed out")
        .expect("runner panicked")
}

fn stdout_json_lines(output: &Output) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line should be JSON"))
        .collect()
}

fn unused_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_conduitwire"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("conduitwire {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn version_extended_reports_protocol() {
    let output = Command::new(env!("CARGO_BIN_EXE_conduitwire"))
        .args(["version", "--extended"])
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("magic=0x12344321"));
    assert!(stdout.contains("default_port: 16666"));
}

#[tokio::test(flavor = "multi_thread")]
async fn send_delivers_message_to_peer() {
    let (port, mut commands) = start_peer().await;

    let output = conduitwire(port, &["send", "Conduit 1", "hello"]).await;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let cmd = next_command(&mut commands).await;
    assert_eq!(cmd.action, Action::Send);
    assert_eq!(cmd.target.as_str(), "Conduit 1");
    assert_eq!(cmd.message, "hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn send_with_join_wraps_message_in_membership() {
    let (port, mut commands) = start_peer().await;

    let output = conduitwire(port, &["send", "room", "hi", "--join"]).await;
    assert!(output.status.success());

    let actions = [
        next_command(&mut commands).await.action,
        next_command(&mut commands).await.action,
        next_command(&mut commands).await.action,
    ];
    assert_eq!(actions, [Action::Connect, Action::Send, Action::Disconnect]);
}

#[tokio::test(flavor = "multi_thread")]
async fn send_wait_prints_echo() {
    let (port, _commands) = start_peer().await;

    let output = conduitwire(port, &["--format", "json", "send", "c", "ping", "--wait"]).await;
    assert!(output.status.success());

    let lines = stdout_json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "ping");
    assert_eq!(lines[0]["source"], 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn store_then_retrieve_prints_value() {
    let (port, _commands) = start_peer().await;

    let stored = conduitwire(port, &["store", "Conduit 1", "K", "M"]).await;
    assert!(stored.status.success());

    let output = conduitwire(
        port,
        &["--format", "json", "retrieve", "Conduit 1", "K", "--single"],
    )
    .await;
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let lines = stdout_json_lines(&output);
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["message"], "M");
    assert_eq!(lines[0]["source"], 7);
}

#[tokio::test(flavor = "multi_thread")]
async fn retrieve_without_answer_times_out() {
    let (port, _commands) = start_peer().await;

    let output = conduitwire(port, &["retrieve", "c", "missing", "--wait", "300ms"]).await;
    assert_eq!(output.status.code(), Some(124));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no answer"));
}

#[tokio::test(flavor = "multi_thread")]
async fn listen_prints_events_until_count() {
    let (port, mut commands) = start_peer().await;

    let output = conduitwire(
        port,
        &["--format", "raw", "listen", "Conduit 1", "--count", "1"],
    )
    .await;
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "joined Conduit 1"
    );

    assert_eq!(next_command(&mut commands).await.action, Action::Connect);
    let leave = next_command(&mut commands).await;
    assert_eq!(leave.action, Action::Disconnect);
    assert_eq!(leave.target.as_str(), "Conduit 1");
}

#[test]
fn refused_connection_exits_with_failure() {
    let output = Command::new(env!("CARGO_BIN_EXE_conduitwire"))
        .env_remove("CONDUITWIRE_HOST")
        .env_remove("CONDUITWIRE_TLS")
        .args(["--log-level", "error", "--port"])
        .arg(unused_port().to_string())
        .args(["send", "c", "m"])
        .output()
        .expect("send should run");

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: connect to"));
}

#[test]
fn invalid_wait_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_conduitwire"))
        .args(["retrieve", "c", "k", "--wait", "0s"])
        .output()
        .expect("retrieve should run");

    assert_eq!(output.status.code(), Some(64));
}
