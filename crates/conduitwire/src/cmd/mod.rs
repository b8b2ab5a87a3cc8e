use std::future::Future;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use conduitwire::{InboundEvent, Session, SessionConfig, SessionState, TlsPolicy, DEFAULT_PORT};
use tokio::sync::mpsc;

use crate::exit::{io_error, session_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod retrieve;
pub mod send;
pub mod store;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish a message to a conduit.
    Send(SendArgs),
    /// Store a value under a key in a conduit.
    Store(StoreArgs),
    /// Ask the peer for values stored under a key and print the answers.
    Retrieve(RetrieveArgs),
    /// Join conduits and print incoming events.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, endpoint: &EndpointArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(endpoint, args, format),
        Command::Store(args) => store::run(endpoint, args),
        Command::Retrieve(args) => retrieve::run(endpoint, args, format),
        Command::Listen(args) => listen::run(endpoint, args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to reach the peer.
#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Peer host name or address.
    #[arg(
        long,
        env = "CONDUITWIRE_HOST",
        default_value = "127.0.0.1",
        global = true
    )]
    pub host: String,

    /// Peer port.
    #[arg(long, env = "CONDUITWIRE_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Transport security.
    ///
    /// Defaults to plain TCP. Deployed peers on port 16666 speak TLS with
    /// self-signed certificates; reach them with `--tls insecure`, or
    /// `--tls system` when the peer presents a trusted chain.
    #[arg(
        long,
        env = "CONDUITWIRE_TLS",
        value_enum,
        default_value = "plain",
        global = true
    )]
    pub tls: TlsMode,

    /// Connection timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "10s", global = true)]
    pub connect_timeout: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TlsMode {
    /// Plain TCP.
    Plain,
    /// TLS verified against the system trust store.
    System,
    /// TLS without certificate verification (test peers only).
    Insecure,
}

impl TlsMode {
    pub fn policy(self) -> TlsPolicy {
        match self {
            TlsMode::Plain => TlsPolicy::Plain,
            TlsMode::System => TlsPolicy::SystemRoots,
            TlsMode::Insecure => TlsPolicy::AcceptAnyCertificate,
        }
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Conduit to publish to.
    pub conduit: String,
    /// Message text.
    pub message: String,
    /// Join the conduit before sending and leave it afterwards.
    #[arg(long)]
    pub join: bool,
    /// Wait for one event after sending and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for an event when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct StoreArgs {
    /// Conduit holding the value.
    pub conduit: String,
    /// Key to store under.
    pub key: String,
    /// Value to store.
    pub value: String,
}

#[derive(Args, Debug)]
pub struct RetrieveArgs {
    /// Conduit holding the value.
    pub conduit: String,
    /// Key to look up.
    pub key: String,
    /// Ask for the latest value only.
    #[arg(long)]
    pub single: bool,
    /// Exit after printing N answers.
    #[arg(long)]
    pub count: Option<usize>,
    /// How long to collect answers (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Conduits to join.
    #[arg(required = true)]
    pub conduits: Vec<String>,
    /// Exit after receiving N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Run `task` to completion on a fresh runtime.
pub(crate) fn block_on<F>(task: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))?;
    runtime.block_on(task)
}

/// Open a session to the configured endpoint.
pub(crate) async fn open_session(endpoint: &EndpointArgs) -> CliResult<Session> {
    let connect_timeout = parse_duration(&endpoint.connect_timeout)?;
    let session = Session::new(SessionConfig {
        connect_timeout,
        ..SessionConfig::default()
    });
    session
        .open(&endpoint.host, endpoint.port, endpoint.tls.policy())
        .await
        .map_err(|err| {
            session_error(
                &format!("connect to {}:{} failed", endpoint.host, endpoint.port),
                err,
            )
        })?;
    Ok(session)
}

/// Next event from the peer, or `None` once the connection is gone.
pub(crate) async fn next_event(
    session: &Session,
    events: &mut mpsc::Receiver<InboundEvent>,
) -> Option<InboundEvent> {
    let mut states = session.watch_state();
    tokio::select! {
        biased;
        event = events.recv() => event,
        _ = states.wait_for(|state| *state == SessionState::Disconnected) => None,
    }
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
