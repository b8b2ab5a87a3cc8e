#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use conduit_frame::{encode_frame, FrameConfig, FrameReader, FrameWriter};
use conduit_session::{Action, Command, InboundEvent, Session, SessionState};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const STEP: Duration = Duration::from_secs(5);

/// Source id the test peer uses for retrieve answers.
pub const STORE_SOURCE: i64 = 7;
/// Source id the test peer uses when echoing sends.
pub const ECHO_SOURCE: i64 = 1;

/// In-process peer speaking the conduit protocol over TCP.
///
/// Connections are served one after another. Every decoded command is
/// recorded; `store` keeps values per conduit and key, `retrieve` answers
/// with one event per stored value (or the latest with `single`), `send` is
/// echoed back.
pub struct TestPeer {
    pub addr: SocketAddr,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl TestPeer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (recorded, commands) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut stored: HashMap<(String, String), Vec<String>> = HashMap::new();
            while let Ok((stream, _)) = listener.accept().await {
                let (read, write) = stream.into_split();
                let mut reader = FrameReader::new(read);
                let mut writer = FrameWriter::new(write);

                while let Ok(payload) = reader.read_frame().await {
                    let Ok(cmd) = Command::decode(&payload) else {
                        continue;
                    };
                    if recorded.send(cmd.clone()).is_err() {
                        return;
                    }

                    let replies = match cmd.action {
                        Action::Store => {
                            let key = cmd.key.clone().unwrap_or_default();
                            stored
                                .entry((cmd.target.to_string(), key))
                                .or_default()
                                .push(cmd.message.clone());
                            Vec::new()
                        }
                        Action::Retrieve => {
                            let key = cmd.key.clone().unwrap_or_default();
                            let values = stored
                                .get(&(cmd.target.to_string(), key))
                                .cloned()
                                .unwrap_or_default();
                            let values = if cmd.single == Some(true) {
                                values.last().cloned().into_iter().collect()
                            } else {
                                values
                            };
                            values
                                .into_iter()
                                .map(|v| InboundEvent::new(STORE_SOURCE, v))
                                .collect()
                        }
                        Action::Send => vec![InboundEvent::new(ECHO_SOURCE, cmd.message.clone())],
                        Action::Connect | Action::Disconnect => Vec::new(),
                    };

                    for event in replies {
                        if writer.send(&event.encode().unwrap()).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        Self { addr, commands }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Next command the peer decoded.
    pub async fn next_command(&mut self) -> Command {
        tokio::time::timeout(STEP, self.commands.recv())
            .await
            .expect("timed out waiting for peer command")
            .expect("peer stopped")
    }
}

pub async fn wait_for_state(session: &Session, want: SessionState) {
    let mut states = session.watch_state();
    tokio::time::timeout(STEP, states.wait_for(|state| *state == want))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {want:?}"))
        .expect("state channel closed");
}

pub async fn next_event(events: &mut mpsc::Receiver<InboundEvent>) -> InboundEvent {
    tokio::time::timeout(STEP, events.recv())
        .await
        .expect("timed out waiting for event")
        .expect("observer channel closed")
}

/// One complete wire frame carrying `plain`.
pub fn frame(plain: &[u8]) -> Vec<u8> {
    let (header, payload) = encode_frame(plain, &FrameConfig::default()).unwrap();
    let mut wire = header.to_bytes().to_vec();
    wire.extend_from_slice(&payload);
    wire
}

pub fn event_frame(source: i64, message: &str) -> Vec<u8> {
    let event = InboundEvent::new(source, message);
    frame(&event.encode().unwrap())
}
