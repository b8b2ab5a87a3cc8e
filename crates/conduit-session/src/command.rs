use std::borrow::Borrow;
use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Name of a conduit (channel). Conduits are identified by name only.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConduitId(String);

impl ConduitId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConduitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConduitId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ConduitId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Borrow<str> for ConduitId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// What a command asks the peer to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Join a conduit.
    Connect,
    /// Leave a conduit.
    Disconnect,
    /// Publish a message to a conduit.
    Send,
    /// Store a value under a key.
    Store,
    /// Ask for values stored under a key.
    Retrieve,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Connect => "connect",
            Action::Disconnect => "disconnect",
            Action::Send => "send",
            Action::Store => "store",
            Action::Retrieve => "retrieve",
        }
    }

    fn requires_key(self) -> bool {
        matches!(self, Action::Store | Action::Retrieve)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound command payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Command {
    pub action: Action,
    pub target: ConduitId,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single: Option<bool>,
    pub timestamp: String,
}

impl Command {
    fn new(action: Action, target: ConduitId, message: String) -> Self {
        Self {
            action,
            target,
            message,
            key: None,
            single: None,
            timestamp: timestamp_now(),
        }
    }

    /// Join `conduit`. The conduit name is carried in `message` as well.
    pub fn connect(conduit: impl Into<ConduitId>) -> Self {
        let conduit = conduit.into();
        let message = conduit.to_string();
        Self::new(Action::Connect, conduit, message)
    }

    /// Leave `conduit`. The conduit name is carried in `message` as well.
    pub fn disconnect(conduit: impl Into<ConduitId>) -> Self {
        let conduit = conduit.into();
        let message = conduit.to_string();
        Self::new(Action::Disconnect, conduit, message)
    }

    /// Publish `message` to `conduit`.
    pub fn send(conduit: impl Into<ConduitId>, message: impl Into<String>) -> Self {
        Self::new(Action::Send, conduit.into(), message.into())
    }

    /// Store `value` under `key` in `conduit`.
    pub fn store(
        conduit: impl Into<ConduitId>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        let mut cmd = Self::new(Action::Store, conduit.into(), value.into());
        cmd.key = Some(key.into());
        cmd
    }

    /// Retrieve values stored under `key`; `single` asks for the latest only.
    pub fn retrieve(conduit: impl Into<ConduitId>, key: impl Into<String>, single: bool) -> Self {
        let mut cmd = Self::new(Action::Retrieve, conduit.into(), String::new());
        cmd.key = Some(key.into());
        cmd.single = Some(single);
        cmd
    }

    /// Override the timestamp.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Check the field combination required by the action.
    pub fn validate(&self) -> Result<()> {
        if self.action.requires_key() && self.key.is_none() {
            return Err(SessionError::InvalidCommand(format!(
                "{} requires a key",
                self.action
            )));
        }
        if !self.action.requires_key() && self.key.is_some() {
            return Err(SessionError::InvalidCommand(format!(
                "{} does not take a key",
                self.action
            )));
        }
        if self.single.is_some() && self.action != Action::Retrieve {
            return Err(SessionError::InvalidCommand(format!(
                "{} does not take `single`",
                self.action
            )));
        }
        Ok(())
    }

    /// Serialize to the JSON text payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.validate()?;
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a JSON text payload.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let cmd: Self = serde_json::from_slice(bytes)?;
        cmd.validate()?;
        Ok(cmd)
    }
}

/// Message delivered by the peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InboundEvent {
    /// Peer-assigned id of the sender.
    pub source: i64,
    pub message: String,
    pub timestamp: String,
}

impl InboundEvent {
    pub fn new(source: i64, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
            timestamp: timestamp_now(),
        }
    }

    /// Parse a JSON text payload. Unknown fields are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Serialize to the JSON text payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl fmt::Display for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at ({})", self.source, self.message, self.timestamp)
    }
}

/// Current time as an RFC 3339 UTC string with millisecond precision.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn json(cmd: &Command) -> serde_json::Value {
        serde_json::from_slice(&cmd.encode().unwrap()).unwrap()
    }

    #[test]
    fn send_serializes_expected_keys() {
        let value = json(&Command::send("Conduit 1", "hi").with_timestamp("t0"));
        assert_eq!(
            value,
            serde_json::json!({
                "action": "send",
                "target": "Conduit 1",
                "message": "hi",
                "timestamp": "t0",
            })
        );
    }

    #[test]
    fn connect_carries_conduit_in_message_and_target() {
        let value = json(&Command::connect("Conduit 2"));
        assert_eq!(value["action"], "connect");
        assert_eq!(value["message"], "Conduit 2");
        assert_eq!(value["target"], "Conduit 2");
        assert!(value.get("key").is_none());
        assert!(value.get("single").is_none());
    }

    #[test]
    fn retrieve_includes_key_and_single() {
        let value = json(&Command::retrieve("Conduit 1", "K", true));
        assert_eq!(value["action"], "retrieve");
        assert_eq!(value["key"], "K");
        assert_eq!(value["single"], true);
        assert_eq!(value["message"], "");
    }

    #[test]
    fn store_omits_single() {
        let value = json(&Command::store("Conduit 1", "K", "M"));
        assert_eq!(value["key"], "K");
        assert_eq!(value["message"], "M");
        assert!(value.get("single").is_none());
    }

    #[test]
    fn commands_survive_encode_decode() {
        let commands = [
            Command::connect("a"),
            Command::disconnect("a"),
            Command::send("b", "text with \"quotes\" and ünïcode"),
            Command::store("c", "key", "value"),
            Command::retrieve("c", "key", false),
        ];
        for cmd in commands {
            let decoded = Command::decode(&cmd.encode().unwrap()).unwrap();
            assert_eq!(decoded, cmd);
        }
    }

    #[test]
    fn store_without_key_is_invalid() {
        let mut cmd = Command::store("c", "k", "v");
        cmd.key = None;
        assert!(matches!(cmd.encode(), Err(SessionError::InvalidCommand(_))));
    }

    #[test]
    fn single_outside_retrieve_is_invalid() {
        let mut cmd = Command::send("c", "m");
        cmd.single = Some(true);
        assert!(matches!(cmd.encode(), Err(SessionError::InvalidCommand(_))));
    }

    #[test]
    fn event_decodes_required_fields() {
        let event =
            InboundEvent::decode(br#"{"source":42,"message":"hello","timestamp":"now","extra":1}"#)
                .unwrap();
        assert_eq!(event.source, 42);
        assert_eq!(event.message, "hello");
        assert_eq!(event.timestamp, "now");
        assert_eq!(event.to_string(), "42: hello at (now)");
    }

    #[test]
    fn event_accepts_full_i64_range() {
        let event = InboundEvent::decode(
            br#"{"source":-9223372036854775808,"message":"","timestamp":""}"#,
        )
        .unwrap();
        assert_eq!(event.source, i64::MIN);
    }

    #[test]
    fn event_rejects_wrong_shapes() {
        let bad: [&[u8]; 5] = [
            br#"{"message":"m","timestamp":"t"}"#,
            br#"{"source":"1","message":"m","timestamp":"t"}"#,
            br#"{"source":1,"message":2,"timestamp":"t"}"#,
            b"null",
            b"not json",
        ];
        for payload in bad {
            assert!(
                matches!(InboundEvent::decode(payload), Err(SessionError::Json(_))),
                "payload {:?} should not parse",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn timestamps_are_rfc3339_utc() {
        let ts = timestamp_now();
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
        assert!(ts.ends_with('Z'));
    }
}
