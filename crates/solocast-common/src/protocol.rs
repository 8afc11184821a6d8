//! Wire protocol spoken over the signaling WebSocket.
//!
//! Every frame is a JSON text frame of the form
//! `{ "type": "<name>", "payload": <value> }`. Handshake payloads (`offer`,
//! `answer`, `ice-candidate`) are opaque and relayed untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identifier assigned to a connection when it is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Role a client asks for in a `register` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    /// Resolves a client-supplied role. Only the literal `"receiver"` yields
    /// [`Role::Receiver`]; anything else, including a missing role, is a sender.
    pub fn from_requested(requested: Option<&str>) -> Self {
        match requested {
            Some("receiver") => Role::Receiver,
            _ => Role::Sender,
        }
    }
}

/// Messages accepted from clients.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Register { role: Role },
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    Stop,
    Pong,
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl ClientMessage {
    /// Decodes one text frame.
    ///
    /// `register` never fails on its payload: a missing, non-object or
    /// non-string role falls back to sender.
    pub fn decode(text: &str) -> Result<Self> {
        let Envelope { kind, payload } = serde_json::from_str(text)?;
        let message = match kind.as_str() {
            "register" => ClientMessage::Register {
                role: Role::from_requested(payload.get("role").and_then(Value::as_str)),
            },
            "offer" => ClientMessage::Offer(payload),
            "answer" => ClientMessage::Answer(payload),
            "ice-candidate" => ClientMessage::IceCandidate(payload),
            "stop" => ClientMessage::Stop,
            "pong" => ClientMessage::Pong,
            other => {
                return Err(Error::protocol(format!("unknown message type `{other}`")));
            }
        };
        Ok(message)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::Offer(_) => "offer",
            ClientMessage::Answer(_) => "answer",
            ClientMessage::IceCandidate(_) => "ice-candidate",
            ClientMessage::Stop => "stop",
            ClientMessage::Pong => "pong",
        }
    }
}

/// Messages pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The receiving client lost the sender role to a newer registration.
    SenderReplaced,
    /// Sent to the sender when receivers are waiting. `receiver_id` is set
    /// when a specific receiver just registered.
    ReceiverReady {
        #[serde(
            rename = "receiverId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        receiver_id: Option<ClientId>,
        count: usize,
    },
    Offer(Value),
    Answer(Value),
    IceCandidate(Value),
    StreamStopped,
    /// The sender went away.
    ReceiverDisconnected,
    ReceiverCount {
        count: usize,
    },
    /// Keep-alive; `t` is milliseconds since the Unix epoch.
    Ping {
        t: i64,
    },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerMessage::SenderReplaced => "sender-replaced",
            ServerMessage::ReceiverReady { .. } => "receiver-ready",
            ServerMessage::Offer(_) => "offer",
            ServerMessage::Answer(_) => "answer",
            ServerMessage::IceCandidate(_) => "ice-candidate",
            ServerMessage::StreamStopped => "stream-stopped",
            ServerMessage::ReceiverDisconnected => "receiver-disconnected",
            ServerMessage::ReceiverCount { .. } => "receiver-count",
            ServerMessage::Ping { .. } => "ping",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_defaults_to_sender() {
        assert_eq!(Role::from_requested(Some("receiver")), Role::Receiver);
        assert_eq!(Role::from_requested(Some("sender")), Role::Sender);
        assert_eq!(Role::from_requested(Some("Receiver")), Role::Sender);
        assert_eq!(Role::from_requested(Some("viewer")), Role::Sender);
        assert_eq!(Role::from_requested(None), Role::Sender);
    }

    #[test]
    fn test_decode_register_variants() {
        let cases = [
            (r#"{"type":"register","payload":{"role":"receiver"}}"#, Role::Receiver),
            (r#"{"type":"register","payload":{"role":"sender"}}"#, Role::Sender),
            (r#"{"type":"register","payload":{}}"#, Role::Sender),
            (r#"{"type":"register"}"#, Role::Sender),
            (r#"{"type":"register","payload":null}"#, Role::Sender),
            (r#"{"type":"register","payload":{"role":42}}"#, Role::Sender),
            (r#"{"type":"register","payload":"receiver"}"#, Role::Sender),
        ];
        for (text, role) in cases {
            assert_eq!(
                ClientMessage::decode(text).unwrap(),
                ClientMessage::Register { role },
                "frame: {text}"
            );
        }
    }

    #[test]
    fn test_decode_keeps_handshake_payload_opaque() {
        let sdp = json!({"type": "offer", "sdp": "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\n"});
        let text = json!({"type": "offer", "payload": sdp}).to_string();
        assert_eq!(ClientMessage::decode(&text).unwrap(), ClientMessage::Offer(sdp));

        let candidate = json!({"candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54321 typ host", "sdpMLineIndex": 0});
        let text = json!({"type": "ice-candidate", "payload": candidate}).to_string();
        assert_eq!(
            ClientMessage::decode(&text).unwrap(),
            ClientMessage::IceCandidate(candidate)
        );
    }

    #[test]
    fn test_decode_payloadless_messages() {
        assert_eq!(ClientMessage::decode(r#"{"type":"stop"}"#).unwrap(), ClientMessage::Stop);
        assert_eq!(ClientMessage::decode(r#"{"type":"pong"}"#).unwrap(), ClientMessage::Pong);
        assert_eq!(
            ClientMessage::decode(r#"{"type":"answer"}"#).unwrap(),
            ClientMessage::Answer(Value::Null)
        );
    }

    #[test]
    fn test_decode_rejects_unknown_and_malformed() {
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"join-room"}"#),
            Err(Error::Protocol(_))
        ));
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(Error::Serialization(_))
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"payload":{}}"#),
            Err(Error::Serialization(_))
        ));
    }

    #[test]
    fn test_encode_server_messages() {
        let id = ClientId::new();
        let cases = [
            (ServerMessage::SenderReplaced, json!({"type": "sender-replaced"})),
            (
                ServerMessage::ReceiverReady { receiver_id: None, count: 2 },
                json!({"type": "receiver-ready", "payload": {"count": 2}}),
            ),
            (
                ServerMessage::ReceiverReady { receiver_id: Some(id), count: 1 },
                json!({"type": "receiver-ready", "payload": {"receiverId": id.to_string(), "count": 1}}),
            ),
            (
                ServerMessage::IceCandidate(json!({"candidate": "c"})),
                json!({"type": "ice-candidate", "payload": {"candidate": "c"}}),
            ),
            (ServerMessage::StreamStopped, json!({"type": "stream-stopped"})),
            (ServerMessage::ReceiverDisconnected, json!({"type": "receiver-disconnected"})),
            (
                ServerMessage::ReceiverCount { count: 0 },
                json!({"type": "receiver-count", "payload": {"count": 0}}),
            ),
            (
                ServerMessage::Ping { t: 1_700_000_000_000 },
                json!({"type": "ping", "payload": {"t": 1_700_000_000_000_i64}}),
            ),
        ];
        for (message, expected) in cases {
            let encoded: Value = serde_json::from_str(&message.encode().unwrap()).unwrap();
            assert_eq!(encoded, expected);
            assert_eq!(encoded["type"], message.name());
        }
    }

    #[test]
    fn test_server_message_decodes_back() {
        let text = r#"{"type":"receiver-ready","payload":{"count":3}}"#;
        let message: ServerMessage = serde_json::from_str(text).unwrap();
        assert_eq!(message, ServerMessage::ReceiverReady { receiver_id: None, count: 3 });
    }
}
