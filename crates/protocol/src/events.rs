//! Signaling-Events
//!
//! Zwei getrennte Enums fuer die beiden Richtungen: `ClientEvent` empfaengt
//! der Server, `ServerEvent` sendet er. Getrennt weil beide Richtungen den
//! Tag `callResponse` mit unterschiedlichen Feldern verwenden.
//!
//! Die Tag-Namen (`initiateCall`, `incomingCall`, `getOnlineUsers`, ...)
//! sind das oeffentliche Wire-Format und duerfen nicht umbenannt werden.

use serde::{Deserialize, Serialize};
use visavis_core::types::UserId;

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidRequest,
    // Handshake
    HandshakeRequired,
    IdentityRejected,
    // Server
    ServerFull,
    ShuttingDown,
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

/// Events die der Server von einem Client empfaengt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Handshake – muss das erste Frame jeder Verbindung sein
    ///
    /// `user_id` ist die vom externen Identitaetsdienst vergebene Kennung.
    /// `token` ist ein optionaler Nachweis fuer den Identitaets-Pruefer.
    Hello {
        user_id: UserId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Anruf einleiten: `from` ruft `to` an
    InitiateCall { from: UserId, to: UserId },

    /// Antwort auf einen eingehenden Anruf, adressiert an den Anrufer
    CallResponse { to: UserId, accepted: bool },

    /// Laufenden oder klingelnden Anruf beenden, adressiert an die Gegenseite
    EndCall { to: UserId },

    /// Keepalive
    Ping { timestamp_ms: u64 },

    /// Antwort auf einen Server-Keepalive
    Pong { timestamp_ms: u64 },
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

/// Events die der Server an Clients sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Vollstaendige Online-Liste – ersetzt die clientseitige Kopie komplett
    GetOnlineUsers { users: Vec<UserId> },

    /// Eingehender Anruf von `from`
    IncomingCall { from: UserId },

    /// Antwort des Angerufenen, zugestellt an den urspruenglichen Anrufer
    CallResponse { accepted: bool },

    /// Der Anruf wurde beendet (explizit oder durch Trennung der Gegenseite)
    CallEnded,

    /// Der Zielbenutzer `to` ist nicht erreichbar (offline)
    CallFailed { to: UserId },

    /// Server-Keepalive; Clients antworten mit `pong`
    Ping { timestamp_ms: u64 },

    /// Keepalive-Antwort
    Pong {
        timestamp_ms: u64,
        server_timestamp_ms: u64,
    },

    /// Fehler auf dieser Verbindung
    Error { code: ErrorCode, message: String },
}

impl ServerEvent {
    /// Erstellt ein Error-Event
    pub fn fehler(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_tags_entsprechen_wire_format() {
        let e = ClientEvent::InitiateCall {
            from: UserId::new("u1"),
            to: UserId::new("u2"),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"type":"initiateCall","from":"u1","to":"u2"}"#);
    }

    #[test]
    fn server_event_tags_entsprechen_wire_format() {
        let e = ServerEvent::IncomingCall {
            from: UserId::new("u1"),
        };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"type":"incomingCall","from":"u1"}"#);

        let e = ServerEvent::CallEnded;
        assert_eq!(serde_json::to_string(&e).unwrap(), r#"{"type":"callEnded"}"#);
    }

    #[test]
    fn call_response_beide_richtungen() {
        // Client -> Server traegt das Ziel, Server -> Client nur das Ergebnis
        let vom_client: ClientEvent =
            serde_json::from_str(r#"{"type":"callResponse","to":"u1","accepted":true}"#).unwrap();
        assert_eq!(
            vom_client,
            ClientEvent::CallResponse {
                to: UserId::new("u1"),
                accepted: true
            }
        );

        let an_client = ServerEvent::CallResponse { accepted: true };
        assert_eq!(
            serde_json::to_string(&an_client).unwrap(),
            r#"{"type":"callResponse","accepted":true}"#
        );
    }

    #[test]
    fn hello_ohne_token() {
        let e: ClientEvent =
            serde_json::from_str(r#"{"type":"hello","user_id":"u7"}"#).unwrap();
        assert_eq!(
            e,
            ClientEvent::Hello {
                user_id: UserId::new("u7"),
                token: None
            }
        );
    }

    #[test]
    fn online_liste_serialisierung() {
        let e = ServerEvent::GetOnlineUsers {
            users: vec![UserId::new("u1"), UserId::new("u2")],
        };
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, r#"{"type":"getOnlineUsers","users":["u1","u2"]}"#);
    }

    #[test]
    fn keepalive_beide_richtungen() {
        // Server-Ping und Client-Pong tragen denselben Zeitstempel
        let e = ServerEvent::Ping { timestamp_ms: 9 };
        assert_eq!(
            serde_json::to_string(&e).unwrap(),
            r#"{"type":"ping","timestamp_ms":9}"#
        );

        let e: ClientEvent = serde_json::from_str(r#"{"type":"pong","timestamp_ms":9}"#).unwrap();
        assert_eq!(e, ClientEvent::Pong { timestamp_ms: 9 });
    }

    #[test]
    fn unbekannter_tag_wird_abgelehnt() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"type":"groupCall","members":[]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn error_code_screaming_snake() {
        let e = ServerEvent::fehler(ErrorCode::HandshakeRequired, "hello zuerst");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("HANDSHAKE_REQUIRED"));
    }
}
