//! Event-Dispatcher – Routet ClientEvents an Registry und Router
//!
//! Der Dispatcher bekommt bereits dekodierte Events einer identifizierten
//! Verbindung und bildet sie auf Registry- und Router-Operationen ab.
//! Die Rueckgabe ist die direkte Antwort an dieselbe Verbindung (oder
//! `None` wenn keine faellig ist); Fan-outs an andere Clients laufen
//! ueber deren Send-Queues.
//!
//! ## Fehlerpolitik
//! Kein Event eines einzelnen Clients darf den Prozess gefaehrden oder
//! das Registry fuer andere korrumpieren: ungueltige Events werden mit
//! einem `error`-Event beantwortet, Zustellungen an Offline-Ziele
//! verpuffen (bzw. werden beim Einleiten mit `callFailed` quittiert).

use std::net::SocketAddr;
use std::sync::Arc;
use visavis_core::types::UserId;
use visavis_protocol::events::{ClientEvent, ErrorCode, ServerEvent};

use crate::identity::IdentitaetsPruefer;
use crate::server_state::SignalingState;

/// Dispatcher-Kontext – Informationen ueber die aktuelle Verbindung
pub struct DispatcherContext {
    /// Peer-Adresse fuer Logging
    pub peer_addr: SocketAddr,
    /// Identitaet der Verbindung (nach erfolgreichem Handshake gesetzt)
    pub user_id: Option<UserId>,
}

/// Zentraler Event-Dispatcher
pub struct EventDispatcher<I>
where
    I: IdentitaetsPruefer,
{
    state: Arc<SignalingState<I>>,
}

impl<I> EventDispatcher<I>
where
    I: IdentitaetsPruefer,
{
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<SignalingState<I>>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes ClientEvent und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine direkte Antwort an diese Verbindung
    /// faellig ist (der Normalfall bei erfolgreicher Vermittlung).
    pub fn dispatch(&self, event: ClientEvent, ctx: &DispatcherContext) -> Option<ServerEvent> {
        let user_id = match &ctx.user_id {
            Some(uid) => uid.clone(),
            None => {
                // Die Verbindung haette nie hierher kommen duerfen
                return Some(ServerEvent::fehler(
                    ErrorCode::HandshakeRequired,
                    "Erst `hello` senden",
                ));
            }
        };

        match event {
            // ---------------------------------------------------------------
            // Handshake-Duplikat
            // ---------------------------------------------------------------
            ClientEvent::Hello { .. } => {
                tracing::debug!(peer = %ctx.peer_addr, user_id = %user_id, "Doppeltes hello");
                Some(ServerEvent::fehler(
                    ErrorCode::InvalidRequest,
                    "Verbindung ist bereits identifiziert",
                ))
            }

            // ---------------------------------------------------------------
            // Call-Control
            // ---------------------------------------------------------------
            ClientEvent::InitiateCall { from, to } => {
                // Absender-Angabe muss zur identifizierten Verbindung passen
                if from != user_id {
                    tracing::warn!(
                        peer = %ctx.peer_addr,
                        user_id = %user_id,
                        behauptet = %from,
                        "initiateCall mit fremder Absender-Identitaet verworfen"
                    );
                    return Some(ServerEvent::fehler(
                        ErrorCode::InvalidRequest,
                        "`from` entspricht nicht der eigenen Identitaet",
                    ));
                }

                if self.state.router.einleiten(&from, &to) {
                    None
                } else {
                    // Ziel offline: Quittung an den Einleitenden statt
                    // stillem Verwerfen, damit die UI nicht haengen bleibt
                    Some(ServerEvent::CallFailed { to })
                }
            }

            ClientEvent::CallResponse { to, accepted } => {
                self.state.router.antworten(&to, accepted);
                None
            }

            ClientEvent::EndCall { to } => {
                self.state.router.beenden(&to);
                None
            }

            // ---------------------------------------------------------------
            // Keepalive
            // ---------------------------------------------------------------
            ClientEvent::Ping { timestamp_ms } => {
                let server_ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                Some(ServerEvent::Pong {
                    timestamp_ms,
                    server_timestamp_ms: server_ts,
                })
            }

            ClientEvent::Pong { timestamp_ms } => {
                // Der Empfang selbst zaehlt bereits als Aktivitaet
                tracing::trace!(peer = %ctx.peer_addr, timestamp_ms, "Keepalive-Antwort");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::HandshakeIdentitaet;
    use crate::registry::ConnectionHandle;
    use crate::server_state::SignalingConfig;
    use visavis_core::types::ConnectionId;

    fn aufbau() -> (Arc<SignalingState<HandshakeIdentitaet>>, EventDispatcher<HandshakeIdentitaet>) {
        let state = SignalingState::neu(SignalingConfig::default(), Arc::new(HandshakeIdentitaet));
        let dispatcher = EventDispatcher::neu(Arc::clone(&state));
        (state, dispatcher)
    }

    fn kontext(id: &str) -> DispatcherContext {
        DispatcherContext {
            peer_addr: "127.0.0.1:11111".parse().unwrap(),
            user_id: Some(UserId::new(id)),
        }
    }

    #[test]
    fn ping_wird_mit_pong_beantwortet() {
        let (_state, dispatcher) = aufbau();
        let antwort = dispatcher.dispatch(ClientEvent::Ping { timestamp_ms: 7 }, &kontext("u1"));
        assert!(matches!(
            antwort,
            Some(ServerEvent::Pong { timestamp_ms: 7, .. })
        ));
    }

    #[test]
    fn pong_braucht_keine_antwort() {
        let (_state, dispatcher) = aufbau();
        let antwort = dispatcher.dispatch(ClientEvent::Pong { timestamp_ms: 7 }, &kontext("u1"));
        assert!(antwort.is_none());
    }

    #[test]
    fn initiate_an_offline_ziel_quittiert_call_failed() {
        let (_state, dispatcher) = aufbau();
        let antwort = dispatcher.dispatch(
            ClientEvent::InitiateCall {
                from: UserId::new("u1"),
                to: UserId::new("u2"),
            },
            &kontext("u1"),
        );
        assert_eq!(
            antwort,
            Some(ServerEvent::CallFailed {
                to: UserId::new("u2")
            })
        );
    }

    #[test]
    fn initiate_mit_fremder_identitaet_wird_verworfen() {
        let (state, dispatcher) = aufbau();
        let (handle, mut rx) = ConnectionHandle::neu(ConnectionId::new());
        state.registry.registrieren(UserId::new("u2"), handle);

        let antwort = dispatcher.dispatch(
            ClientEvent::InitiateCall {
                from: UserId::new("u9"),
                to: UserId::new("u2"),
            },
            &kontext("u1"),
        );

        assert!(matches!(
            antwort,
            Some(ServerEvent::Error {
                code: ErrorCode::InvalidRequest,
                ..
            })
        ));
        assert!(rx.try_recv().is_err(), "Ziel darf nichts bekommen");
    }

    #[test]
    fn erfolgreiches_initiate_gibt_keine_direkte_antwort() {
        let (state, dispatcher) = aufbau();
        let (handle, mut rx) = ConnectionHandle::neu(ConnectionId::new());
        state.registry.registrieren(UserId::new("u2"), handle);

        let antwort = dispatcher.dispatch(
            ClientEvent::InitiateCall {
                from: UserId::new("u1"),
                to: UserId::new("u2"),
            },
            &kontext("u1"),
        );

        assert!(antwort.is_none());
        assert_eq!(
            rx.try_recv().unwrap(),
            ServerEvent::IncomingCall {
                from: UserId::new("u1")
            }
        );
    }

    #[test]
    fn doppeltes_hello_wird_abgelehnt() {
        let (_state, dispatcher) = aufbau();
        let antwort = dispatcher.dispatch(
            ClientEvent::Hello {
                user_id: UserId::new("u1"),
                token: None,
            },
            &kontext("u1"),
        );
        assert!(matches!(
            antwort,
            Some(ServerEvent::Error {
                code: ErrorCode::InvalidRequest,
                ..
            })
        ));
    }

    #[test]
    fn ohne_identitaet_kommt_handshake_fehler() {
        let (_state, dispatcher) = aufbau();
        let ctx = DispatcherContext {
            peer_addr: "127.0.0.1:11111".parse().unwrap(),
            user_id: None,
        };
        let antwort = dispatcher.dispatch(ClientEvent::Ping { timestamp_ms: 1 }, &ctx);
        assert!(matches!(
            antwort,
            Some(ServerEvent::Error {
                code: ErrorCode::HandshakeRequired,
                ..
            })
        ));
    }

    #[test]
    fn response_und_end_verpuffen_bei_offline_ziel() {
        let (_state, dispatcher) = aufbau();

        // Kein Fehler, keine Antwort: stilles Verwerfen laut Fehlerpolitik
        let antwort = dispatcher.dispatch(
            ClientEvent::CallResponse {
                to: UserId::new("niemand"),
                accepted: true,
            },
            &kontext("u1"),
        );
        assert!(antwort.is_none());

        let antwort = dispatcher.dispatch(
            ClientEvent::EndCall {
                to: UserId::new("niemand"),
            },
            &kontext("u1"),
        );
        assert!(antwort.is_none());
    }
}
