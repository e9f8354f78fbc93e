//! Client-Connection – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Das erste Frame muss `hello` mit der extern vergebenen
//! Identitaet sein; erst danach wird die Verbindung im Registry gefuehrt
//! und die Online-Liste verteilt.
//!
//! ## Lebenszyklus
//! ```text
//! Accept -> Handshake (hello, mit Frist) -> Registriert -> Event-Loop
//!                 |                                            |
//!                 +------ Ablehnung ohne Registry-Eintrag      |
//!                                                              v
//!                    Cleanup: entfernen + Broadcast + Geisterruf-Check
//! ```
//!
//! Das Cleanup laeuft fuer jede registrierte Verbindung genau einmal,
//! egal auf welchem Weg der Event-Loop endet (sauberes Close, Timeout,
//! Netzfehler, Shutdown). Eine nie registrierte Verbindung hinterlaesst
//! keinen Registry-Eintrag.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use visavis_core::types::{ConnectionId, UserId};
use visavis_protocol::events::{ClientEvent, ErrorCode, ServerEvent};
use visavis_protocol::wire::ServerCodec;

use crate::dispatcher::{DispatcherContext, EventDispatcher};
use crate::identity::IdentitaetsPruefer;
use crate::registry::ConnectionHandle;
use crate::server_state::SignalingState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `ServerCodec`, dispatcht an den `EventDispatcher` und
/// schreibt Antworten sowie die ueber die Send-Queue eingehenden Fan-outs
/// zurueck. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection<I>
where
    I: IdentitaetsPruefer,
{
    state: Arc<SignalingState<I>>,
    peer_addr: SocketAddr,
}

impl<I> ClientConnection<I>
where
    I: IdentitaetsPruefer,
{
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<SignalingState<I>>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, ServerCodec::new());

        // Handshake: erstes Frame muss `hello` sein, mit Frist
        let user_id = match self.handshake(&mut framed).await {
            Some(uid) => uid,
            None => {
                tracing::info!(peer = %peer_addr, "Verbindung ohne gueltigen Handshake beendet");
                return;
            }
        };

        // Registrieren und Online-Liste verteilen – auch die eigene
        // Verbindung bekommt so ihren ersten Schnappschuss
        let connection_id = ConnectionId::new();
        let (handle, mut sende_rx) = ConnectionHandle::neu(connection_id);
        self.state.registry.registrieren(user_id.clone(), handle);
        self.state.presence.online_liste_senden();

        tracing::info!(peer = %peer_addr, user_id = %user_id, connection_id = %connection_id, "Verbindung identifiziert");

        let dispatcher = EventDispatcher::neu(Arc::clone(&self.state));
        let ctx = DispatcherContext {
            peer_addr,
            user_id: Some(user_id.clone()),
        };

        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);
        let mut letzter_empfang = Instant::now();

        loop {
            tokio::select! {
                // Eingehendes Event vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(event)) => {
                            letzter_empfang = Instant::now();

                            if let Some(antwort) = dispatcher.dispatch(event, &ctx) {
                                if let Err(e) = framed.send(antwort).await {
                                    tracing::warn!(peer = %peer_addr, fehler = %e, "Senden fehlgeschlagen");
                                    break;
                                }
                            }
                        }
                        Some(Err(e)) => {
                            // Ungueltiges Frame: nur diese Verbindung beenden
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            let _ = framed
                                .send(ServerEvent::fehler(
                                    ErrorCode::InvalidRequest,
                                    "Ungueltiges Frame",
                                ))
                                .await;
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Event aus Broadcaster oder Router
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Fan-out-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Keepalive-Tick: bei Inaktivitaet trennen, sonst aktiv
                // anpingen (Clients muessen nicht selbst pingen)
                _ = tokio::time::sleep(keepalive_intervall) => {
                    if letzter_empfang.elapsed() > timeout_dauer {
                        tracing::warn!(peer = %peer_addr, user_id = %user_id, "Verbindungs-Timeout");
                        break;
                    }

                    let jetzt_ms = std::time::SystemTime::now()
                        .duration_since(std::time::UNIX_EPOCH)
                        .unwrap_or_default()
                        .as_millis() as u64;
                    if let Err(e) = framed.send(ServerEvent::Ping { timestamp_ms: jetzt_ms }).await {
                        tracing::warn!(peer = %peer_addr, fehler = %e, "Keepalive-Senden fehlgeschlagen");
                        break;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        let _ = framed
                            .send(ServerEvent::fehler(
                                ErrorCode::ShuttingDown,
                                "Server wird heruntergefahren",
                            ))
                            .await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende – unbedingt, egal welcher Pfad
        // den Loop verlassen hat
        let offline = self.state.registry.entfernen(&user_id, &connection_id);
        if offline {
            // Gegenseite eines laufenden Anrufs informieren, dann die
            // geschrumpfte Online-Menge verteilen
            self.state.router.teilnehmer_weggefallen(&user_id);
            self.state.presence.online_liste_senden();
        }

        tracing::info!(peer = %peer_addr, user_id = %user_id, "Verbindungs-Task beendet");
    }

    /// Wartet auf das `hello`-Frame und prueft die Identitaet
    ///
    /// Gibt `None` zurueck wenn der Handshake fehlschlaegt; die Ablehnung
    /// wurde dann bereits best-effort auf die Verbindung geschrieben und
    /// das Registry nie beruehrt.
    async fn handshake(&self, framed: &mut Framed<TcpStream, ServerCodec>) -> Option<UserId> {
        let frist = Duration::from_secs(self.state.config.handshake_timeout_sek);
        let peer_addr = self.peer_addr;

        let erstes_frame = match tokio::time::timeout(frist, framed.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Handshake-Frist verstrichen");
                let _ = framed
                    .send(ServerEvent::fehler(
                        ErrorCode::HandshakeRequired,
                        "Kein hello innerhalb der Frist",
                    ))
                    .await;
                return None;
            }
        };

        match erstes_frame {
            Some(Ok(ClientEvent::Hello { user_id, token })) => {
                match self.state.identitaet.pruefen(&user_id, token.as_deref()) {
                    Ok(uid) => Some(uid),
                    Err(e) => {
                        tracing::warn!(peer = %peer_addr, user_id = %user_id, fehler = %e, "Identitaet abgelehnt");
                        let _ = framed
                            .send(ServerEvent::fehler(
                                ErrorCode::IdentityRejected,
                                e.to_string(),
                            ))
                            .await;
                        None
                    }
                }
            }
            Some(Ok(_)) => {
                tracing::warn!(peer = %peer_addr, "Erstes Frame war kein hello");
                let _ = framed
                    .send(ServerEvent::fehler(
                        ErrorCode::HandshakeRequired,
                        "Erstes Frame muss `hello` sein",
                    ))
                    .await;
                None
            }
            Some(Err(e)) => {
                tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler im Handshake");
                None
            }
            None => {
                tracing::debug!(peer = %peer_addr, "Verbindung vor dem Handshake getrennt");
                None
            }
        }
    }
}
