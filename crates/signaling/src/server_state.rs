//! Gemeinsamer Server-Zustand fuer den Signaling-Kern
//!
//! Haelt Registry, Broadcaster und Router als geteilte Referenzen, die
//! sicher zwischen tokio-Tasks geteilt werden koennen. Der Zustand lebt
//! vom Serverstart bis zum Stop; nichts davon wird persistiert – ein
//! Neustart entspricht dem Trennen saemtlicher Clients.

use std::sync::Arc;
use std::time::Instant;

use crate::identity::IdentitaetsPruefer;
use crate::presence::PresenceBroadcaster;
use crate::registry::ConnectionRegistry;
use crate::router::CallRouter;

/// Konfiguration fuer den Signaling-Kern
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: u32,
    /// Frist fuer das `hello`-Frame nach Verbindungsaufbau in Sekunden
    pub handshake_timeout_sek: u64,
    /// Intervall fuer Server-Keepalive-Pings und Inaktivitaets-Pruefung
    /// in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            server_name: "Visavis Server".to_string(),
            max_clients: 512,
            handshake_timeout_sek: 10,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
///
/// Generisch ueber den Identitaets-Pruefer, damit Tests und Deployments
/// eigene Anbindungen einhaengen koennen.
pub struct SignalingState<I>
where
    I: IdentitaetsPruefer,
{
    /// Server-Konfiguration
    pub config: Arc<SignalingConfig>,
    /// Schnittstelle zum externen Identitaetsdienst
    pub identitaet: Arc<I>,
    /// Connection-Registry (Identitaet -> Verbindungen)
    pub registry: ConnectionRegistry,
    /// Presence-Broadcaster (Online-Liste verteilen)
    pub presence: PresenceBroadcaster,
    /// Call-Router (Call-Control-Events vermitteln)
    pub router: CallRouter,
    /// Startzeitpunkt des Servers (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl<I> SignalingState<I>
where
    I: IdentitaetsPruefer,
{
    /// Erstellt einen neuen SignalingState
    pub fn neu(config: SignalingConfig, identitaet: Arc<I>) -> Arc<Self> {
        let registry = ConnectionRegistry::neu();
        Arc::new(Self {
            config: Arc::new(config),
            identitaet,
            presence: PresenceBroadcaster::neu(registry.clone()),
            router: CallRouter::neu(registry.clone()),
            registry,
            start_time: Instant::now(),
        })
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
