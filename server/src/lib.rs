//! visavis-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use visavis_signaling::{HandshakeIdentitaet, SignalingServer, SignalingState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet den Signaling-Server und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Signaling-Zustand aufbauen (Registry, Broadcaster, Router)
    /// 2. TCP-Listener starten
    /// 3. Auf Ctrl-C warten, dann Shutdown an alle Verbindungen signalisieren
    pub async fn starten(self) -> Result<()> {
        let bind_addr: SocketAddr = self
            .config
            .tcp_bind_adresse()
            .parse()
            .map_err(|e| anyhow::anyhow!("Ungueltige Bind-Adresse: {e}"))?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %bind_addr,
            max_clients = self.config.server.max_clients,
            "Server startet"
        );

        let state = SignalingState::neu(
            self.config.signaling_config(),
            Arc::new(HandshakeIdentitaet),
        );

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let signaling = SignalingServer::neu(state, bind_addr);
        let server_task = tokio::spawn(signaling.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        shutdown_tx.send(true)?;
        server_task.await??;

        Ok(())
    }
}
