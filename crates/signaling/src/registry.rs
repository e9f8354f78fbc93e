//! Connection-Registry – Verwaltet Identitaet -> Verbindungen
//!
//! Das Registry haelt pro Identitaet die Menge der aktuell offenen
//! Verbindungen (ein Benutzer kann mehrere Geraete/Tabs offen haben).
//!
//! ## Invarianten
//! - Eine Verbindung haengt zu jedem Zeitpunkt unter hoechstens einer
//!   Identitaet
//! - Kein Eintrag ohne Verbindung: faellt die letzte Verbindung einer
//!   Identitaet weg, wird der Eintrag geloescht (Identitaet ist offline)
//! - Die Online-Menge ist immer die aktuelle Schluesselmenge, nie ein Cache

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use visavis_core::types::{ConnectionId, UserId};
use visavis_protocol::events::ServerEvent;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ConnectionHandle
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer offenen Verbindung
///
/// Der Verbindungs-Task haelt die Empfangsseite der Queue und schreibt
/// die Events auf den TCP-Stream.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerEvent>,
}

impl ConnectionHandle {
    /// Erstellt ein Handle samt zugehoeriger Empfangs-Queue
    pub fn neu(connection_id: ConnectionId) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        (Self { connection_id, tx }, rx)
    }

    /// Sendet ein Event nicht-blockierend an die Verbindung
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    /// Jeder Send ist best-effort; ein Fehlschlag betrifft nur diese
    /// eine Verbindung.
    pub fn senden(&self, event: ServerEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.connection_id, "Send-Queue voll – Event verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %self.connection_id, "Send-Queue geschlossen (Verbindung getrennt)");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionRegistry
// ---------------------------------------------------------------------------

/// Verwaltet die offenen Verbindungen aller Identitaeten
///
/// Thread-safe via Arc + DashMap. Clone des Registrys teilt den inneren
/// Zustand. Wird beim Serverstart erzeugt und lebt bis zum Stop; ein
/// Neustart entspricht dem Trennen saemtlicher Clients.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<ConnectionRegistryInner>,
}

struct ConnectionRegistryInner {
    /// Offene Verbindungen, indiziert nach Identitaet
    verbindungen: DashMap<UserId, Vec<ConnectionHandle>>,
}

impl ConnectionRegistry {
    /// Erstellt ein neues, leeres Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(ConnectionRegistryInner {
                verbindungen: DashMap::new(),
            }),
        }
    }

    /// Registriert eine Verbindung unter einer Identitaet
    ///
    /// Idempotent pro `ConnectionId`: dieselbe Verbindung ein zweites Mal
    /// zu registrieren ist ein No-op.
    pub fn registrieren(&self, user_id: UserId, handle: ConnectionHandle) {
        let mut eintrag = self.inner.verbindungen.entry(user_id.clone()).or_default();
        if eintrag
            .iter()
            .any(|h| h.connection_id == handle.connection_id)
        {
            return;
        }
        eintrag.push(handle);

        tracing::info!(
            user_id = %user_id,
            verbindungen = eintrag.len(),
            "Verbindung registriert"
        );
    }

    /// Entfernt eine Verbindung einer Identitaet
    ///
    /// Idempotent: eine bereits entfernte Verbindung erneut zu entfernen
    /// ist ein No-op. Gibt `true` zurueck wenn damit die letzte Verbindung
    /// wegfiel und die Identitaet offline gegangen ist.
    pub fn entfernen(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        {
            let mut eintrag = match self.inner.verbindungen.get_mut(user_id) {
                Some(e) => e,
                None => return false,
            };
            eintrag.retain(|h| &h.connection_id != connection_id);
        }

        // Leer-Pruefung und Loeschung muessen atomar unter dem Shard-Lock
        // laufen: ein paralleles registrieren derselben Identitaet darf
        // zwischen retain und remove keinen frischen Handle verlieren
        let offline = self
            .inner
            .verbindungen
            .remove_if(user_id, |_, handles| handles.is_empty())
            .is_some();

        if offline {
            tracing::info!(user_id = %user_id, "Letzte Verbindung entfernt – Identitaet offline");
        } else {
            tracing::debug!(user_id = %user_id, connection_id = %connection_id, "Verbindung entfernt");
        }

        offline
    }

    /// Gibt einen Schnappschuss der Verbindungen einer Identitaet zurueck
    ///
    /// Leer bedeutet offline. Keine Ordnungsgarantie unter den Handles.
    pub fn verbindungen_von(&self, user_id: &UserId) -> Vec<ConnectionHandle> {
        self.inner
            .verbindungen
            .get(user_id)
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Gibt alle Identitaeten mit mindestens einer Verbindung zurueck
    pub fn online_identitaeten(&self) -> Vec<UserId> {
        self.inner
            .verbindungen
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }

    /// Prueft ob eine Identitaet online ist
    pub fn ist_online(&self, user_id: &UserId) -> bool {
        self.inner.verbindungen.contains_key(user_id)
    }

    /// Gibt die Anzahl der Identitaeten online zurueck
    pub fn online_anzahl(&self) -> usize {
        self.inner.verbindungen.len()
    }

    /// Gibt die Gesamtzahl offener Verbindungen zurueck
    pub fn verbindungs_anzahl(&self) -> usize {
        self.inner
            .verbindungen
            .iter()
            .map(|e| e.value().len())
            .sum()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
