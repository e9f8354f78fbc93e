//! Presence-Broadcaster – Verteilt die Online-Liste an alle Clients
//!
//! Kein Diff/Delta-Protokoll: jede Aenderung verschickt die vollstaendige
//! aktuelle Online-Menge und ersetzt damit die clientseitige Kopie.
//!
//! Ausgeloest genau bei:
//! - einer neu registrierten Verbindung (das neue Geraet braucht seinen
//!   ersten Schnappschuss)
//! - dem Wegfall der letzten Verbindung einer Identitaet
//!
//! Schliesst ein Zweitgeraet und bleibt die Identitaet online, aendert
//! sich die Menge nicht und es wird nichts verschickt.

use visavis_protocol::events::ServerEvent;

use crate::registry::ConnectionRegistry;

/// Verteilt die abgeleitete Online-Menge an alle Verbindungen
///
/// Reiner Leser des Registrys; haelt selbst keinen Zustand.
#[derive(Clone)]
pub struct PresenceBroadcaster {
    registry: ConnectionRegistry,
}

impl PresenceBroadcaster {
    /// Erstellt einen neuen PresenceBroadcaster ueber dem gegebenen Registry
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    /// Sendet die aktuelle Online-Liste an jede registrierte Verbindung
    ///
    /// Jeder Send ist unabhaengig und best-effort: eine volle oder
    /// geschlossene Queue wird uebersprungen und bricht die Verteilung an
    /// die uebrigen Verbindungen nicht ab. Gibt die Anzahl der
    /// erfolgreichen Sends zurueck.
    pub fn online_liste_senden(&self) -> usize {
        let online = self.registry.online_identitaeten();

        let mut gesendet = 0;
        for user_id in &online {
            for handle in self.registry.verbindungen_von(user_id) {
                if handle.senden(ServerEvent::GetOnlineUsers {
                    users: online.clone(),
                }) {
                    gesendet += 1;
                }
            }
        }

        tracing::debug!(
            online = online.len(),
            gesendet,
            "Online-Liste verteilt"
        );
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
