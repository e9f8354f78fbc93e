//! Gemeinsame Identifikationstypen fuer Visavis
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! verschiedenen ID-Arten zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stabile Benutzer-Identitaet
///
/// Wird vom externen Identitaetsdienst vergeben und beim Verbindungsaufbau
/// mitgeliefert. Der Kern erzeugt oder verwaltet diese IDs nicht, er
/// beobachtet sie nur – daher ein opaker String statt einer eigenen UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Erstellt eine UserId aus einer extern vergebenen Kennung
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Gibt die Kennung als &str zurueck
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prueft ob die Kennung leer ist (ungueltige Identitaet)
    pub fn ist_leer(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

/// Eindeutige Verbindungs-ID
///
/// Wird vom Gateway pro akzeptierter Transport-Verbindung vergeben. Eine
/// Identitaet kann mehrere gleichzeitige Verbindungen halten (mehrere
/// Geraete/Tabs), jede mit eigener ConnectionId.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_ist_opak() {
        let a = UserId::new("u1");
        let b = UserId::from("u1");
        assert_eq!(a, b, "Gleiche Kennung muss gleiche UserId ergeben");
        assert_eq!(a.as_str(), "u1");
    }

    #[test]
    fn user_id_leer_erkennung() {
        assert!(UserId::new("").ist_leer());
        assert!(!UserId::new("u1").ist_leer());
    }

    #[test]
    fn user_id_serde_transparent() {
        let uid = UserId::new("u42");
        let json = serde_json::to_string(&uid).unwrap();
        assert_eq!(json, "\"u42\"", "UserId muss als blanker String serialisieren");
        let uid2: UserId = serde_json::from_str(&json).unwrap();
        assert_eq!(uid, uid2);
    }

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_display() {
        let id = ConnectionId(Uuid::nil());
        assert!(id.to_string().starts_with("conn:"));
    }
}
