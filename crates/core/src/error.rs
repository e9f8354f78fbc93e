//! Fehlertypen fuer Visavis
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `#[from]` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Visavis
pub type Result<T> = std::result::Result<T, VisavisError>;

/// Alle moeglichen Fehler im Visavis-System
#[derive(Debug, Error)]
pub enum VisavisError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Identitaet ---
    #[error("Identitaet abgelehnt: {0}")]
    IdentitaetAbgelehnt(String),

    #[error("Identitaet fehlt im Handshake")]
    IdentitaetFehlt,

    // --- Protokoll ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl VisavisError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler wiederholbar sein koennte
    pub fn ist_wiederholbar(&self) -> bool {
        matches!(
            self,
            Self::Zeitlimit(_) | Self::Verbindung(_) | Self::Getrennt(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = VisavisError::IdentitaetAbgelehnt("unbekannter Benutzer".into());
        assert_eq!(e.to_string(), "Identitaet abgelehnt: unbekannter Benutzer");
    }

    #[test]
    fn wiederholbar_erkennung() {
        assert!(VisavisError::Zeitlimit("test".into()).ist_wiederholbar());
        assert!(!VisavisError::IdentitaetFehlt.ist_wiederholbar());
    }
}
