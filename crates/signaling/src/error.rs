//! Fehlertypen fuer den Signaling-Kern

use thiserror::Error;

/// Fehlertyp fuer den Signaling-Kern
#[derive(Debug, Error)]
pub enum SignalingError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake fehlt oder kam nicht als erstes Frame
    #[error("Handshake erwartet: erstes Frame muss `hello` sein")]
    HandshakeErwartet,

    /// Identitaet fehlt im Handshake
    #[error("Identitaet fehlt im Handshake")]
    IdentitaetFehlt,

    /// Identitaet vom Identitaetsdienst abgelehnt
    #[error("Identitaet abgelehnt: {0}")]
    IdentitaetAbgelehnt(String),

    /// Protokollfehler (ungueltiges Frame, falscher Zustand)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Senden an Client fehlgeschlagen (Queue voll oder geschlossen)
    #[error("Senden fehlgeschlagen")]
    SendFehler,

    /// Timeout (Handshake, Keepalive)
    #[error("Timeout")]
    Timeout,

    /// Server ist voll
    #[error("Server ist voll")]
    ServerVoll,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Erstellt einen Protokollfehler
    pub fn protokoll(msg: impl Into<String>) -> Self {
        Self::Protokoll(msg.into())
    }
}

/// Result-Typ fuer den Signaling-Kern
pub type SignalingResult<T> = Result<T, SignalingError>;
