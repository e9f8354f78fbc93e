//! Identitaets-Schnittstelle – Anbindung an den externen Identitaetsdienst
//!
//! Der Kern vergibt keine Identitaeten; er bekommt sie beim Handshake
//! mitgeliefert. Die eigentliche Anmeldung (Credentials, Sessions) laeuft
//! ausserhalb dieses Prozesses. `IdentitaetsPruefer` ist die Naht an der
//! eine echte Anbindung eingehaengt wird.

use visavis_core::types::UserId;

use crate::error::{SignalingError, SignalingResult};

/// Prueft die im Handshake angebotene Identitaet
///
/// Implementierungen muessen synchron und frei von blockierendem I/O sein –
/// die Pruefung laeuft im Verbindungs-Task vor der Registrierung.
pub trait IdentitaetsPruefer: Send + Sync + 'static {
    /// Prueft `user_id` (und optionalen Nachweis) und gibt die bestaetigte
    /// Identitaet zurueck
    ///
    /// Ein Fehler lehnt den Verbindungsaufbau ab; die Verbindung erreicht
    /// dann nie das Registry.
    fn pruefen(&self, user_id: &UserId, token: Option<&str>) -> SignalingResult<UserId>;
}

/// Standard-Pruefer: akzeptiert jede nicht-leere Identitaet
///
/// Entspricht dem Vertrauensmodell des Transports: die Kennung wurde vom
/// vorgelagerten Identitaetsdienst vergeben und kommt als Handshake-Metadatum
/// mit. Eine leere Kennung ist nie gueltig.
#[derive(Debug, Clone, Default)]
pub struct HandshakeIdentitaet;

impl IdentitaetsPruefer for HandshakeIdentitaet {
    fn pruefen(&self, user_id: &UserId, _token: Option<&str>) -> SignalingResult<UserId> {
        if user_id.ist_leer() {
            return Err(SignalingError::IdentitaetFehlt);
        }
        Ok(user_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nicht_leere_identitaet_wird_akzeptiert() {
        let pruefer = HandshakeIdentitaet;
        let uid = pruefer.pruefen(&UserId::new("u1"), None).unwrap();
        assert_eq!(uid, UserId::new("u1"));
    }

    #[test]
    fn leere_identitaet_wird_abgelehnt() {
        let pruefer = HandshakeIdentitaet;
        let result = pruefer.pruefen(&UserId::new(""), None);
        assert!(matches!(result, Err(SignalingError::IdentitaetFehlt)));
    }
}
