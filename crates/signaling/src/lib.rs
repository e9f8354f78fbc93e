//! visavis-signaling – Presence- und Call-Signaling-Koordinator
//!
//! Dieser Crate implementiert den Kern von Visavis: er verwaltet die
//! Verbindungen aller angemeldeten Benutzer, verteilt den Online-Status
//! und vermittelt Call-Control-Events zwischen genau zwei Parteien eines
//! Anrufs. Medienaushandlung (ICE/SDP) laeuft ausserhalb; die Events hier
//! sind nur der Ausloeser dafuer.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  Handshake: erstes Frame muss `hello` sein
//!     |
//!     v
//! EventDispatcher
//!     |
//!     +-- ConnectionRegistry    (UserId -> Verbindungen, Online-Menge)
//!     +-- PresenceBroadcaster   (Online-Liste an alle verteilen)
//!     +-- CallRouter            (initiateCall / callResponse / endCall
//!                                vermitteln, aktive Paare verfolgen)
//!
//! IdentitaetsPruefer – Schnittstelle zum externen Identitaetsdienst
//! ```
//!
//! ## Konsistenz
//! Eine Identitaet kann mehrere gleichzeitige Verbindungen halten; jedes
//! Call-Control-Event wird an alle Verbindungen des Ziels verteilt
//! (Fan-out). Die Online-Menge ist strikt aus dem Registry-Inhalt
//! abgeleitet – ein Eintrag verschwindet mit seiner letzten Verbindung.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod presence;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use connection::ClientConnection;
pub use dispatcher::EventDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use identity::{HandshakeIdentitaet, IdentitaetsPruefer};
pub use presence::PresenceBroadcaster;
pub use registry::{ConnectionHandle, ConnectionRegistry};
pub use router::CallRouter;
pub use server_state::{SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
