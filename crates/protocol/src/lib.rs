//! visavis-protocol – Wire-Protokoll fuer die Signaling-Verbindung
//!
//! Definiert die Events die zwischen Client und Server ausgetauscht werden
//! sowie das Frame-Format fuer die TCP-Verbindung.
//!
//! ## Design
//! - Event-basiert, keine Request/Response-Korrelation: Call-Control-Events
//!   werden nur ueber das Identitaets-Paar zugeordnet
//! - Tagged Enums (`type`-Feld, camelCase) fuer typsichere Events
//! - JSON-Serialisierung via serde, Length-Prefix-Framing via tokio-util

pub mod events;
pub mod wire;

// Bequeme Re-Exporte
pub use events::{ClientEvent, ErrorCode, ServerEvent};
pub use wire::{ClientCodec, ServerCodec, DEFAULT_MAX_FRAME_SIZE};
