//! Wire-Format fuer die TCP-Verbindung
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//!
//! ```text
//! +--------+--------+--------+--------+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    |
//! +--------+--------+--------+--------+----...----+
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Signaling-Events sind klein, das Limit liegt daher bei 64 KiB.
//!
//! Zwei Codecs fuer die beiden Verbindungsenden:
//! - `ServerCodec`: dekodiert `ClientEvent`, kodiert `ServerEvent`
//! - `ClientCodec`: dekodiert `ServerEvent`, kodiert `ClientEvent`

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::events::{ClientEvent, ServerEvent};

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (64 KiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Gemeinsame Frame-Logik
// ---------------------------------------------------------------------------

/// Dekodiert ein Frame aus dem Buffer, falls vollstaendig vorhanden
fn frame_dekodieren<T: DeserializeOwned>(
    src: &mut BytesMut,
    max_frame_size: usize,
) -> io::Result<Option<T>> {
    // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
    if src.len() < LENGTH_FIELD_SIZE {
        return Ok(None);
    }

    // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
    let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

    if length > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                length, max_frame_size
            ),
        ));
    }

    // Pruefen ob der vollstaendige Frame bereits im Buffer ist
    let total_size = LENGTH_FIELD_SIZE + length;
    if src.len() < total_size {
        src.reserve(total_size - src.len());
        return Ok(None);
    }

    // Laengen-Feld verbrauchen, Payload extrahieren
    src.advance(LENGTH_FIELD_SIZE);
    let payload = src.split_to(length);

    let event: T = serde_json::from_slice(&payload).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("JSON-Deserialisierung fehlgeschlagen: {}", e),
        )
    })?;

    Ok(Some(event))
}

/// Kodiert ein Frame in den Buffer
fn frame_kodieren<T: Serialize>(
    item: &T,
    dst: &mut BytesMut,
    max_frame_size: usize,
) -> io::Result<()> {
    let json = serde_json::to_vec(item).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("JSON-Serialisierung fehlgeschlagen: {}", e),
        )
    })?;

    if json.len() > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Event zu gross: {} Bytes (Maximum: {} Bytes)",
                json.len(),
                max_frame_size
            ),
        ));
    }

    dst.reserve(LENGTH_FIELD_SIZE + json.len());
    dst.put_u32(json.len() as u32);
    dst.put_slice(&json);

    Ok(())
}

// ---------------------------------------------------------------------------
// ServerCodec
// ---------------------------------------------------------------------------

/// Codec fuer die Server-Seite einer Signaling-Verbindung
///
/// Implementiert `Decoder` (Item = `ClientEvent`) und `Encoder<ServerEvent>`
/// fuer nahtlose Integration mit `tokio_util::codec::Framed`.
#[derive(Debug, Clone)]
pub struct ServerCodec {
    max_frame_size: usize,
}

impl ServerCodec {
    /// Erstellt einen neuen `ServerCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Erstellt einen `ServerCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = ClientEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        frame_dekodieren(src, self.max_frame_size)
    }
}

impl Encoder<ServerEvent> for ServerCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ServerEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame_kodieren(&item, dst, self.max_frame_size)
    }
}

// ---------------------------------------------------------------------------
// ClientCodec
// ---------------------------------------------------------------------------

/// Codec fuer die Client-Seite – Spiegelbild des `ServerCodec`
///
/// Wird von Test-Clients und Client-Implementierungen verwendet.
#[derive(Debug, Clone)]
pub struct ClientCodec {
    max_frame_size: usize,
}

impl ClientCodec {
    /// Erstellt einen neuen `ClientCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = ServerEvent;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        frame_dekodieren(src, self.max_frame_size)
    }
}

impl Encoder<ClientEvent> for ClientCodec {
    type Error = io::Error;

    fn encode(&mut self, item: ClientEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame_kodieren(&item, dst, self.max_frame_size)
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen fuer direktes async Lesen/Schreiben
// ---------------------------------------------------------------------------

/// Liest ein einzelnes Frame aus einem `AsyncRead`
///
/// # Fehler
/// - `UnexpectedEof` wenn die Verbindung vor Abschluss des Frames getrennt wird
/// - `InvalidData` bei ungueltigem JSON oder zu grossem Frame
pub async fn read_frame<R, T>(reader: &mut R, max_frame_size: usize) -> io::Result<T>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; LENGTH_FIELD_SIZE];
    reader.read_exact(&mut len_buf).await?;
    let length = u32::from_be_bytes(len_buf) as usize;

    if length > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                length, max_frame_size
            ),
        ));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload).await?;

    serde_json::from_slice(&payload).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("JSON-Deserialisierung fehlgeschlagen: {}", e),
        )
    })
}

/// Schreibt ein einzelnes Frame in einen `AsyncWrite`
///
/// # Fehler
/// - `InvalidData` wenn das Event nicht serialisiert werden kann oder zu gross ist
/// - IO-Fehler beim Schreiben
pub async fn write_frame<W, T>(writer: &mut W, event: &T, max_frame_size: usize) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(event).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidData,
            format!("JSON-Serialisierung fehlgeschlagen: {}", e),
        )
    })?;

    if json.len() > max_frame_size {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "Event zu gross: {} Bytes (Maximum: {} Bytes)",
                json.len(),
                max_frame_size
            ),
        ));
    }

    let len_bytes = (json.len() as u32).to_be_bytes();
    writer.write_all(&len_bytes).await?;
    writer.write_all(&json).await?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
