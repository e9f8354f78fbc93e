//! Call-Router – Vermittelt Call-Control-Events zwischen zwei Parteien
//!
//! Der Router leitet `initiateCall`, `callResponse` und `endCall` an die
//! aktuellen Verbindungen des Ziels weiter (Fan-out an alle Geraete, da
//! der Server nicht wissen kann, auf welchem Geraet abgenommen wird).
//!
//! ## Anruf-Paare
//! Zusaetzlich zum reinen Weiterleiten merkt sich der Router pro
//! Teilnehmer das aktive Paar samt Phase (`Klingelt`/`Aktiv`). Damit kann
//! das Gateway beim abrupten Wegfall eines Teilnehmers die Gegenseite mit
//! `callEnded` informieren statt sie in einem Geisterruf haengen zu lassen.
//!
//! Es gibt keine Korrelations-ID ueber das Identitaets-Paar hinaus:
//! hoechstens ein offener Anruf pro Paar wird angenommen, parallele
//! Versuche auf demselben Paar bleiben unaufgeloest (Client-Sache).
//! Die Tabelle ist pro Teilnehmer gefuehrt, ein neuer Anruf ueberschreibt
//! den eigenen Eintrag; Aufraeumen beim Wegfall greift nur wenn der
//! Partner-Eintrag noch auf den Weggefallenen zurueckzeigt.
//! Ein klingelnder Anruf laeuft serverseitig nie ab; Timeouts fuer
//! unbeantwortete Anrufe sind Sache der Clients.

use dashmap::DashMap;
use std::sync::Arc;
use visavis_core::types::UserId;
use visavis_protocol::events::ServerEvent;

use crate::registry::ConnectionRegistry;

// ---------------------------------------------------------------------------
// Anruf-Zustand
// ---------------------------------------------------------------------------

/// Phase eines vermerkten Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufPhase {
    /// Einladung zugestellt, Antwort steht aus
    Klingelt,
    /// Einladung angenommen
    Aktiv,
}

/// Vermerkter Anruf aus Sicht eines Teilnehmers
#[derive(Debug, Clone)]
pub struct AktiverAnruf {
    pub partner: UserId,
    pub phase: AnrufPhase,
}

// ---------------------------------------------------------------------------
// CallRouter
// ---------------------------------------------------------------------------

/// Vermittelt Call-Control-Events ueber das Connection-Registry
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct CallRouter {
    inner: Arc<CallRouterInner>,
}

struct CallRouterInner {
    registry: ConnectionRegistry,
    /// Teilnehmer -> vermerkter Anruf (beide Richtungen eingetragen)
    anrufe: DashMap<UserId, AktiverAnruf>,
}

impl CallRouter {
    /// Erstellt einen neuen CallRouter ueber dem gegebenen Registry
    pub fn neu(registry: ConnectionRegistry) -> Self {
        Self {
            inner: Arc::new(CallRouterInner {
                registry,
                anrufe: DashMap::new(),
            }),
        }
    }

    /// Leitet eine Anruf-Einladung von `von` an alle Verbindungen von `zu`
    ///
    /// Gibt `false` zurueck wenn `zu` offline ist; dann wurde nichts
    /// zugestellt und kein Paar vermerkt (der Aufrufer entscheidet ueber
    /// ein `callFailed` an den Einleitenden). Sonst wird `incomingCall`
    /// an jedes Handle verteilt und das Paar als `Klingelt` vermerkt.
    pub fn einleiten(&self, von: &UserId, zu: &UserId) -> bool {
        let handles = self.inner.registry.verbindungen_von(zu);
        if handles.is_empty() {
            tracing::debug!(von = %von, zu = %zu, "Einladung an Offline-Ziel verworfen");
            return false;
        }

        let mut gesendet = 0;
        for handle in &handles {
            if handle.senden(ServerEvent::IncomingCall { from: von.clone() }) {
                gesendet += 1;
            }
        }

        self.paar_vermerken(von, zu, AnrufPhase::Klingelt);

        tracing::info!(
            von = %von,
            zu = %zu,
            geraete = handles.len(),
            gesendet,
            "Anruf-Einladung zugestellt"
        );
        true
    }

    /// Leitet die Antwort des Angerufenen an alle Verbindungen von `zu`
    /// (dem urspruenglichen Anrufer) weiter
    ///
    /// `angenommen == true` stuft das vermerkte Paar auf `Aktiv` hoch,
    /// `false` loescht es. Ist der Anrufer inzwischen offline, verpufft
    /// die Antwort (Fan-out an null Handles); das Paar wird trotzdem
    /// aktualisiert.
    pub fn antworten(&self, zu: &UserId, angenommen: bool) -> usize {
        let mut gesendet = 0;
        for handle in self.inner.registry.verbindungen_von(zu) {
            if handle.senden(ServerEvent::CallResponse {
                accepted: angenommen,
            }) {
                gesendet += 1;
            }
        }

        if angenommen {
            self.phase_setzen(zu, AnrufPhase::Aktiv);
        } else {
            self.paar_loeschen(zu);
        }

        tracing::info!(zu = %zu, angenommen, gesendet, "Anruf-Antwort zugestellt");
        gesendet
    }

    /// Leitet das Anruf-Ende an alle Verbindungen von `zu` weiter
    ///
    /// Loescht das vermerkte Paar fuer beide Seiten.
    pub fn beenden(&self, zu: &UserId) -> usize {
        let mut gesendet = 0;
        for handle in self.inner.registry.verbindungen_von(zu) {
            if handle.senden(ServerEvent::CallEnded) {
                gesendet += 1;
            }
        }

        self.paar_loeschen(zu);

        tracing::info!(zu = %zu, gesendet, "Anruf-Ende zugestellt");
        gesendet
    }

    /// Behandelt den endgueltigen Wegfall eines Teilnehmers
    ///
    /// Wird vom Gateway gerufen wenn die letzte Verbindung einer Identitaet
    /// geschlossen wurde. Steckt der Teilnehmer in einem vermerkten Anruf,
    /// bekommt die Gegenseite `callEnded` und das Paar wird geloescht.
    /// Gibt die informierte Gegenseite zurueck.
    pub fn teilnehmer_weggefallen(&self, user_id: &UserId) -> Option<UserId> {
        let partner = {
            let eintrag = self.inner.anrufe.get(user_id)?;
            eintrag.partner.clone()
        };

        self.inner.anrufe.remove(user_id);

        // Nur aufraeumen wenn der Partner-Eintrag noch zurueckzeigt;
        // ein veralteter Eintrag darf einen inzwischen neu vermerkten
        // Anruf des Partners nicht kappen
        let zeigt_zurueck = self
            .inner
            .anrufe
            .get(&partner)
            .map(|e| &e.partner == user_id)
            .unwrap_or(false);
        if !zeigt_zurueck {
            tracing::debug!(
                weggefallen = %user_id,
                partner = %partner,
                "Veralteter Anruf-Eintrag verworfen"
            );
            return None;
        }

        self.inner.anrufe.remove(&partner);

        let mut gesendet = 0;
        for handle in self.inner.registry.verbindungen_von(&partner) {
            if handle.senden(ServerEvent::CallEnded) {
                gesendet += 1;
            }
        }

        tracing::info!(
            weggefallen = %user_id,
            partner = %partner,
            gesendet,
            "Teilnehmer weggefallen – Gegenseite informiert"
        );
        Some(partner)
    }

    /// Gibt den vermerkten Anruf eines Teilnehmers zurueck
    pub fn anruf_von(&self, user_id: &UserId) -> Option<AktiverAnruf> {
        self.inner.anrufe.get(user_id).map(|e| e.clone())
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    fn paar_vermerken(&self, a: &UserId, b: &UserId, phase: AnrufPhase) {
        self.inner.anrufe.insert(
            a.clone(),
            AktiverAnruf {
                partner: b.clone(),
                phase,
            },
        );
        self.inner.anrufe.insert(
            b.clone(),
            AktiverAnruf {
                partner: a.clone(),
                phase,
            },
        );
    }

    fn phase_setzen(&self, teilnehmer: &UserId, phase: AnrufPhase) {
        let partner = match self.inner.anrufe.get_mut(teilnehmer) {
            Some(mut eintrag) => {
                eintrag.phase = phase;
                eintrag.partner.clone()
            }
            None => return,
        };
        if let Some(mut eintrag) = self.inner.anrufe.get_mut(&partner) {
            eintrag.phase = phase;
        }
    }

    fn paar_loeschen(&self, teilnehmer: &UserId) {
        let partner = {
            match self.inner.anrufe.get(teilnehmer) {
                Some(eintrag) => eintrag.partner.clone(),
                None => return,
            }
        };
        self.inner.anrufe.remove(teilnehmer);
        self.inner.anrufe.remove(&partner);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ConnectionHandle;
    use tokio::sync::mpsc;
    use visavis_core::types::ConnectionId;

    fn aufbau() -> (ConnectionRegistry, CallRouter) {
        let registry = ConnectionRegistry::neu();
        let router = CallRouter::neu(registry.clone());
        (registry, router)
    }

    fn verbinden(
        registry: &ConnectionRegistry,
        id: &str,
    ) -> mpsc::Receiver<ServerEvent> {
        let (handle, rx) = ConnectionHandle::neu(ConnectionId::new());
        registry.registrieren(UserId::new(id), handle);
        rx
    }

    #[test]
    fn einladung_erreicht_alle_geraete() {
        let (registry, router) = aufbau();
        let mut rx1 = verbinden(&registry, "u2");
        let mut rx2 = verbinden(&registry, "u2");

        assert!(router.einleiten(&UserId::new("u1"), &UserId::new("u2")));

        for rx in [&mut rx1, &mut rx2] {
            let event = rx.try_recv().expect("incomingCall erwartet");
            assert_eq!(
                event,
                ServerEvent::IncomingCall {
                    from: UserId::new("u1")
                }
            );
        }
    }

    #[test]
    fn einladung_an_offline_ziel_ist_noop() {
        let (_registry, router) = aufbau();

        let zugestellt = router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        assert!(!zugestellt);
        assert!(
            router.anruf_von(&UserId::new("u1")).is_none(),
            "Kein Paar ohne Zustellung"
        );
    }

    #[test]
    fn einladung_vermerkt_klingelndes_paar() {
        let (registry, router) = aufbau();
        let _rx = verbinden(&registry, "u2");

        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));

        let anruf = router.anruf_von(&UserId::new("u1")).expect("Paar erwartet");
        assert_eq!(anruf.partner, UserId::new("u2"));
        assert_eq!(anruf.phase, AnrufPhase::Klingelt);

        let gegenrichtung = router.anruf_von(&UserId::new("u2")).expect("Paar erwartet");
        assert_eq!(gegenrichtung.partner, UserId::new("u1"));
    }

    #[test]
    fn annahme_stuft_auf_aktiv_hoch() {
        let (registry, router) = aufbau();
        let mut rx_anrufer = verbinden(&registry, "u1");
        let _rx_angerufener = verbinden(&registry, "u2");

        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        let gesendet = router.antworten(&UserId::new("u1"), true);
        assert_eq!(gesendet, 1);

        assert_eq!(
            rx_anrufer.try_recv().unwrap(),
            ServerEvent::CallResponse { accepted: true }
        );
        assert_eq!(
            router.anruf_von(&UserId::new("u1")).unwrap().phase,
            AnrufPhase::Aktiv
        );
        assert_eq!(
            router.anruf_von(&UserId::new("u2")).unwrap().phase,
            AnrufPhase::Aktiv
        );
    }

    #[test]
    fn ablehnung_loescht_das_paar() {
        let (registry, router) = aufbau();
        let mut rx_anrufer = verbinden(&registry, "u1");
        let _rx_angerufener = verbinden(&registry, "u2");

        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        router.antworten(&UserId::new("u1"), false);

        assert_eq!(
            rx_anrufer.try_recv().unwrap(),
            ServerEvent::CallResponse { accepted: false }
        );
        assert!(router.anruf_von(&UserId::new("u1")).is_none());
        assert!(router.anruf_von(&UserId::new("u2")).is_none());
    }

    #[test]
    fn beenden_raeumt_beide_seiten_auf() {
        let (registry, router) = aufbau();
        let _rx1 = verbinden(&registry, "u1");
        let mut rx2 = verbinden(&registry, "u2");

        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        router.antworten(&UserId::new("u1"), true);
        let gesendet = router.beenden(&UserId::new("u2"));
        assert_eq!(gesendet, 1);

        // u2 bekommt Einladung, dann das Ende
        assert!(matches!(
            rx2.try_recv().unwrap(),
            ServerEvent::IncomingCall { .. }
        ));
        assert_eq!(rx2.try_recv().unwrap(), ServerEvent::CallEnded);
        assert!(router.anruf_von(&UserId::new("u1")).is_none());
        assert!(router.anruf_von(&UserId::new("u2")).is_none());
    }

    #[test]
    fn wegfall_informiert_gegenseite() {
        let (registry, router) = aufbau();
        let _rx1 = verbinden(&registry, "u1");
        let mut rx2 = verbinden(&registry, "u2");

        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        router.antworten(&UserId::new("u1"), true);

        let partner = router.teilnehmer_weggefallen(&UserId::new("u1"));
        assert_eq!(partner, Some(UserId::new("u2")));

        // u2: Einladung, dann das Ende durch den Wegfall
        assert!(matches!(
            rx2.try_recv().unwrap(),
            ServerEvent::IncomingCall { .. }
        ));
        assert_eq!(rx2.try_recv().unwrap(), ServerEvent::CallEnded);
        assert!(router.anruf_von(&UserId::new("u2")).is_none());
    }

    #[test]
    fn veralteter_eintrag_kappt_neuen_anruf_nicht() {
        let (registry, router) = aufbau();
        let mut rx1 = verbinden(&registry, "u1");
        let _rx2 = verbinden(&registry, "u2");
        let _rx3 = verbinden(&registry, "u3");

        // u1 ruft erst u2 an, dann u3: u2 behaelt einen veralteten
        // Eintrag der noch auf u1 zeigt
        router.einleiten(&UserId::new("u1"), &UserId::new("u2"));
        router.einleiten(&UserId::new("u1"), &UserId::new("u3"));

        // u2 faellt weg: der laufende Anruf u1-u3 bleibt unberuehrt,
        // u1 bekommt kein Anruf-Ende
        assert!(router.teilnehmer_weggefallen(&UserId::new("u2")).is_none());
        assert!(rx1.try_recv().is_err(), "u1 darf kein callEnded bekommen");

        let anruf = router.anruf_von(&UserId::new("u1")).expect("Paar erwartet");
        assert_eq!(anruf.partner, UserId::new("u3"));
        assert!(router.anruf_von(&UserId::new("u2")).is_none());
    }

    #[test]
    fn wegfall_ohne_anruf_ist_noop() {
        let (_registry, router) = aufbau();
        assert!(router.teilnehmer_weggefallen(&UserId::new("u1")).is_none());
    }
}
