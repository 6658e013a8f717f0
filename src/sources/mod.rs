pub mod direct;
pub mod resolver;
pub mod spotify;
pub mod token;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::model::id::UserId;

use crate::connection::AudioStream;

pub use direct::DirectUrlSource;
pub use resolver::{SearchSelector, TrackResolver};
pub use spotify::{CatalogApi, CatalogCollection, CatalogTrack, SpotifyCatalog};
pub use token::{TokenGrant, TokenManager, TokenProvider};

/// Origen de un track dentro del conjunto cerrado de variantes.
///
/// Reemplaza los objetos "con forma de canción" ad hoc por fuente: el
/// controlador y el resolver operan sobre este discriminante único.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Enlace directo al proveedor de media (video/audio con metadata).
    DirectMedia,
    /// Resultado de búsqueda de texto libre, ya streameable.
    SearchResult,
    /// Entrada de catálogo sin fuente streameable; se re-resuelve al llegar
    /// a la cabeza de la cola, nunca se streamea directamente.
    CatalogPending,
    /// URL de stream arbitraria (radio, archivo remoto).
    ExternalStream,
    /// Emisión en vivo, duración desconocida.
    Live,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::DirectMedia => "media",
            SourceKind::SearchResult => "search",
            SourceKind::CatalogPending => "catalog",
            SourceKind::ExternalStream => "stream",
            SourceKind::Live => "live",
        }
    }

    /// `true` si el track puede abrirse como stream sin re-resolución.
    pub fn is_streamable(&self) -> bool {
        !matches!(self, SourceKind::CatalogPending)
    }
}

/// Unidad reproducible normalizada.
#[derive(Debug, Clone)]
pub struct Track {
    /// Identificador dentro del proveedor de origen.
    pub id: String,
    pub kind: SourceKind,
    pub title: String,
    pub artist: Option<String>,
    /// Duración; cero cuando es desconocida o en vivo.
    pub duration: Duration,
    /// URL canónica del track.
    pub url: String,
    /// URL de transporte ya resuelta, si el adaptador la conoce.
    pub stream_url: Option<String>,
    pub thumbnail: Option<String>,
    pub requested_by: UserId,
    /// Candidatos relacionados para autoplay, poblados de forma perezosa.
    pub related: Option<Vec<Track>>,
    /// Instante en que comenzó la reproducción de esta instancia.
    pub started_at: Option<DateTime<Utc>>,
    pub added_at: DateTime<Utc>,
}

impl Track {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        kind: SourceKind,
        requested_by: UserId,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            title: title.into(),
            artist: None,
            duration: Duration::ZERO,
            url: url.into(),
            stream_url: None,
            thumbnail: None,
            requested_by,
            related: None,
            started_at: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_stream_url(mut self, stream_url: impl Into<String>) -> Self {
        self.stream_url = Some(stream_url.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn with_related(mut self, related: Vec<Track>) -> Self {
        self.related = Some(related);
        self
    }

    /// `true` si el track tiene metadata de duración utilizable.
    pub fn has_usable_duration(&self) -> bool {
        !self.duration.is_zero()
            || matches!(self.kind, SourceKind::Live | SourceKind::ExternalStream)
    }

    /// Duración formateada para la UI ("3m 25s"); "en vivo" sin duración.
    pub fn formatted_duration(&self) -> String {
        if self.duration.is_zero() {
            "en vivo".to_string()
        } else {
            humantime::format_duration(self.duration).to_string()
        }
    }

    /// Tiempo transcurrido desde el inicio de la reproducción.
    pub fn elapsed(&self) -> Option<Duration> {
        let started = self.started_at?;
        (Utc::now() - started).to_std().ok()
    }
}

/// Colección ordenada de tracks resuelta de una sola entrada.
#[derive(Debug, Clone)]
pub struct Playlist {
    pub title: String,
    pub url: Option<String>,
    pub tracks: Vec<Track>,
    pub requested_by: UserId,
}

impl Playlist {
    pub fn total_duration(&self) -> Duration {
        self.tracks.iter().map(|t| t.duration).sum()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Resultado de resolución: un track suelto o una playlist ordenada.
#[derive(Debug, Clone)]
pub enum Resolved {
    Track(Track),
    Playlist(Playlist),
}

/// Adaptador de fuente: traduce entrada cruda a tracks y abre streams.
///
/// Los clientes de catálogo/búsqueda que hay detrás (red, auth, paginación)
/// son colaboradores externos; el adaptador solo normaliza.
#[async_trait]
pub trait MusicSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    /// ¿Este adaptador puede resolver la entrada?
    fn matches(&self, input: &str) -> bool;

    /// Resuelve la entrada a un track o playlist normalizado.
    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved>;

    /// Abre el stream de bytes para un track de este adaptador.
    async fn open_stream(&self, track: &Track, filter_args: Option<&str>) -> Result<AudioStream>;

    /// Búsqueda de texto libre; solo el proveedor de media la soporta.
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<Track>> {
        anyhow::bail!("búsqueda no soportada por {}", self.source_name())
    }

    /// Tracks relacionados para autoplay.
    async fn related(&self, _track: &Track) -> Result<Vec<Track>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn track(kind: SourceKind, secs: u64) -> Track {
        Track::new("x", "x", "https://example.com/x", kind, UserId::new(1))
            .with_duration(Duration::from_secs(secs))
    }

    #[test]
    fn test_usable_duration() {
        assert!(track(SourceKind::DirectMedia, 180).has_usable_duration());
        assert!(!track(SourceKind::DirectMedia, 0).has_usable_duration());
        assert!(track(SourceKind::Live, 0).has_usable_duration());
        assert!(track(SourceKind::ExternalStream, 0).has_usable_duration());
    }

    #[test]
    fn test_formatted_duration() {
        assert_eq!(
            track(SourceKind::DirectMedia, 205).formatted_duration(),
            "3m 25s"
        );
        assert_eq!(track(SourceKind::Live, 0).formatted_duration(), "en vivo");
    }

    #[test]
    fn test_playlist_total_duration() {
        let playlist = Playlist {
            title: "mix".into(),
            url: None,
            tracks: vec![
                track(SourceKind::DirectMedia, 60),
                track(SourceKind::DirectMedia, 30),
            ],
            requested_by: UserId::new(1),
        };
        assert_eq!(playlist.total_duration(), Duration::from_secs(90));
        assert_eq!(playlist.len(), 2);
    }
}
