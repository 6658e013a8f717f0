//! Adaptador de catálogo Spotify.
//!
//! El catálogo no expone streams: cada track se normaliza como
//! [`SourceKind::CatalogPending`] y el resolver lo re-mapea al proveedor de
//! media ("título + artista principal") cuando llega a la cabeza de la cola.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::UserId;
use tracing::{debug, info};
use url::Url;

use super::{MusicSource, Playlist, Resolved, SourceKind, Track, TokenManager};
use crate::connection::AudioStream;

/// Track crudo tal como lo devuelve el cliente de catálogo.
#[derive(Debug, Clone)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub artists: Vec<String>,
    pub duration_ms: u64,
    pub thumbnail: Option<String>,
}

/// Colección cruda (álbum o playlist) del cliente de catálogo.
#[derive(Debug, Clone)]
pub struct CatalogCollection {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub tracks: Vec<CatalogTrack>,
}

/// Cliente de metadata crudo del catálogo (red, paginación y auth afuera).
#[async_trait]
pub trait CatalogApi: Send + Sync {
    async fn track(&self, bearer: &str, id: &str) -> Result<CatalogTrack>;
    async fn album(&self, bearer: &str, id: &str) -> Result<CatalogCollection>;
    async fn playlist(&self, bearer: &str, id: &str) -> Result<CatalogCollection>;
}

/// Clase de referencia dentro del catálogo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyRefKind {
    Track,
    Album,
    Playlist,
}

/// Referencia parseada de una URI `spotify:` o URL `open.spotify.com`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyRef {
    pub kind: SpotifyRefKind,
    pub id: String,
}

impl SpotifyRef {
    /// Acepta `spotify:track:ID` y `https://open.spotify.com/track/ID`.
    pub fn parse(input: &str) -> Option<Self> {
        if let Some(rest) = input.strip_prefix("spotify:") {
            let mut parts = rest.splitn(2, ':');
            let kind = Self::kind_from(parts.next()?)?;
            let id = parts.next()?;
            if id.is_empty() {
                return None;
            }
            return Some(Self { kind, id: id.to_string() });
        }

        let url = Url::parse(input).ok()?;
        if url.host_str()? != "open.spotify.com" {
            return None;
        }
        let mut segments = url.path_segments()?;
        let kind = Self::kind_from(segments.next()?)?;
        let id = segments.next()?;
        if id.is_empty() {
            return None;
        }
        Some(Self { kind, id: id.to_string() })
    }

    fn kind_from(raw: &str) -> Option<SpotifyRefKind> {
        match raw {
            "track" => Some(SpotifyRefKind::Track),
            "album" => Some(SpotifyRefKind::Album),
            "playlist" => Some(SpotifyRefKind::Playlist),
            _ => None,
        }
    }
}

/// Adaptador de catálogo sobre un [`CatalogApi`] con auth bearer.
pub struct SpotifyCatalog {
    api: Arc<dyn CatalogApi>,
    tokens: Arc<TokenManager>,
}

impl SpotifyCatalog {
    pub fn new(api: Arc<dyn CatalogApi>, tokens: Arc<TokenManager>) -> Self {
        Self { api, tokens }
    }

    fn pending_track(raw: CatalogTrack, requested_by: UserId) -> Track {
        let url = format!("https://open.spotify.com/track/{}", raw.id);
        let mut track = Track::new(raw.id, raw.name, url, SourceKind::CatalogPending, requested_by)
            .with_duration(Duration::from_millis(raw.duration_ms));
        if let Some(artist) = raw.artists.first() {
            track = track.with_artist(artist.clone());
        }
        if let Some(thumbnail) = raw.thumbnail {
            track = track.with_thumbnail(thumbnail);
        }
        track
    }

    fn collection_to_playlist(
        collection: CatalogCollection,
        requested_by: UserId,
    ) -> Playlist {
        let tracks = collection
            .tracks
            .into_iter()
            .map(|t| Self::pending_track(t, requested_by))
            .collect();
        Playlist {
            title: collection.name,
            url: collection.url,
            tracks,
            requested_by,
        }
    }
}

#[async_trait]
impl MusicSource for SpotifyCatalog {
    fn source_name(&self) -> &'static str {
        "spotify"
    }

    fn matches(&self, input: &str) -> bool {
        SpotifyRef::parse(input).is_some()
    }

    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved> {
        let reference = SpotifyRef::parse(input)
            .ok_or_else(|| anyhow::anyhow!("referencia de Spotify inválida: {input}"))?;
        let bearer = self.tokens.bearer().await?;
        debug!("🎧 Resolviendo referencia de catálogo {:?}", reference);

        match reference.kind {
            SpotifyRefKind::Track => {
                let raw = self.api.track(&bearer, &reference.id).await?;
                info!("🎧 Track de catálogo: {}", raw.name);
                Ok(Resolved::Track(Self::pending_track(raw, requested_by)))
            }
            SpotifyRefKind::Album => {
                let collection = self.api.album(&bearer, &reference.id).await?;
                info!("🎧 Álbum de catálogo: {} ({} tracks)", collection.name, collection.tracks.len());
                Ok(Resolved::Playlist(Self::collection_to_playlist(collection, requested_by)))
            }
            SpotifyRefKind::Playlist => {
                let collection = self.api.playlist(&bearer, &reference.id).await?;
                info!("🎧 Playlist de catálogo: {} ({} tracks)", collection.name, collection.tracks.len());
                Ok(Resolved::Playlist(Self::collection_to_playlist(collection, requested_by)))
            }
        }
    }

    async fn open_stream(&self, track: &Track, _filter_args: Option<&str>) -> Result<AudioStream> {
        // Invariante: CatalogPending se re-resuelve antes de llegar aquí.
        anyhow::bail!(
            "el catálogo no expone streams; track pendiente de resolución: {}",
            track.title
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::{TokenGrant, TokenProvider};
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;

    mockall::mock! {
        Api {}

        #[async_trait]
        impl CatalogApi for Api {
            async fn track(&self, bearer: &str, id: &str) -> Result<CatalogTrack>;
            async fn album(&self, bearer: &str, id: &str) -> Result<CatalogCollection>;
            async fn playlist(&self, bearer: &str, id: &str) -> Result<CatalogCollection>;
        }
    }

    struct StaticTokens;

    #[async_trait]
    impl TokenProvider for StaticTokens {
        async fn fetch(&self) -> Result<TokenGrant> {
            Ok(TokenGrant {
                access_token: "bearer-x".into(),
                expires_in: Duration::from_secs(3600),
            })
        }
    }

    fn catalog(api: MockApi) -> SpotifyCatalog {
        SpotifyCatalog::new(
            Arc::new(api),
            Arc::new(TokenManager::new(Arc::new(StaticTokens))),
        )
    }

    #[tokio::test]
    async fn test_resolve_track_is_pending() {
        let mut api = MockApi::new();
        api.expect_track()
            .with(eq("bearer-x"), eq("abc123"))
            .returning(|_, _| {
                Ok(CatalogTrack {
                    id: "abc123".into(),
                    name: "Clandestino".into(),
                    artists: vec!["Manu Chao".into(), "Otro".into()],
                    duration_ms: 148_000,
                    thumbnail: None,
                })
            });

        let resolved = catalog(api)
            .resolve("spotify:track:abc123", UserId::new(9))
            .await
            .unwrap();
        match resolved {
            Resolved::Track(t) => {
                assert_eq!(t.kind, SourceKind::CatalogPending);
                assert_eq!(t.title, "Clandestino");
                // Solo el artista principal participa en la re-resolución.
                assert_eq!(t.artist.as_deref(), Some("Manu Chao"));
                assert_eq!(t.duration, Duration::from_millis(148_000));
                assert_eq!(t.requested_by, UserId::new(9));
            }
            other => panic!("se esperaba un track, llegó {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_resolve_album_keeps_order() {
        let mut api = MockApi::new();
        api.expect_album().returning(|_, _| {
            Ok(CatalogCollection {
                id: "alb".into(),
                name: "Disco".into(),
                url: None,
                tracks: vec![
                    CatalogTrack {
                        id: "t1".into(),
                        name: "Uno".into(),
                        artists: vec![],
                        duration_ms: 1000,
                        thumbnail: None,
                    },
                    CatalogTrack {
                        id: "t2".into(),
                        name: "Dos".into(),
                        artists: vec![],
                        duration_ms: 2000,
                        thumbnail: None,
                    },
                ],
            })
        });

        let resolved = catalog(api)
            .resolve("https://open.spotify.com/album/alb", UserId::new(9))
            .await
            .unwrap();
        match resolved {
            Resolved::Playlist(p) => {
                assert_eq!(p.title, "Disco");
                let names: Vec<_> = p.tracks.iter().map(|t| t.title.as_str()).collect();
                assert_eq!(names, vec!["Uno", "Dos"]);
                assert!(p.tracks.iter().all(|t| t.kind == SourceKind::CatalogPending));
            }
            other => panic!("se esperaba una playlist, llegó {other:?}"),
        }
    }

    #[test]
    fn test_parse_uri_forms() {
        assert_eq!(
            SpotifyRef::parse("spotify:track:abc123"),
            Some(SpotifyRef {
                kind: SpotifyRefKind::Track,
                id: "abc123".into()
            })
        );
        assert_eq!(
            SpotifyRef::parse("spotify:album:xyz"),
            Some(SpotifyRef {
                kind: SpotifyRefKind::Album,
                id: "xyz".into()
            })
        );
        assert!(SpotifyRef::parse("spotify:artist:abc").is_none());
        assert!(SpotifyRef::parse("spotify:track:").is_none());
    }

    #[test]
    fn test_parse_url_forms() {
        assert_eq!(
            SpotifyRef::parse("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some(SpotifyRef {
                kind: SpotifyRefKind::Playlist,
                id: "37i9dQZF1DXcBWIGoYBM5M".into()
            })
        );
        assert_eq!(
            SpotifyRef::parse("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=x"),
            Some(SpotifyRef {
                kind: SpotifyRefKind::Track,
                id: "4uLU6hMCjMI75M1A2tKUQC".into()
            })
        );
        assert!(SpotifyRef::parse("https://example.com/track/abc").is_none());
        assert!(SpotifyRef::parse("no es una url").is_none());
    }
}
