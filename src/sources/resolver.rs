//! Pipeline de resolución de tracks.
//!
//! Normaliza entrada heterogénea (enlaces de catálogo, enlaces de playlist,
//! enlaces directos, texto libre) a [`Resolved`] probando adaptadores en un
//! orden de precedencia fijo, con desambiguación interactiva acotada y
//! backoff exponencial ante proveedores transitoriamente caídos.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::id::UserId;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use url::Url;

use super::{MusicSource, Resolved, SourceKind, Track};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::{EventBus, MusicEvent};

/// Canal de respuesta para la desambiguación interactiva.
///
/// Devuelve la respuesta cruda del solicitante (o `None` si declina); la
/// validación del índice es responsabilidad del resolver.
#[async_trait]
pub trait SearchSelector: Send + Sync {
    async fn choose(&self, requested_by: UserId, candidates: &[Track]) -> Option<String>;
}

pub struct TrackResolver {
    /// Adaptadores en orden de precedencia; el primero que matchea gana.
    adapters: Vec<Arc<dyn MusicSource>>,
    /// Proveedor de media designado: búsqueda, relacionados y apertura de
    /// streams para los tracks que ningún adaptador reclama.
    media: Arc<dyn MusicSource>,
    selector: Option<Arc<dyn SearchSelector>>,
    events: EventBus,
    config: EngineConfig,
}

impl TrackResolver {
    pub fn new(
        adapters: Vec<Arc<dyn MusicSource>>,
        media: Arc<dyn MusicSource>,
        selector: Option<Arc<dyn SearchSelector>>,
        events: EventBus,
        config: EngineConfig,
    ) -> Self {
        Self {
            adapters,
            media,
            selector,
            events,
            config,
        }
    }

    pub fn media(&self) -> &Arc<dyn MusicSource> {
        &self.media
    }

    /// Resuelve una entrada cruda a un track o playlist.
    pub async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved, EngineError> {
        for adapter in &self.adapters {
            if adapter.matches(input) {
                debug!("🧭 Adaptador '{}' reclama la entrada", adapter.source_name());
                let resolved = adapter.resolve(input, requested_by).await?;
                return self.validate(resolved, input);
            }
        }

        if is_url(input) {
            return Err(EngineError::NotFound(input.to_string()));
        }

        let track = self.search_and_pick(input, requested_by).await?;
        Ok(Resolved::Track(track))
    }

    /// Re-resuelve un track de catálogo pendiente contra el proveedor de media.
    ///
    /// El mapeo catálogo→media puede quedar obsoleto; esta función se invoca
    /// también al llegar el track a la cabeza de la cola, de modo que el
    /// reintento es transparente para quien encola.
    pub async fn resolve_pending(&self, track: &Track) -> Result<Track, EngineError> {
        debug_assert_eq!(track.kind, SourceKind::CatalogPending);
        let query = match &track.artist {
            Some(artist) => format!("{} {}", track.title, artist),
            None => track.title.clone(),
        };
        info!("🔁 Re-resolviendo track de catálogo: {}", query);

        let mut found = self
            .search_with_backoff(&query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::NotFound(query.clone()))?;
        found.requested_by = track.requested_by;
        Ok(found)
    }

    /// Candidatos relacionados de un track, para autoplay.
    pub async fn related(&self, track: &Track) -> Result<Vec<Track>, EngineError> {
        Ok(self.media.related(track).await?)
    }

    fn validate(&self, resolved: Resolved, input: &str) -> Result<Resolved, EngineError> {
        match resolved {
            Resolved::Track(track) => Ok(Resolved::Track(track)),
            Resolved::Playlist(mut playlist) => {
                // Entradas sin metadata utilizable se descartan en silencio;
                // solo una playlist que queda vacía es un error.
                let before = playlist.tracks.len();
                playlist.tracks.retain(|t| t.has_usable_duration());
                let dropped = before - playlist.tracks.len();
                if dropped > 0 {
                    debug!("🧹 {} entradas sin metadata descartadas de '{}'", dropped, playlist.title);
                }
                if playlist.tracks.is_empty() {
                    warn!("📭 Playlist sin canciones utilizables: {}", input);
                    return Err(EngineError::EmptyPlaylist);
                }
                Ok(Resolved::Playlist(playlist))
            }
        }
    }

    /// Búsqueda con reintentos acotados y backoff exponencial.
    ///
    /// Bucle explícito en lugar de auto-reinvocación con delay: la cota de
    /// reintentos queda visible y testeable.
    async fn search_with_backoff(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Track>, EngineError> {
        let mut delay = self.config.search_backoff();

        for attempt in 1..=self.config.search_retries {
            match self.media.search(query, limit).await {
                Ok(tracks) if !tracks.is_empty() => return Ok(tracks),
                Ok(_) => {
                    debug!("🔍 Sin resultados para '{}' (intento {})", query, attempt);
                }
                Err(e) => {
                    warn!("🔍 Búsqueda falló para '{}' (intento {}): {}", query, attempt, e);
                }
            }

            if attempt < self.config.search_retries {
                sleep(delay).await;
                delay *= 2;
            }
        }

        Err(EngineError::NotFound(query.to_string()))
    }

    /// Búsqueda de texto libre con desambiguación opcional.
    async fn search_and_pick(&self, query: &str, requested_by: UserId) -> Result<Track, EngineError> {
        let candidates = self
            .search_with_backoff(query, self.config.search_limit)
            .await?;

        let index = match (&self.selector, self.config.search_interactive) {
            (Some(selector), true) => {
                self.events.emit(MusicEvent::SearchResults {
                    requested_by,
                    candidates: candidates.clone(),
                });

                let reply = timeout(
                    self.config.select_timeout(),
                    selector.choose(requested_by, &candidates),
                )
                .await;

                match reply {
                    Ok(Some(text)) => match text.trim().parse::<usize>() {
                        Ok(n) if (1..=candidates.len()).contains(&n) => n - 1,
                        _ => return self.cancel_search(requested_by),
                    },
                    // Timeout o el solicitante declinó: nunca se cae al
                    // primer candidato por defecto.
                    _ => return self.cancel_search(requested_by),
                }
            }
            _ => 0,
        };

        let mut track = candidates
            .into_iter()
            .nth(index)
            .ok_or_else(|| EngineError::NotFound(query.to_string()))?;
        track.requested_by = requested_by;
        info!("🎯 Seleccionado: {}", track.title);
        Ok(track)
    }

    fn cancel_search(&self, requested_by: UserId) -> Result<Track, EngineError> {
        info!("🚫 Búsqueda cancelada por timeout o respuesta inválida");
        self.events.emit(MusicEvent::SearchCancel { requested_by });
        Err(EngineError::SearchCancelled)
    }
}

fn is_url(input: &str) -> bool {
    matches!(Url::parse(input), Ok(url) if url.has_host())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/watch?v=abc"));
        assert!(is_url("spotify://track/x"));
        assert!(!is_url("una canción cualquiera"));
        assert!(!is_url("bassboost"));
    }
}
