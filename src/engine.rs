//! Fachada del motor: superficie de comandos por sesión.
//!
//! Cada comando toma el mutex de la sesión objetivo, ejecuta su paso de
//! mutación y suelta; sesiones distintas nunca contienden entre sí.

use std::sync::Arc;
use std::time::Duration;

use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::audio::controller;
use crate::audio::idle::IdleWatcher;
use crate::audio::{MusicQueue, QueueRegistry, QueueSnapshot, RepeatMode, Session};
use crate::config::EngineConfig;
use crate::connection::ConnectionProvider;
use crate::error::EngineError;
use crate::events::{EventBus, MusicEvent};
use crate::filters;
use crate::sources::{
    MusicSource, Playlist, Resolved, SearchSelector, SourceKind, Track, TrackResolver,
};

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) registry: QueueRegistry,
    pub(crate) resolver: TrackResolver,
    pub(crate) connections: Arc<dyn ConnectionProvider>,
    pub(crate) events: EventBus,
    pub(crate) idle: IdleWatcher,
}

/// Motor de colas de reproducción por sesión.
#[derive(Clone)]
pub struct MusicEngine {
    inner: Arc<EngineInner>,
}

impl MusicEngine {
    /// Crea el motor con sus colaboradores externos.
    ///
    /// `adapters` se prueban en orden de precedencia; `media` es el proveedor
    /// designado para búsqueda de texto libre, relacionados y apertura de
    /// streams genéricos.
    pub fn new(
        config: EngineConfig,
        connections: Arc<dyn ConnectionProvider>,
        adapters: Vec<Arc<dyn MusicSource>>,
        media: Arc<dyn MusicSource>,
        selector: Option<Arc<dyn SearchSelector>>,
    ) -> Self {
        let events = EventBus::default();
        let resolver = TrackResolver::new(adapters, media, selector, events.clone(), config.clone());
        info!("🎵 Motor de colas inicializado — {}", config.summary());

        Self {
            inner: Arc::new(EngineInner {
                config,
                registry: QueueRegistry::new(),
                resolver,
                connections,
                events,
                idle: IdleWatcher::new(),
            }),
        }
    }

    /// Suscripción al bus de señales del motor.
    pub fn subscribe(&self) -> broadcast::Receiver<MusicEvent> {
        self.inner.events.subscribe()
    }

    /// Lista de filtros reconocidos.
    pub fn supported_filters() -> Vec<&'static str> {
        filters::supported()
    }

    /// Resuelve la entrada y la encola; crea la sesión si no existe.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        input: &str,
        requested_by: UserId,
    ) -> Result<(), EngineError> {
        let resolved = self.inner.resolver.resolve(input, requested_by).await?;
        self.handle_resolved(guild_id, channel_id, resolved, false)
            .await
    }

    /// Como [`Self::play`] pero saltando directo a lo recién encolado.
    pub async fn play_skip(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        input: &str,
        requested_by: UserId,
    ) -> Result<(), EngineError> {
        let resolved = self.inner.resolver.resolve(input, requested_by).await?;
        self.handle_resolved(guild_id, channel_id, resolved, true)
            .await
    }

    /// Encola una URL de stream arbitraria (radio) con reproducción inmediata.
    pub async fn play_stream(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        name: &str,
        source_url: &str,
        requested_by: UserId,
    ) -> Result<(), EngineError> {
        let track = Track::new(
            source_url,
            name,
            source_url,
            SourceKind::ExternalStream,
            requested_by,
        )
        .with_stream_url(source_url);
        self.handle_resolved(guild_id, channel_id, Resolved::Track(track), true)
            .await
    }

    /// Construye una playlist ad hoc desde URLs del llamador y la encola.
    ///
    /// Las entradas que fallan al resolverse se descartan con aviso; si
    /// todas fallan no se encola nada. `skip` da semántica de reproducción
    /// inmediata, como [`Self::play_skip`].
    pub async fn play_custom_playlist(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        name: &str,
        urls: &[&str],
        requested_by: UserId,
        skip: bool,
    ) -> Result<(), EngineError> {
        let mut tracks = Vec::new();
        for url in urls {
            match self.inner.resolver.resolve(url, requested_by).await {
                Ok(Resolved::Track(track)) => tracks.push(track),
                Ok(Resolved::Playlist(playlist)) => tracks.extend(playlist.tracks),
                Err(e) => {
                    warn!("🧹 Entrada descartada de '{}': {} ({})", name, url, e);
                }
            }
        }
        if tracks.is_empty() {
            return Err(EngineError::EmptyPlaylist);
        }

        let playlist = Playlist {
            title: name.to_string(),
            url: None,
            tracks,
            requested_by,
        };
        self.handle_resolved(guild_id, channel_id, Resolved::Playlist(playlist), skip)
            .await
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        q.paused = true;
        if let Some(handle) = &q.current {
            handle.pause();
        }
        info!("⏸️ Reproducción pausada en guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        q.paused = false;
        if let Some(handle) = &q.current {
            handle.resume();
        }
        info!("▶️ Reproducción reanudada en guild {}", guild_id);
        Ok(())
    }

    /// Termina la sesión: stream abajo, conexión liberada, cola destruida.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;

        let connection = q.connection.clone();
        controller::destroy_locked(&self.inner, guild_id, &mut q);
        if self.inner.config.leave_on_stop {
            connection.leave().await;
        }
        info!("⏹️ Reproducción detenida en guild {}", guild_id);
        Ok(())
    }

    pub async fn set_volume(&self, guild_id: GuildId, percent: u8) -> Result<u8, EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;

        q.volume = percent.min(150);
        if let Some(handle) = &q.current {
            handle.set_volume(f32::from(q.volume) / 100.0);
        }
        info!("🔊 Volumen al {}% en guild {}", q.volume, guild_id);
        Ok(q.volume)
    }

    /// Fuerza el fin del stream actual; el handler de fin avanza la cola.
    pub async fn skip(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        Self::skip_locked(&mut q)
    }

    /// Salta a la posición `n` (1-based, cabeza = 1) descartando lo intermedio.
    pub async fn jump(&self, guild_id: GuildId, n: usize) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;

        q.jump_truncate(n)?;
        q.skipped = true;
        if let Some(handle) = &q.current {
            handle.stop();
        }
        Ok(())
    }

    /// Mezcla todas las canciones salvo la que está sonando.
    pub async fn shuffle(&self, guild_id: GuildId) -> Result<(), EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        q.shuffle_tail();
        Ok(())
    }

    pub async fn set_repeat(
        &self,
        guild_id: GuildId,
        mode: Option<RepeatMode>,
    ) -> Result<RepeatMode, EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        Ok(q.set_repeat(mode))
    }

    pub async fn toggle_autoplay(&self, guild_id: GuildId) -> Result<bool, EngineError> {
        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;
        Ok(q.toggle_autoplay())
    }

    /// Activa o desactiva un filtro y reinicia el stream actual con el nuevo
    /// grafo (stream fresco, no un seek).
    pub async fn set_filter(
        &self,
        guild_id: GuildId,
        name: &str,
    ) -> Result<Option<&'static str>, EngineError> {
        let canonical =
            filters::canonical(name).ok_or_else(|| EngineError::UnknownFilter(name.to_string()))?;

        let session = self.session(guild_id)?;
        let mut q = session.queue.lock().await;
        Self::ensure_active(&q)?;

        q.filter = if q.filter == Some(canonical) {
            None
        } else {
            Some(canonical)
        };
        info!("🎛️ Filtro de guild {}: {:?}", guild_id, q.filter);

        controller::start_locked(&self.inner, guild_id, &mut q).await;
        Ok(q.filter)
    }

    /// Vista del estado de la cola, `None` contra una sesión ausente.
    pub async fn queue_snapshot(&self, guild_id: GuildId) -> Option<QueueSnapshot> {
        let session = self.inner.registry.get(guild_id)?;
        let q = session.queue.lock().await;
        if q.stopped {
            return None;
        }
        Some(q.snapshot())
    }

    pub async fn is_playing(&self, guild_id: GuildId) -> bool {
        match self.inner.registry.get(guild_id) {
            Some(session) => {
                let q = session.queue.lock().await;
                !q.stopped && !q.paused
            }
            None => false,
        }
    }

    pub async fn is_paused(&self, guild_id: GuildId) -> bool {
        match self.inner.registry.get(guild_id) {
            Some(session) => {
                let q = session.queue.lock().await;
                !q.stopped && q.paused
            }
            None => false,
        }
    }

    /// Tiempo transcurrido de la canción actual.
    pub async fn elapsed(&self, guild_id: GuildId) -> Option<Duration> {
        let session = self.inner.registry.get(guild_id)?;
        let q = session.queue.lock().await;
        q.head().and_then(|t| t.elapsed())
    }

    /// Notificación de cambio de membresía del canal de voz de la sesión.
    ///
    /// Con cero ocupantes no-bot arma el timer de inactividad; cualquier
    /// ocupación posterior lo cancela.
    pub fn notify_voice_membership(&self, guild_id: GuildId, non_bot_count: usize) {
        if non_bot_count > 0 {
            self.inner.idle.cancel(guild_id);
        } else if self.inner.config.leave_on_empty && self.inner.registry.contains(guild_id) {
            self.inner.idle.arm(self.inner.clone(), guild_id);
        }
    }

    // ---- internos ----

    fn session(&self, guild_id: GuildId) -> Result<Arc<Session>, EngineError> {
        self.inner
            .registry
            .get(guild_id)
            .ok_or(EngineError::NotPlaying)
    }

    fn ensure_active(q: &MusicQueue) -> Result<(), EngineError> {
        if q.stopped {
            return Err(EngineError::NotPlaying);
        }
        Ok(())
    }

    fn skip_locked(q: &mut MusicQueue) -> Result<(), EngineError> {
        if q.songs.len() <= 1 && !q.autoplay {
            return Err(EngineError::NoSong);
        }
        q.skipped = true;
        if let Some(handle) = &q.current {
            handle.stop();
        }
        Ok(())
    }

    async fn handle_resolved(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        mut resolved: Resolved,
        immediate: bool,
    ) -> Result<(), EngineError> {
        loop {
            if let Some(session) = self.inner.registry.get(guild_id) {
                let mut q = session.queue.lock().await;
                if !q.stopped {
                    return self.enqueue_locked(guild_id, &mut q, resolved, immediate);
                }
                // Cola parada: la baja del registro ocurre bajo este mismo
                // lock, así que al soltarlo ya no figura; se reintenta como
                // ausente.
                continue;
            }

            match self
                .try_create_session(guild_id, channel_id, resolved)
                .await?
            {
                None => return Ok(()),
                // Otra tarea registró la sesión durante el join; lo resuelto
                // se pliega en la ganadora.
                Some(pending) => resolved = pending,
            }
        }
    }

    fn enqueue_locked(
        &self,
        guild_id: GuildId,
        q: &mut MusicQueue,
        resolved: Resolved,
        immediate: bool,
    ) -> Result<(), EngineError> {
        match resolved {
            Resolved::Track(track) => {
                if immediate {
                    q.splice_after_head(vec![track.clone()])?;
                } else {
                    q.push(track.clone())?;
                }
                self.inner
                    .events
                    .emit(MusicEvent::AddSong { guild_id, track });
            }
            Resolved::Playlist(playlist) => {
                if immediate {
                    q.splice_after_head(playlist.tracks.clone())?;
                } else {
                    q.push_many(playlist.tracks.clone())?;
                }
                self.inner
                    .events
                    .emit(MusicEvent::AddList { guild_id, playlist });
            }
        }
        if immediate {
            Self::skip_locked(q)?;
        }
        Ok(())
    }

    /// Crea y arranca la sesión. Devuelve lo resuelto si otra tarea ganó la
    /// carrera de creación: la decisión es atómica sobre el registro, y la
    /// conexión sobrante se libera porque solo una cola es dueña del canal.
    async fn try_create_session(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        resolved: Resolved,
    ) -> Result<Option<Resolved>, EngineError> {
        // La cola existe solo si el join tuvo éxito; un fallo aquí no deja
        // nada registrado.
        let connection = self
            .inner
            .connections
            .join(guild_id, channel_id)
            .await
            .map_err(EngineError::Join)?;

        let (session, created) = self.inner.registry.get_or_insert_with(guild_id, || {
            MusicQueue::new(
                connection.clone(),
                self.inner.config.default_volume,
                self.inner.config.max_queue_size,
            )
        });
        if !created {
            connection.leave().await;
            return Ok(Some(resolved));
        }

        self.inner.events.emit(MusicEvent::QueueInit { guild_id });

        let mut q = session.queue.lock().await;
        let playlist: Option<Playlist> = match resolved {
            Resolved::Track(track) => {
                q.push(track)?;
                None
            }
            Resolved::Playlist(playlist) => {
                q.push_many(playlist.tracks.clone())?;
                Some(playlist)
            }
        };
        if let (Some(playlist), Some(first)) = (playlist, q.head().cloned()) {
            self.inner.events.emit(MusicEvent::PlayList {
                guild_id,
                playlist,
                first,
            });
        }
        controller::start_locked(&self.inner, guild_id, &mut q).await;
        Ok(None)
    }
}
