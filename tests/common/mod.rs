//! Dobles de prueba para el transporte de voz y los proveedores de media.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::broadcast;
use tokio::sync::Notify;

use cadencia::{
    AudioStream, ConnectionProvider, EngineConfig, MusicEngine, MusicEvent, MusicSource,
    PlayOptions, Resolved, SearchSelector, SourceKind, Track, TrackEnd, TrackHandle,
    VoiceConnection,
};

// ---- transporte ----

/// Handle controlable desde el test: el stream termina cuando el test lo pide.
pub struct FakeHandle {
    end: Mutex<Option<TrackEnd>>,
    notify: Notify,
    pub paused: AtomicBool,
    pub volume: Mutex<f32>,
}

impl FakeHandle {
    fn new(volume: f32) -> Self {
        Self {
            end: Mutex::new(None),
            notify: Notify::new(),
            paused: AtomicBool::new(false),
            volume: Mutex::new(volume),
        }
    }

    fn signal(&self, end: TrackEnd) {
        let mut slot = self.end.lock();
        if slot.is_none() {
            *slot = Some(end);
            self.notify.notify_one();
        }
    }

    /// Fin natural del stream.
    pub fn finish(&self) {
        self.signal(TrackEnd::Finished);
    }

    /// Falla a mitad de reproducción.
    pub fn fail(&self, message: &str) {
        self.signal(TrackEnd::Errored(message.to_string()));
    }
}

#[async_trait]
impl TrackHandle for FakeHandle {
    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.signal(TrackEnd::Finished);
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume;
    }

    async fn ended(&self) -> TrackEnd {
        loop {
            if let Some(end) = self.end.lock().clone() {
                return end;
            }
            self.notify.notified().await;
        }
    }
}

pub struct FakeConnection {
    pub handles: Mutex<Vec<Arc<FakeHandle>>>,
    pub empty: AtomicBool,
    pub left: AtomicBool,
    /// Simula un transporte cuyo `leave()` suspende antes de completarse.
    pub yield_on_leave: AtomicBool,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            empty: AtomicBool::new(false),
            left: AtomicBool::new(false),
            yield_on_leave: AtomicBool::new(false),
        }
    }

    pub fn play_calls(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn last_handle(&self) -> Arc<FakeHandle> {
        self.handles.lock().last().cloned().expect("ningún stream adjuntado")
    }

    pub fn set_empty(&self, empty: bool) {
        self.empty.store(empty, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(
        &self,
        _stream: AudioStream,
        options: PlayOptions,
    ) -> Result<Arc<dyn TrackHandle>> {
        let handle = Arc::new(FakeHandle::new(options.volume));
        self.handles.lock().push(handle.clone());
        Ok(handle)
    }

    async fn leave(&self) {
        if self.yield_on_leave.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        self.left.store(true, Ordering::SeqCst);
    }

    fn is_empty(&self) -> bool {
        self.empty.load(Ordering::SeqCst)
    }
}

/// Fábrica de conexiones: una conexión nueva por join, con demora opcional
/// para provocar carreras de creación.
pub struct FakeConnectionProvider {
    pub connections: Mutex<Vec<Arc<FakeConnection>>>,
    pub join_calls: AtomicUsize,
    pub fail_join: AtomicBool,
    pub join_delay: Mutex<Duration>,
}

impl FakeConnectionProvider {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Vec::new()),
            join_calls: AtomicUsize::new(0),
            fail_join: AtomicBool::new(false),
            join_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// La conexión más reciente (la de la sesión viva en los tests simples).
    pub fn connection(&self) -> Arc<FakeConnection> {
        self.connections
            .lock()
            .last()
            .cloned()
            .expect("ningún join realizado")
    }
}

#[async_trait]
impl ConnectionProvider for FakeConnectionProvider {
    async fn join(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> Result<Arc<dyn VoiceConnection>> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_join.load(Ordering::SeqCst) {
            anyhow::bail!("sin permisos para unirse al canal");
        }
        let delay = *self.join_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let connection = Arc::new(FakeConnection::new());
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

// ---- proveedor de media ----

/// Proveedor programable: catálogo fijo por entrada, resultados de búsqueda
/// enlatados y fallos inyectables.
pub struct FakeMediaSource {
    pub catalog: Mutex<HashMap<String, Resolved>>,
    pub search_results: Mutex<Vec<Track>>,
    pub related_results: Mutex<Vec<Track>>,
    /// Cantidad de búsquedas que fallan antes de empezar a responder.
    pub search_failures: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub last_search: Mutex<Option<(String, usize)>>,
    /// IDs de track cuyo `open_stream` falla.
    pub broken_streams: Mutex<Vec<String>>,
}

impl FakeMediaSource {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(HashMap::new()),
            search_results: Mutex::new(Vec::new()),
            related_results: Mutex::new(Vec::new()),
            search_failures: AtomicUsize::new(0),
            search_calls: AtomicUsize::new(0),
            last_search: Mutex::new(None),
            broken_streams: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, input: &str, resolved: Resolved) {
        self.catalog.lock().insert(input.to_string(), resolved);
    }

    pub fn set_search_results(&self, tracks: Vec<Track>) {
        *self.search_results.lock() = tracks;
    }

    pub fn break_stream(&self, id: &str) {
        self.broken_streams.lock().push(id.to_string());
    }
}

#[async_trait]
impl MusicSource for FakeMediaSource {
    fn source_name(&self) -> &'static str {
        "fake-media"
    }

    fn matches(&self, input: &str) -> bool {
        input.starts_with("fake://")
    }

    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved> {
        let resolved = self
            .catalog
            .lock()
            .get(input)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("entrada desconocida: {input}"))?;
        Ok(match resolved {
            Resolved::Track(mut t) => {
                t.requested_by = requested_by;
                Resolved::Track(t)
            }
            Resolved::Playlist(mut p) => {
                p.requested_by = requested_by;
                Resolved::Playlist(p)
            }
        })
    }

    async fn open_stream(&self, track: &Track, _filter_args: Option<&str>) -> Result<AudioStream> {
        if self.broken_streams.lock().contains(&track.id) {
            anyhow::bail!("stream roto para {}", track.id);
        }
        Ok(AudioStream::silence())
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>> {
        let call = self.search_calls.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_search.lock() = Some((query.to_string(), limit));
        if call <= self.search_failures.load(Ordering::SeqCst) {
            anyhow::bail!("proveedor caído (intento {call})");
        }
        Ok(self.search_results.lock().iter().take(limit).cloned().collect())
    }

    async fn related(&self, _track: &Track) -> Result<Vec<Track>> {
        Ok(self.related_results.lock().clone())
    }
}

// ---- selector de búsqueda ----

pub enum SelectorBehavior {
    Reply(&'static str),
    Decline,
    /// Nunca responde; fuerza el timeout del resolver.
    Hang,
}

pub struct FakeSelector {
    pub behavior: SelectorBehavior,
}

#[async_trait]
impl SearchSelector for FakeSelector {
    async fn choose(&self, _requested_by: UserId, _candidates: &[Track]) -> Option<String> {
        match &self.behavior {
            SelectorBehavior::Reply(text) => Some((*text).to_string()),
            SelectorBehavior::Decline => None,
            SelectorBehavior::Hang => futures::future::pending().await,
        }
    }
}

// ---- armado del motor ----

/// Logging de pruebas controlado por `RUST_LOG`; idempotente.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub const GUILD: GuildId = GuildId::new(100);
pub const CHANNEL: ChannelId = ChannelId::new(200);
pub const USER: UserId = UserId::new(300);

pub fn track(id: &str) -> Track {
    Track::new(
        id,
        id,
        format!("fake://{id}"),
        SourceKind::SearchResult,
        USER,
    )
    .with_duration(Duration::from_secs(180))
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        search_backoff_ms: 1,
        ..EngineConfig::default()
    }
}

pub struct Harness {
    pub engine: MusicEngine,
    pub provider: Arc<FakeConnectionProvider>,
    pub media: Arc<FakeMediaSource>,
    pub events: broadcast::Receiver<MusicEvent>,
}

impl Harness {
    pub fn new(config: EngineConfig) -> Self {
        init_tracing();
        let provider = Arc::new(FakeConnectionProvider::new());
        let media = Arc::new(FakeMediaSource::new());
        // El proveedor de media participa también como adaptador, igual que
        // en el cableado real.
        let engine = MusicEngine::new(
            config,
            provider.clone(),
            vec![media.clone()],
            media.clone(),
            None,
        );
        let events = engine.subscribe();
        Self {
            engine,
            provider,
            media,
            events,
        }
    }

    pub fn connection(&self) -> Arc<FakeConnection> {
        self.provider.connection()
    }

    /// Encola `n` tracks programados por entrada `fake://<id>`.
    pub async fn play_tracks(&self, ids: &[&str]) {
        for id in ids {
            let input = format!("fake://{id}");
            self.media.add(&input, Resolved::Track(track(id)));
            self.engine
                .play(GUILD, CHANNEL, &input, USER)
                .await
                .expect("play falló");
        }
    }

    /// IDs de la cola según el snapshot actual.
    pub async fn queue_ids(&self) -> Vec<String> {
        self.engine
            .queue_snapshot(GUILD)
            .await
            .map(|s| s.tracks.iter().map(|t| t.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Espera a que la condición se cumpla (los handlers de fin corren en
    /// tasks watcher, no de forma síncrona con el test).
    pub async fn wait_until<F>(&self, mut cond: F)
    where
        F: FnMut() -> bool,
    {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condición no alcanzada a tiempo");
    }

    /// Espera a que la sesión del guild de pruebas haya sido destruida.
    pub async fn wait_until_session_gone(&self) {
        for _ in 0..200 {
            if self.engine.queue_snapshot(GUILD).await.is_none() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("la sesión sigue viva");
    }

    /// Drena los eventos pendientes del bus.
    pub fn drain_events(&mut self) -> Vec<MusicEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
