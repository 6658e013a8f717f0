use serenity::model::id::{GuildId, UserId};
use tokio::sync::broadcast;

use crate::sources::{Playlist, Track};

/// Señales emitidas por el motor hacia la superficie de comandos.
///
/// Cada variante lleva su payload tipado en lugar del patrón emit-and-forget
/// del observer clásico: los suscriptores saben exactamente qué reciben.
#[derive(Debug, Clone)]
pub enum MusicEvent {
    /// Se creó una cola nueva (momento para ajustar defaults).
    QueueInit { guild_id: GuildId },
    /// Comienza la reproducción de un track.
    PlaySong { guild_id: GuildId, track: Track },
    /// Track agregado a una cola ya activa.
    AddSong { guild_id: GuildId, track: Track },
    /// Playlist inicia la reproducción (cola recién creada).
    PlayList {
        guild_id: GuildId,
        playlist: Playlist,
        first: Track,
    },
    /// Playlist agregada a una cola ya activa.
    AddList { guild_id: GuildId, playlist: Playlist },
    /// Candidatos de búsqueda listos para desambiguación.
    SearchResults {
        requested_by: UserId,
        candidates: Vec<Track>,
    },
    /// La desambiguación expiró o la respuesta fue inválida.
    SearchCancel { requested_by: UserId },
    /// Canal de voz vacío: la cola fue destruida.
    Empty { guild_id: GuildId },
    /// La cola terminó de forma natural.
    Finish { guild_id: GuildId },
    /// Autoplay no encontró ningún track relacionado.
    NoRelated { guild_id: GuildId },
    /// Error recuperable con contexto de sesión.
    Error { guild_id: GuildId, message: String },
}

/// Bus de eventos del motor sobre un canal broadcast de tokio.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<MusicEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MusicEvent> {
        self.tx.subscribe()
    }

    /// Publica un evento. Sin suscriptores el envío se descarta en silencio.
    pub fn emit(&self, event: MusicEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
