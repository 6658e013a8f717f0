//! Contratos con la capa de transporte de voz.
//!
//! El motor nunca habla el protocolo de voz directamente: el bot que lo
//! integra implementa estos traits sobre su backend real (songbird u otro)
//! y el motor solo orquesta streams contra los handles.

use std::fmt;
use std::io::Cursor;

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::io::AsyncRead;

/// Stream de bytes de audio listo para entregar al transporte.
pub struct AudioStream {
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl AudioStream {
    pub fn from_reader(reader: Box<dyn AsyncRead + Send + Unpin>) -> Self {
        Self { reader }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            reader: Box::new(Cursor::new(bytes)),
        }
    }

    /// Stream vacío, útil en tests y como placeholder.
    pub fn silence() -> Self {
        Self::from_bytes(Vec::new())
    }

    pub fn into_reader(self) -> Box<dyn AsyncRead + Send + Unpin> {
        self.reader
    }
}

impl fmt::Debug for AudioStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AudioStream")
    }
}

/// Opciones de reproducción al adjuntar un stream.
#[derive(Debug, Clone, Copy)]
pub struct PlayOptions {
    /// Ganancia lineal, 1.0 = 100%.
    pub volume: f32,
}

/// Cómo terminó un stream adjuntado a la conexión.
#[derive(Debug, Clone)]
pub enum TrackEnd {
    /// Fin natural o forzado vía [`TrackHandle::stop`].
    Finished,
    /// El stream falló a mitad de reproducción.
    Errored(String),
}

/// Handle del stream vivo en la conexión.
#[async_trait]
pub trait TrackHandle: Send + Sync {
    fn pause(&self);
    fn resume(&self);
    /// Fuerza el fin del stream; el evento de fin llega por [`Self::ended`].
    fn stop(&self);
    fn set_volume(&self, volume: f32);

    /// Se resuelve exactamente una vez, cuando el stream termina.
    async fn ended(&self) -> TrackEnd;
}

/// Conexión de voz viva, propiedad exclusiva de una cola.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Adjunta un stream y devuelve su handle.
    async fn play(
        &self,
        stream: AudioStream,
        options: PlayOptions,
    ) -> Result<std::sync::Arc<dyn TrackHandle>>;

    /// Abandona el canal de voz liberando la conexión.
    async fn leave(&self);

    /// Consulta síncrona de ocupación: `true` si no quedan usuarios no-bot.
    fn is_empty(&self) -> bool;
}

/// Fábrica de conexiones de voz (capa de señalización externa).
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<std::sync::Arc<dyn VoiceConnection>>;
}
