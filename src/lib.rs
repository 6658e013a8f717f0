//! 🎵 Cadencia — Motor de colas de reproducción por sesión
//!
//! Orquesta colas de audio independientes por guild: resolución de entrada
//! heterogénea a tracks, máquina de estados de la cola (repetición, autoplay,
//! filtros, volumen), avance automático al terminar cada stream y abandono de
//! canales inactivos. El transporte de voz y los proveedores de catálogo y
//! media quedan detrás de traits, inyectados por la aplicación anfitriona.

pub mod audio;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod events;
pub mod filters;
pub mod sources;

pub use audio::{QueueSnapshot, RepeatMode};
pub use config::EngineConfig;
pub use connection::{
    AudioStream, ConnectionProvider, PlayOptions, TrackEnd, TrackHandle, VoiceConnection,
};
pub use engine::MusicEngine;
pub use error::EngineError;
pub use events::MusicEvent;
pub use sources::{
    CatalogApi, MusicSource, Playlist, Resolved, SearchSelector, SourceKind, Track, TrackResolver,
};
