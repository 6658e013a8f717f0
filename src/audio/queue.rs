use std::collections::VecDeque;
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::connection::{TrackHandle, VoiceConnection};
use crate::error::EngineError;
use crate::sources::Track;

/// Modo de repetición de la cola.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    Off,
    Song,
    All,
}

impl RepeatMode {
    /// Ciclo Off → Song → All → Off.
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Song,
            RepeatMode::Song => RepeatMode::All,
            RepeatMode::All => RepeatMode::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Song => "canción",
            RepeatMode::All => "cola",
        }
    }
}

/// Estado mutable de una sesión de reproducción.
///
/// Siempre se accede bajo el mutex de la sesión; las banderas `paused` /
/// `stopped` / `skipped` son señales transitorias que consumen los handlers
/// de fin de stream. `stream_seq` numera cada stream iniciado: un evento de
/// fin cuya generación no coincide es obsoleto y se descarta.
pub struct MusicQueue {
    pub(crate) songs: VecDeque<Track>,
    pub(crate) repeat: RepeatMode,
    pub(crate) autoplay: bool,
    pub(crate) filter: Option<&'static str>,
    pub(crate) volume: u8,
    pub(crate) connection: Arc<dyn VoiceConnection>,
    pub(crate) current: Option<Arc<dyn TrackHandle>>,
    pub(crate) paused: bool,
    pub(crate) stopped: bool,
    pub(crate) skipped: bool,
    pub(crate) stream_seq: u64,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(connection: Arc<dyn VoiceConnection>, volume: u8, max_size: usize) -> Self {
        Self {
            songs: VecDeque::new(),
            repeat: RepeatMode::Off,
            autoplay: false,
            filter: None,
            volume,
            connection,
            current: None,
            paused: false,
            stopped: false,
            skipped: false,
            stream_seq: 0,
            max_size,
        }
    }

    pub fn head(&self) -> Option<&Track> {
        self.songs.front()
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    /// Agrega un track al final de la cola.
    pub fn push(&mut self, track: Track) -> Result<(), EngineError> {
        if self.songs.len() >= self.max_size {
            return Err(EngineError::QueueFull(self.max_size));
        }
        info!("➕ Agregado a la cola: {}", track.title);
        self.songs.push_back(track);
        Ok(())
    }

    /// Agrega varios tracks preservando el orden de origen.
    pub fn push_many(&mut self, tracks: Vec<Track>) -> Result<usize, EngineError> {
        let space = self.max_size.saturating_sub(self.songs.len());
        if space == 0 {
            return Err(EngineError::QueueFull(self.max_size));
        }
        let added = tracks.len().min(space);
        for track in tracks.into_iter().take(added) {
            self.songs.push_back(track);
        }
        info!("➕ Agregadas {} canciones a la cola", added);
        Ok(added)
    }

    /// Inserta tracks justo después de la cabeza (reproducción inmediata),
    /// con el mismo tope de capacidad que [`Self::push_many`].
    pub fn splice_after_head(&mut self, tracks: Vec<Track>) -> Result<usize, EngineError> {
        let space = self.max_size.saturating_sub(self.songs.len());
        if space == 0 {
            return Err(EngineError::QueueFull(self.max_size));
        }
        let added = tracks.len().min(space);
        for track in tracks.into_iter().take(added).rev() {
            self.songs.insert(1.min(self.songs.len()), track);
        }
        Ok(added)
    }

    /// Mezcla la cola dejando la cabeza (canción actual) intacta.
    pub fn shuffle_tail(&mut self) {
        if self.songs.len() <= 2 {
            return;
        }
        let slice = self.songs.make_contiguous();
        slice[1..].shuffle(&mut rand::thread_rng());
        info!("🔀 Cola mezclada ({} canciones)", self.songs.len() - 1);
    }

    /// Descarta las entradas entre la cabeza y la posición `n` (1-based),
    /// de modo que el avance por skip aterrice exactamente en la entrada `n`.
    pub fn jump_truncate(&mut self, n: usize) -> Result<(), EngineError> {
        if n < 1 || n > self.songs.len() {
            return Err(EngineError::InvalidIndex(n));
        }
        if n >= 2 {
            self.songs.drain(1..n - 1);
        }
        debug!("⏭️ Salto preparado hacia la posición {}", n);
        Ok(())
    }

    /// Cambia el modo de repetición; re-seleccionar el modo actual lo apaga,
    /// sin modo explícito se cicla Off → Song → All → Off.
    pub fn set_repeat(&mut self, mode: Option<RepeatMode>) -> RepeatMode {
        self.repeat = match mode {
            None => self.repeat.next(),
            Some(m) if m == self.repeat => RepeatMode::Off,
            Some(m) => m,
        };
        info!("🔁 Modo de repetición: {}", self.repeat.as_str());
        self.repeat
    }

    pub fn toggle_autoplay(&mut self) -> bool {
        self.autoplay = !self.autoplay;
        info!(
            "♾️ Autoplay {}",
            if self.autoplay { "activado" } else { "desactivado" }
        );
        self.autoplay
    }

    /// Vista inmutable del estado para la superficie de comandos.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            tracks: self.songs.iter().cloned().collect(),
            repeat: self.repeat,
            autoplay: self.autoplay,
            volume: self.volume,
            filter: self.filter,
            paused: self.paused,
        }
    }
}

/// Copia inmutable del estado de una cola.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub tracks: Vec<Track>,
    pub repeat: RepeatMode,
    pub autoplay: bool,
    pub volume: u8,
    pub filter: Option<&'static str>,
    pub paused: bool,
}
