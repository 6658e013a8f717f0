use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::queue::MusicQueue;

/// Una sesión de reproducción: la cola y su unidad de serialización.
///
/// Todas las mutaciones de la cola (comandos, completions del resolver,
/// handlers de fin de stream, expiración del timer de inactividad) toman
/// este mutex, así se ejecutan como pasos discretos sin solaparse.
pub struct Session {
    pub guild_id: GuildId,
    pub queue: Mutex<MusicQueue>,
}

/// Dueño único del mapa sesión → cola.
///
/// El controlador y el watcher de inactividad solo obtienen sesiones a
/// través del registro, una operación a la vez; nunca las cachean.
pub struct QueueRegistry {
    sessions: DashMap<GuildId, Arc<Session>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        self.sessions.get(&guild_id).map(|s| s.clone())
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    /// Devuelve la sesión del guild, creándola si no existe. El booleano
    /// indica si esta llamada la creó: dos creaciones en carrera se deciden
    /// de forma atómica sobre la entrada del mapa, nunca pisándose.
    pub fn get_or_insert_with(
        &self,
        guild_id: GuildId,
        make: impl FnOnce() -> MusicQueue,
    ) -> (Arc<Session>, bool) {
        match self.sessions.entry(guild_id) {
            Entry::Occupied(entry) => (entry.get().clone(), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(Session {
                    guild_id,
                    queue: Mutex::new(make()),
                });
                info!("🆕 Cola creada para guild {}", guild_id);
                entry.insert(session.clone());
                (session, true)
            }
        }
    }

    /// Da de baja la sesión; idempotente.
    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(&guild_id).map(|(_, s)| s);
        if removed.is_some() {
            debug!("🗑️ Cola destruida para guild {}", guild_id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for QueueRegistry {
    fn default() -> Self {
        Self::new()
    }
}
