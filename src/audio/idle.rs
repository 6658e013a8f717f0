//! Watcher de canal inactivo.
//!
//! Cuando el canal de voz se queda sin usuarios no-bot se arma un timer
//! cancelable por sesión; si al expirar el canal sigue vacío, la cola se
//! destruye y se emite `Empty` exactamente una vez. Re-armar reemplaza el
//! timer anterior, nunca se apilan.

use std::sync::Arc;

use dashmap::DashMap;
use serenity::model::id::GuildId;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::controller;
use crate::engine::EngineInner;
use crate::events::MusicEvent;

pub(crate) struct IdleWatcher {
    timers: DashMap<GuildId, JoinHandle<()>>,
}

impl IdleWatcher {
    pub(crate) fn new() -> Self {
        Self {
            timers: DashMap::new(),
        }
    }

    /// Arma (o reemplaza) el timer de inactividad de la sesión.
    pub(crate) fn arm(&self, inner: Arc<EngineInner>, guild_id: GuildId) {
        let timeout = inner.config.idle_timeout();
        debug!("⏲️ Canal vacío en guild {}, timer de {}s armado", guild_id, timeout.as_secs());

        let task = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            let Some(session) = inner.registry.get(guild_id) else {
                return;
            };
            let mut q = session.queue.lock().await;
            if q.stopped {
                return;
            }
            // Re-chequeo de ocupación: un join de último momento gana al
            // disparo tardío del timer.
            if !q.connection.is_empty() {
                debug!("⏲️ Timer expiró pero el canal ya no está vacío (guild {})", guild_id);
                return;
            }

            info!("👋 Canal vacío tras el timeout, abandonando guild {}", guild_id);
            // El task se da de baja del mapa sin abortarse: el `cancel` que
            // dispara `destroy_locked` ya no encuentra su handle y el leave
            // posterior corre hasta el final.
            inner.idle.disarm(guild_id);
            let connection = q.connection.clone();
            controller::destroy_locked(&inner, guild_id, &mut q);
            connection.leave().await;
            inner.events.emit(MusicEvent::Empty { guild_id });
        });

        if let Some(previous) = self.timers.insert(guild_id, task) {
            previous.abort();
        }
    }

    /// Quita el timer del mapa sin abortarlo; lo usa el propio task al
    /// expirar, que no puede sobrevivir a un abort sobre sí mismo.
    pub(crate) fn disarm(&self, guild_id: GuildId) {
        self.timers.remove(&guild_id);
    }

    /// Cancela el timer pendiente, si lo hay. Idempotente.
    pub(crate) fn cancel(&self, guild_id: GuildId) {
        if let Some((_, task)) = self.timers.remove(&guild_id) {
            task.abort();
            debug!("⏲️ Timer de inactividad cancelado para guild {}", guild_id);
        }
    }
}
