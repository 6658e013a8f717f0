//! Controlador de reproducción.
//!
//! Construye el stream de la cabeza de la cola, lo adjunta a la conexión y
//! reacciona a los eventos de fin (natural, forzado o con error) avanzando o
//! reparando la cola. Todas las funciones operan con el mutex de la sesión ya
//! tomado; los eventos de fin llegan por tasks watcher que re-toman el mutex.

use std::sync::Arc;

use chrono::Utc;
use futures::future::BoxFuture;
use serenity::model::id::GuildId;
use tracing::{debug, info, warn};

use super::queue::{MusicQueue, RepeatMode};
use crate::connection::{PlayOptions, TrackEnd};
use crate::engine::EngineInner;
use crate::events::MusicEvent;
use crate::filters;
use crate::sources::{SourceKind, Track};

/// Inicia la reproducción de la cabeza de la cola.
///
/// Los fallos de construcción de stream no abortan la cola: se reportan como
/// evento `Error`, la canción ofensora se descarta y se intenta la siguiente.
/// El bucle está acotado por el largo de la cola; si se vacía, la sesión
/// termina de forma normal.
///
/// El futuro va en un box: los handlers de fin que despachan los watchers
/// vuelven a entrar aquí, y sin el box el ciclo de tipos resultante no
/// satisface el `Send` que exige `tokio::spawn`.
pub(crate) fn start_locked<'a>(
    inner: &'a Arc<EngineInner>,
    guild_id: GuildId,
    q: &'a mut MusicQueue,
) -> BoxFuture<'a, ()> {
    Box::pin(async move {
        loop {
            let Some(head) = q.songs.front() else {
                destroy_locked(inner, guild_id, q);
                return;
            };

            // Un track de catálogo pendiente nunca se streamea: se re-resuelve
            // contra el proveedor de media justo antes de sonar.
            if head.kind == SourceKind::CatalogPending {
                match inner.resolver.resolve_pending(head).await {
                    Ok(found) => q.songs[0] = found,
                    Err(e) => {
                        report_drop(inner, guild_id, q, &format!("no se pudo resolver: {e}"));
                        continue;
                    }
                }
            }

            // La cabeza es dueña del stream; clon para abrir sin retener préstamo.
            let track = match q.songs.front() {
                Some(t) => t.clone(),
                None => continue,
            };
            let filter_args = q.filter.and_then(filters::args);

            let stream = match inner.resolver.media().open_stream(&track, filter_args).await {
                Ok(s) => s,
                Err(e) => {
                    report_drop(inner, guild_id, q, &format!("no se pudo abrir el stream: {e}"));
                    continue;
                }
            };

            // Reemplaza cualquier stream anterior (p. ej. replay por filtro);
            // su evento de fin quedará obsoleto por generación.
            if let Some(old) = q.current.take() {
                old.stop();
            }

            let options = PlayOptions {
                volume: f32::from(q.volume) / 100.0,
            };
            let handle = match q.connection.play(stream, options).await {
                Ok(h) => h,
                Err(e) => {
                    report_drop(inner, guild_id, q, &format!("no se pudo adjuntar el stream: {e}"));
                    continue;
                }
            };

            q.stream_seq += 1;
            let seq = q.stream_seq;
            if let Some(head) = q.songs.front_mut() {
                head.started_at = Some(Utc::now());
            }
            q.paused = false;
            q.current = Some(handle.clone());

            info!("🎵 Reproduciendo: {} [{}]", track.title, track.formatted_duration());

            let watcher_inner = inner.clone();
            tokio::spawn(async move {
                let end = handle.ended().await;
                on_track_end(&watcher_inner, guild_id, seq, end).await;
            });

            if should_emit_play(inner, q) {
                inner.events.emit(MusicEvent::PlaySong {
                    guild_id,
                    track,
                });
            }
            return;
        }
    })
}

/// Handler de fin de stream; descarta generaciones obsoletas y colas paradas.
pub(crate) async fn on_track_end(
    inner: &Arc<EngineInner>,
    guild_id: GuildId,
    seq: u64,
    end: TrackEnd,
) {
    let Some(session) = inner.registry.get(guild_id) else {
        return;
    };
    let mut q = session.queue.lock().await;
    if q.stopped || seq != q.stream_seq {
        debug!("⏳ Evento de fin obsoleto para guild {} (gen {})", guild_id, seq);
        return;
    }

    match end {
        TrackEnd::Finished => handle_finish(inner, guild_id, &mut q).await,
        TrackEnd::Errored(message) => handle_error(inner, guild_id, &mut q, message).await,
    }
}

async fn handle_finish(inner: &Arc<EngineInner>, guild_id: GuildId, q: &mut MusicQueue) {
    // Canal vacío: no se avanza más, la cola muere aquí.
    if inner.config.leave_on_empty && q.connection.is_empty() {
        let connection = q.connection.clone();
        destroy_locked(inner, guild_id, q);
        connection.leave().await;
        inner.events.emit(MusicEvent::Empty { guild_id });
        return;
    }

    if q.repeat == RepeatMode::All && !q.skipped {
        if let Some(head) = q.songs.front().cloned() {
            q.songs.push_back(head);
        }
    }

    // Cola efectivamente vacía tras este fin.
    if q.songs.len() <= 1 && (q.skipped || q.repeat == RepeatMode::Off) {
        let autoplay = q.autoplay;
        if autoplay {
            match autoplay_candidate(inner, q).await {
                Some(track) => {
                    info!("♾️ Autoplay agrega: {}", track.title);
                    q.songs.push_back(track);
                }
                None => {
                    warn!("♾️ Autoplay sin candidatos relacionados");
                    inner.events.emit(MusicEvent::NoRelated { guild_id });
                }
            }
        }

        if q.songs.len() <= 1 {
            let connection = q.connection.clone();
            destroy_locked(inner, guild_id, q);
            if inner.config.leave_on_finish {
                connection.leave().await;
            }
            if !autoplay {
                inner.events.emit(MusicEvent::Finish { guild_id });
            }
            return;
        }
    }

    // Un skip explícito siempre avanza, incluso con repetición de canción.
    let was_skipped = q.skipped;
    q.skipped = false;
    if q.repeat != RepeatMode::Song || was_skipped {
        q.songs.pop_front();
    }

    start_locked(inner, guild_id, q).await;
}

async fn handle_error(
    inner: &Arc<EngineInner>,
    guild_id: GuildId,
    q: &mut MusicQueue,
    message: String,
) {
    warn!("❌ Error de stream en guild {}: {}", guild_id, message);
    inner.events.emit(MusicEvent::Error {
        guild_id,
        message: format!("Problema reproduciendo la canción: {message}"),
    });

    // La canción ofensora se descarta sin reintento; el error de stream
    // nunca es fatal para la cola por sí solo.
    q.songs.pop_front();
    q.skipped = false;
    if q.songs.is_empty() {
        destroy_locked(inner, guild_id, q);
    } else {
        start_locked(inner, guild_id, q).await;
    }
}

/// Da de baja la sesión. El lock de la cola sigue en manos del llamador; los
/// que esperaban el mutex verán `stopped` y tratarán la cola como ausente.
pub(crate) fn destroy_locked(inner: &Arc<EngineInner>, guild_id: GuildId, q: &mut MusicQueue) {
    q.stopped = true;
    q.stream_seq += 1;
    if let Some(handle) = q.current.take() {
        handle.stop();
    }
    inner.registry.remove(guild_id);
    inner.idle.cancel(guild_id);
}

/// Un candidato relacionado con duración utilizable para autoplay.
async fn autoplay_candidate(inner: &Arc<EngineInner>, q: &mut MusicQueue) -> Option<Track> {
    let head = q.songs.front()?;
    let requested_by = head.requested_by;

    let candidates = match &head.related {
        Some(cached) => cached.clone(),
        None => inner.resolver.related(head).await.unwrap_or_default(),
    };

    candidates
        .into_iter()
        .find(|t| t.has_usable_duration())
        .map(|mut t| {
            t.requested_by = requested_by;
            t
        })
}

fn report_drop(inner: &Arc<EngineInner>, guild_id: GuildId, q: &mut MusicQueue, cause: &str) {
    let title = q
        .songs
        .front()
        .map(|t| t.title.clone())
        .unwrap_or_default();
    warn!("❌ Descartando '{}' en guild {}: {}", title, guild_id, cause);
    inner.events.emit(MusicEvent::Error {
        guild_id,
        message: format!("No se pudo reproducir '{title}': {cause}"),
    });
    q.songs.pop_front();
}

fn should_emit_play(inner: &Arc<EngineInner>, q: &MusicQueue) -> bool {
    if !inner.config.emit_new_song_only {
        return true;
    }
    if q.repeat == RepeatMode::Song {
        return false;
    }
    match (q.songs.front(), q.songs.get(1)) {
        (Some(current), Some(next)) => current.id != next.id,
        _ => true,
    }
}
