use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Configuración del motor de colas.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    // Búsqueda
    pub search_limit: usize,
    pub search_retries: u32,
    pub search_backoff_ms: u64,
    /// Desambiguación interactiva: si está apagada se toma el primer candidato.
    pub search_interactive: bool,
    pub select_timeout_secs: u64,

    // Cola
    pub max_queue_size: usize,
    pub default_volume: u8, // porcentaje

    // Ciclo de vida del canal
    pub idle_timeout_secs: u64,
    pub leave_on_empty: bool,
    pub leave_on_stop: bool,
    pub leave_on_finish: bool,

    // Señales
    /// No emitir `PlaySong` al repetir la misma canción.
    pub emit_new_song_only: bool,
}

impl EngineConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            search_limit: env_or("SEARCH_LIMIT", "12")?,
            search_retries: env_or("SEARCH_RETRIES", "4")?,
            search_backoff_ms: env_or("SEARCH_BACKOFF_MS", "1000")?,
            search_interactive: env_or("SEARCH_INTERACTIVE", "false")?,
            select_timeout_secs: env_or("SELECT_TIMEOUT_SECS", "60")?,

            max_queue_size: env_or("MAX_QUEUE_SIZE", "1000")?,
            default_volume: env_or("DEFAULT_VOLUME", "50")?,

            idle_timeout_secs: env_or("IDLE_TIMEOUT_SECS", "60")?,
            leave_on_empty: env_or("LEAVE_ON_EMPTY", "true")?,
            leave_on_stop: env_or("LEAVE_ON_STOP", "true")?,
            leave_on_finish: env_or("LEAVE_ON_FINISH", "false")?,

            emit_new_song_only: env_or("EMIT_NEW_SONG_ONLY", "false")?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_limit == 0 || self.search_limit > 50 {
            anyhow::bail!(
                "El límite de búsqueda debe estar entre 1 y 50, se recibió: {}",
                self.search_limit
            );
        }
        if self.search_retries == 0 {
            anyhow::bail!("Los reintentos de búsqueda deben ser al menos 1");
        }
        if self.default_volume > 150 {
            anyhow::bail!(
                "El volumen por defecto no puede superar 150%, se recibió: {}",
                self.default_volume
            );
        }
        if self.max_queue_size == 0 {
            anyhow::bail!("El tamaño máximo de cola debe ser mayor que 0");
        }
        if self.select_timeout_secs == 0 || self.idle_timeout_secs == 0 {
            anyhow::bail!("Los timeouts deben ser mayores que 0");
        }
        Ok(())
    }

    pub fn select_timeout(&self) -> Duration {
        Duration::from_secs(self.select_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn search_backoff(&self) -> Duration {
        Duration::from_millis(self.search_backoff_ms)
    }

    /// Resumen seguro de la configuración para logging.
    pub fn summary(&self) -> String {
        format!(
            "Config: búsqueda {} resultados / {} reintentos, \
            cola máx {}, volumen {}%, idle {}s, \
            leave: empty={} stop={} finish={}",
            self.search_limit,
            self.search_retries,
            self.max_queue_size,
            self.default_volume,
            self.idle_timeout_secs,
            self.leave_on_empty,
            self.leave_on_stop,
            self.leave_on_finish
        )
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            search_limit: 12,
            search_retries: 4,
            search_backoff_ms: 1000,
            search_interactive: false,
            select_timeout_secs: 60,

            max_queue_size: 1000,
            default_volume: 50,

            idle_timeout_secs: 60,
            leave_on_empty: true,
            leave_on_stop: true,
            leave_on_finish: false,

            emit_new_song_only: false,
        }
    }
}

fn env_or<T>(key: &str, default: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Valor inválido para {key} ({raw}): {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.search_limit, 12);
        assert_eq!(config.idle_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.default_volume = 200;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.search_retries = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_queue_size = 0;
        assert!(config.validate().is_err());
    }
}
