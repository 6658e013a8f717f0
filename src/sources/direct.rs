//! Adaptador de enlaces directos de media.
//!
//! Último en la precedencia de resolución: acepta cualquier URL http(s) y la
//! trata como stream externo. El stream se abre con un GET de reqwest sin
//! pasar por ningún extractor.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::TryStreamExt;
use serenity::model::id::UserId;
use tokio_util::io::StreamReader;
use tracing::{info, warn};
use url::Url;

use super::{MusicSource, Resolved, SourceKind, Track};
use crate::connection::AudioStream;

const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".flac", ".m4a", ".opus", ".aac"];

pub struct DirectUrlSource {
    client: reqwest::Client,
}

impl DirectUrlSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Título derivado del último segmento del path, sin extensión.
    fn title_from_url(url: &Url) -> String {
        url.path_segments()
            .and_then(|mut s| s.next_back())
            .filter(|s| !s.is_empty())
            .map(|s| {
                AUDIO_EXTENSIONS
                    .iter()
                    .find_map(|ext| s.strip_suffix(ext))
                    .unwrap_or(s)
                    .to_string()
            })
            .unwrap_or_else(|| url.host_str().unwrap_or("stream").to_string())
    }
}

impl Default for DirectUrlSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MusicSource for DirectUrlSource {
    fn source_name(&self) -> &'static str {
        "direct"
    }

    fn matches(&self, input: &str) -> bool {
        matches!(Url::parse(input), Ok(url) if matches!(url.scheme(), "http" | "https"))
    }

    async fn resolve(&self, input: &str, requested_by: UserId) -> Result<Resolved> {
        let url = Url::parse(input)?;
        let title = Self::title_from_url(&url);
        info!("🔗 Enlace directo resuelto: {}", title);

        let track = Track::new(
            input,
            title,
            input,
            SourceKind::ExternalStream,
            requested_by,
        )
        .with_stream_url(input);
        Ok(Resolved::Track(track))
    }

    async fn open_stream(&self, track: &Track, filter_args: Option<&str>) -> Result<AudioStream> {
        if filter_args.is_some() {
            // Sin grafo de audio propio no hay dónde aplicar el filtro.
            warn!("🎛️ Filtro ignorado para stream directo: {}", track.title);
        }

        let url = track.stream_url.as_deref().unwrap_or(&track.url);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("stream directo no accesible ({}): {}", response.status(), url);
        }

        info!("🔗 Stream directo abierto: {}", track.title);
        let reader = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );
        Ok(AudioStream::from_reader(Box::new(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_http_urls_only() {
        let source = DirectUrlSource::new();
        assert!(source.matches("https://radio.example.com/live.mp3"));
        assert!(source.matches("http://example.com/mix"));
        assert!(!source.matches("ftp://example.com/a.mp3"));
        assert!(!source.matches("never gonna give you up"));
    }

    #[test]
    fn test_title_from_url() {
        let url = Url::parse("https://cdn.example.com/sets/sunset-mix.mp3").unwrap();
        assert_eq!(DirectUrlSource::title_from_url(&url), "sunset-mix");

        let bare = Url::parse("https://radio.example.com/").unwrap();
        assert_eq!(DirectUrlSource::title_from_url(&bare), "radio.example.com");
    }
}
