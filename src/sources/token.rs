//! Servicio de refresco del token de catálogo.
//!
//! Estado compartido entre sesiones: un solo dueño con su propia
//! sincronización interna. El resolver solo lee a través de [`TokenManager::bearer`];
//! la lógica de colas nunca muta el token directamente.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Concesión de token devuelta por el cliente de auth externo.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Duration,
}

/// Cliente de auth crudo (client-credentials o similar), colaborador externo.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch(&self) -> Result<TokenGrant>;
}

#[derive(Debug)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// Dueño del token bearer con refresco perezoso.
pub struct TokenManager {
    provider: Arc<dyn TokenProvider>,
    // Mutex async: serializa el refresco, un solo fetch aunque varios
    // resolvers pidan el token a la vez.
    state: Mutex<Option<CachedToken>>,
    margin: Duration,
}

impl TokenManager {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            state: Mutex::new(None),
            margin: Duration::from_secs(30),
        }
    }

    /// Token vigente, refrescando contra el proveedor si expiró.
    pub async fn bearer(&self) -> Result<String> {
        let mut state = self.state.lock().await;

        if let Some(cached) = state.as_ref() {
            if Instant::now() + self.margin < cached.expires_at {
                debug!("🔑 Token de catálogo vigente en caché");
                return Ok(cached.token.clone());
            }
        }

        let grant = self.provider.fetch().await?;
        info!("🔑 Token de catálogo refrescado ({}s)", grant.expires_in.as_secs());
        let token = grant.access_token.clone();
        *state = Some(CachedToken {
            token: grant.access_token,
            expires_at: Instant::now() + grant.expires_in,
        });
        Ok(token)
    }
}
