use thiserror::Error;

/// Errores del motor de colas.
///
/// Los comandos devuelven estos errores de forma síncrona; los fallos que
/// ocurren dentro de callbacks asíncronos (fin de stream, timers) se reportan
/// como evento [`crate::events::MusicEvent::Error`] y nunca tumban el proceso.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No hay cola activa para el guild.
    #[error("no hay reproducción activa en este servidor")]
    NotPlaying,

    /// Skip sin canciones restantes ni autoplay.
    #[error("no hay más canciones en la cola")]
    NoSong,

    /// Índice de jump fuera de rango.
    #[error("índice fuera de rango: {0}")]
    InvalidIndex(usize),

    /// Nombre de filtro no reconocido.
    #[error("filtro desconocido: {0}")]
    UnknownFilter(String),

    /// Ningún adaptador pudo resolver la entrada.
    #[error("no se encontró ningún resultado para: {0}")]
    NotFound(String),

    /// La playlist no contiene ninguna canción utilizable.
    #[error("la playlist no contiene canciones reproducibles")]
    EmptyPlaylist,

    /// La cola alcanzó su tamaño máximo.
    #[error("la cola está llena (máximo {0} canciones)")]
    QueueFull(usize),

    /// Búsqueda interactiva cancelada (timeout o respuesta inválida).
    #[error("búsqueda cancelada")]
    SearchCancelled,

    /// No se pudo establecer la conexión de voz.
    #[error("no se pudo unir al canal de voz: {0}")]
    Join(#[source] anyhow::Error),

    /// Fallo del proveedor tras agotar los reintentos.
    #[error("error del proveedor: {0}")]
    Provider(#[from] anyhow::Error),
}
