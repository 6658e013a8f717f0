//! Orquestación de colas de reproducción.
//!
//! - [`queue`]: estado mutable por sesión (canciones, modos, banderas).
//! - [`registry`]: dueño único del mapa sesión → cola.
//! - [`controller`]: arranque de streams y reacción a sus eventos de fin.
//! - [`idle`]: timers de canal vacío.

pub mod queue;
pub mod registry;

pub(crate) mod controller;
pub(crate) mod idle;

pub use queue::{MusicQueue, QueueSnapshot, RepeatMode};
pub use registry::{QueueRegistry, Session};
