//! Tabla estática de filtros de audio.
//!
//! Cada filtro mapea a la cadena de argumentos de grafo de audio (formato
//! ffmpeg `-af`) que el adaptador de streaming aplica al construir el stream.

/// Filtros soportados con su cadena de argumentos.
const FILTERS: &[(&str, &str)] = &[
    ("3d", "apulsator=hz=0.125"),
    (
        "bassboost",
        "dynaudnorm=f=150:g=15,equalizer=f=40:width_type=h:width=50:g=10",
    ),
    ("echo", "aecho=0.8:0.9:1000:0.3"),
    ("flanger", "flanger"),
    ("gate", "agate"),
    ("haas", "haas"),
    ("karaoke", "stereotools=mlev=0.1"),
    (
        "nightcore",
        "asetrate=48000*1.25,aresample=48000,equalizer=f=40:width_type=h:width=50:g=10",
    ),
    ("reverse", "areverse"),
    ("vaporwave", "asetrate=48000*0.8,aresample=48000,atempo=1.1"),
];

/// Nombre canónico del filtro si existe en la tabla.
pub fn canonical(name: &str) -> Option<&'static str> {
    FILTERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(n, _)| *n)
}

/// Argumentos del grafo de audio para un filtro reconocido.
pub fn args(name: &str) -> Option<&'static str> {
    FILTERS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, a)| *a)
}

/// Lista de todos los nombres de filtro soportados.
pub fn supported() -> Vec<&'static str> {
    FILTERS.iter().map(|(n, _)| *n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_filters() {
        assert_eq!(args("bassboost").unwrap().split(',').count(), 2);
        assert!(args("nightcore").is_some());
        assert_eq!(canonical("NIGHTCORE"), Some("nightcore"));
        assert!(args("trapnation").is_none());
    }

    #[test]
    fn test_supported_list() {
        let names = supported();
        assert_eq!(names.len(), 10);
        assert!(names.contains(&"vaporwave"));
    }
}
