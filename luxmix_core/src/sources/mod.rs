use std::collections::HashMap;

use crate::types::{SourceConstructor, SourceSchema};

pub mod impulse;
pub mod noise;
pub mod spectral;
pub mod tempo;
pub mod wave;

/// Constructor registry, keyed by the `type` field of a source config entry.
pub fn constructors() -> HashMap<String, SourceConstructor> {
    let mut map: HashMap<String, SourceConstructor> = HashMap::new();
    map.insert(
        "wave".to_string(),
        Box::new(|name, config| wave::WaveSource::from_config(name, config)),
    );
    map.insert(
        "noise".to_string(),
        Box::new(|name, config| noise::NoiseSource::from_config(name, config)),
    );
    map.insert(
        "impulse".to_string(),
        Box::new(|name, config| impulse::ImpulseSource::from_config(name, config)),
    );
    map.insert(
        "tempo".to_string(),
        Box::new(|name, config| tempo::TempoSource::from_config(name, config)),
    );
    map.insert(
        "spectral".to_string(),
        Box::new(|name, config| spectral::SpectralSource::from_config(name, config)),
    );
    map
}

lazy_static! {
    static ref SCHEMAS: Vec<SourceSchema> = vec![
        impulse::schema(),
        noise::schema(),
        spectral::schema(),
        tempo::schema(),
        wave::schema(),
    ];
}

pub fn schemas() -> &'static [SourceSchema] {
    &SCHEMAS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_schema_has_a_constructor() {
        let constructors = constructors();
        for schema in schemas() {
            assert!(
                constructors.contains_key(schema.name),
                "no constructor for {}",
                schema.name
            );
        }
        assert_eq!(constructors.len(), schemas().len());
        // Schema listing stays sorted by type name.
        let names: Vec<&str> = schemas().iter().map(|s| s.name).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_constructors_apply_config() {
        let constructors = constructors();
        let source = constructors["wave"](
            "lfo",
            &serde_json::json!({ "shape": "square", "period": 250.0 }),
        )
        .unwrap();
        assert_eq!(source.name(), "lfo");
        assert_eq!(source.source_type(), "wave");
    }

    #[test]
    fn test_constructor_rejects_bad_config() {
        let constructors = constructors();
        let result = constructors["wave"]("lfo", &serde_json::json!({ "shape": "sawtooth" }));
        assert!(result.is_err());
    }
}
