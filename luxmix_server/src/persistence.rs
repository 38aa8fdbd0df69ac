use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::params::ParamValue;

pub const DEFAULT_PRESET: &str = "default";

type PresetValues = Vec<(String, ParamValue)>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct PresetFile {
    /// The preset selected when the server last ran, reloaded on startup.
    #[serde(default)]
    current: Option<String>,
    #[serde(default)]
    presets: BTreeMap<String, PresetValues>,
}

/// Named snapshots of the exposed parameter surface, all in one YAML file.
/// Every mutation writes through immediately; a crash never loses a saved
/// look.
pub struct PresetStore {
    path: PathBuf,
    file: PresetFile,
}

impl PresetStore {
    /// A missing file is an empty store; a present-but-broken file is an
    /// error, because silently starting over would shadow saved looks.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to read preset file {}", path.display()))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse preset file {}", path.display()))?
        } else {
            PresetFile::default()
        };
        Ok(PresetStore { path, file })
    }

    pub fn names(&self) -> Vec<&str> {
        self.file.presets.keys().map(|k| k.as_str()).collect()
    }

    /// The preset to replay on startup: the remembered selection when it
    /// still exists, else "default" when that does.
    pub fn startup(&self) -> Option<(&str, &[(String, ParamValue)])> {
        let name = match &self.file.current {
            Some(name) if self.file.presets.contains_key(name) => name.as_str(),
            _ => DEFAULT_PRESET,
        };
        self.file
            .presets
            .get(name)
            .map(|values| (name, values.as_slice()))
    }

    pub fn save_preset(&mut self, name: &str, values: PresetValues) -> Result<()> {
        self.file.presets.insert(name.to_string(), values);
        self.file.current = Some(name.to_string());
        self.write()
    }

    pub fn select(&mut self, name: &str) -> Result<&[(String, ParamValue)]> {
        if !self.file.presets.contains_key(name) {
            return Err(anyhow!("no preset named {}", name));
        }
        self.file.current = Some(name.to_string());
        self.write()?;
        Ok(self.file.presets[name].as_slice())
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        if self.file.presets.remove(name).is_none() {
            return Err(anyhow!("no preset named {}", name));
        }
        if self.file.current.as_deref() == Some(name) {
            self.file.current = None;
        }
        self.write()
    }

    fn write(&self) -> Result<()> {
        let contents =
            serde_yaml::to_string(&self.file).context("failed to serialize preset file")?;
        fs::write(&self.path, contents)
            .with_context(|| format!("failed to write preset file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(marker: f64) -> PresetValues {
        vec![
            ("/source/lfo/amp".to_string(), ParamValue::Float(marker)),
            ("/mode".to_string(), ParamValue::Text("mirror".to_string())),
        ]
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = PresetStore::load(dir.path().join("presets.yaml")).unwrap();
        assert!(store.names().is_empty());
        assert!(store.startup().is_none());
    }

    #[test]
    fn test_save_select_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.yaml");

        let mut store = PresetStore::load(&path).unwrap();
        store.save_preset("warm", values(1.0)).unwrap();
        store.save_preset("cold", values(2.0)).unwrap();
        assert_eq!(store.names(), vec!["cold", "warm"]);

        let selected = store.select("warm").unwrap();
        assert_eq!(selected, values(1.0).as_slice());
        assert!(store.select("missing").is_err());

        // A fresh load sees everything, including the selection.
        let reloaded = PresetStore::load(&path).unwrap();
        let (name, replay) = reloaded.startup().unwrap();
        assert_eq!(name, "warm");
        assert_eq!(replay, values(1.0).as_slice());
    }

    #[test]
    fn test_startup_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.yaml");

        let mut store = PresetStore::load(&path).unwrap();
        store.save_preset(DEFAULT_PRESET, values(3.0)).unwrap();
        store.save_preset("other", values(4.0)).unwrap();
        store.delete("other").unwrap();

        let reloaded = PresetStore::load(&path).unwrap();
        let (name, _) = reloaded.startup().unwrap();
        assert_eq!(name, DEFAULT_PRESET);
    }

    #[test]
    fn test_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = PresetStore::load(dir.path().join("presets.yaml")).unwrap();
        store.save_preset("warm", values(1.0)).unwrap();
        store.delete("warm").unwrap();
        assert!(store.names().is_empty());
        assert!(store.delete("warm").is_err());
    }

    #[test]
    fn test_broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.yaml");
        fs::write(&path, ": not yaml [").unwrap();
        assert!(PresetStore::load(&path).is_err());
    }

    #[test]
    fn test_patch_values_survive_the_file() {
        use luxmix_core::matrix::PatchEntry;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("presets.yaml");

        let patch = vec![(
            "/patchbay".to_string(),
            ParamValue::Patch(vec![PatchEntry {
                source: "lfo".to_string(),
                channel: "c1".to_string(),
                weight: 0.5,
            }]),
        )];
        let mut store = PresetStore::load(&path).unwrap();
        store.save_preset("patched", patch.clone()).unwrap();

        let reloaded = PresetStore::load(&path).unwrap();
        let (_, replay) = reloaded.startup().unwrap();
        assert_eq!(replay, patch.as_slice());
    }
}
