use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::json;

use luxmix_core::channels::{ChannelDef, ChannelLayout};
use luxmix_core::sources;
use luxmix_core::topology::{DirectFixture, FixtureLayout, FixturePair};
use luxmix_core::types::Source;

fn default_tick_ms() -> u64 {
    luxmix_core::engine::DEFAULT_TICK.as_millis() as u64
}

fn default_history_ms() -> f64 {
    5000.0
}

/// One source declaration: a registry type name plus whatever extra keys
/// that type's constructor understands.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    #[serde(flatten)]
    pub config: serde_json::Value,
}

/// The rig description: everything the engine needs that is decided before
/// the first tick. A broken config file is fatal at startup; there is no
/// sensible half-configured rig to fall back to.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    #[serde(default = "default_history_ms")]
    pub history_ms: f64,
    pub channels: Vec<ChannelDef>,
    #[serde(default)]
    pub fixtures: FixtureLayout,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl EngineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let config: EngineConfig = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn channel_layout(&self) -> Result<ChannelLayout> {
        ChannelLayout::new(self.channels.clone())
    }

    pub fn build_sources(&self) -> Result<Vec<Box<dyn Source>>> {
        let constructors = sources::constructors();
        let mut built = Vec::with_capacity(self.sources.len());
        for entry in &self.sources {
            let constructor = constructors.get(&entry.source_type).ok_or_else(|| {
                anyhow!(
                    "source {} has unknown type {}",
                    entry.name,
                    entry.source_type
                )
            })?;
            let source = constructor(&entry.name, &entry.config)
                .with_context(|| format!("failed to construct source {}", entry.name))?;
            built.push(source);
        }
        Ok(built)
    }
}

fn chan(name: &str, category: &str, base_level: f64) -> ChannelDef {
    ChannelDef {
        name: name.to_string(),
        category: category.to_string(),
        base_level,
    }
}

fn entry(name: &str, source_type: &str, config: serde_json::Value) -> SourceEntry {
    SourceEntry {
        name: name.to_string(),
        source_type: source_type.to_string(),
        config,
    }
}

impl Default for EngineConfig {
    /// The house rig: ten faced channels across five left/right pairs, two
    /// under-stage and three ceiling washes, a spot and a sodium practical
    /// wired straight through.
    fn default() -> Self {
        let mut channels = Vec::new();
        for i in 1..=10 {
            channels.push(chan(&format!("chan_{}", i), "face", 0.0));
        }
        channels.push(chan("under_1", "wash", 0.0));
        channels.push(chan("under_2", "wash", 0.0));
        channels.push(chan("ceil_1", "wash", 0.0));
        channels.push(chan("ceil_2", "wash", 0.0));
        channels.push(chan("ceil_3", "wash", 0.0));
        channels.push(chan("chan_spot", "static", 0.0));
        channels.push(chan("sodium", "static", 0.0));

        let fixtures = FixtureLayout {
            direct: vec![
                DirectFixture {
                    channel: "under_1".to_string(),
                    address: 10,
                },
                DirectFixture {
                    channel: "under_2".to_string(),
                    address: 11,
                },
                DirectFixture {
                    channel: "chan_spot".to_string(),
                    address: 13,
                },
                DirectFixture {
                    channel: "sodium".to_string(),
                    address: 14,
                },
                DirectFixture {
                    channel: "ceil_1".to_string(),
                    address: 15,
                },
                DirectFixture {
                    channel: "ceil_2".to_string(),
                    address: 16,
                },
                DirectFixture {
                    channel: "ceil_3".to_string(),
                    address: 17,
                },
            ],
            // Front to back; the odd 12/9 pairing matches how the rig is
            // physically addressed.
            pairs: vec![
                FixturePair { left: 12, right: 9 },
                FixturePair { left: 4, right: 5 },
                FixturePair { left: 3, right: 6 },
                FixturePair { left: 2, right: 7 },
                FixturePair { left: 1, right: 8 },
            ],
        };

        let sources = vec![
            entry(
                "sin_1",
                "wave",
                json!({ "shape": "sine", "amp": 127.5, "offset": 127.5, "period": 3500.0 }),
            ),
            entry(
                "sin_2",
                "wave",
                json!({ "shape": "sine", "amp": 127.5, "offset": 127.5, "period": 900.0 }),
            ),
            entry(
                "tri_1",
                "wave",
                json!({ "shape": "triangle", "amp": 127.5, "offset": 127.5, "period": 2000.0 }),
            ),
            entry(
                "sq_1",
                "wave",
                json!({ "shape": "square", "amp": 127.5, "offset": 127.5, "period": 1200.0 }),
            ),
            entry(
                "noise_1",
                "noise",
                json!({ "amp": 255.0, "period": 150.0 }),
            ),
            entry(
                "imp_1",
                "impulse",
                json!({ "amp": 255.0, "period": 500.0, "duty": 80.0, "echo": 3.0, "decay": 0.6 }),
            ),
            entry(
                "imp_2",
                "impulse",
                json!({ "amp": 255.0, "period": 250.0, "duty": 40.0, "echo": 1.0 }),
            ),
            entry(
                "bpm_1",
                "tempo",
                json!({ "amp": 255.0, "duty": 60.0 }),
            ),
            entry(
                "fft_low",
                "spectral",
                json!({ "subdivisions": 10, "amp": 255.0, "low": 0.0, "high": 0.34 }),
            ),
            entry(
                "fft_high",
                "spectral",
                json!({ "subdivisions": 10, "amp": 255.0, "low": 0.66, "high": 1.0 }),
            ),
        ];

        EngineConfig {
            tick_ms: default_tick_ms(),
            history_ms: default_history_ms(),
            channels,
            fixtures,
            sources,
        }
    }
}
