use serde::{Deserialize, Serialize};

use crate::channels::ChannelDef;
use crate::matrix::PatchEntry;
use crate::topology::{FixtureLayout, TopologyMode};

/// Everything the outside world may ask of the engine. Commands are queued
/// and applied between ticks, so each tick sees a consistent state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineCommand {
    SetSourceParam {
        source: String,
        param: String,
        value: f64,
    },
    Trigger {
        source: String,
    },
    Route {
        source: String,
        channels: Vec<String>,
    },
    Connect {
        source: String,
        channel: String,
        weight: f64,
    },
    ClearPatch {
        channel: Option<String>,
    },
    LoadPatch {
        entries: Vec<PatchEntry>,
    },
    SetChannelLevel {
        channel: String,
        level: f64,
    },
    SetCategoryGain {
        category: String,
        gain: f64,
    },
    SetMode {
        mode: TopologyMode,
    },
    SetStutterPeriod {
        period: f64,
    },
    Bands {
        bands: Vec<f64>,
        millis: f64,
    },
    Beat {
        millis: f64,
        tempo_bpm: f64,
    },
    /// Swap the rig shape under a running loop. Patch and history restart
    /// against the new channels; sources keep their state.
    Reconfigure {
        channels: Vec<ChannelDef>,
        fixtures: FixtureLayout,
    },
    /// Force a snapshot refresh with no other effect.
    Publish,
    Shutdown,
}

/// Engine-to-server notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EngineEvent {
    /// A queued command could not be applied; the loop carried on.
    CommandRejected { reason: String },
    TransportConnected,
    TransportDisconnected,
    Stopped,
}
