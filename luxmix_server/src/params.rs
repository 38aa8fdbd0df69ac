use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

use luxmix_core::engine::EngineSnapshot;
use luxmix_core::matrix::PatchEntry;
use luxmix_core::message::EngineCommand;
use luxmix_core::topology::TopologyMode;

/// A value carried at one exposed address. This is the currency of both
/// the remote-control surface and preset storage, so replaying a preset is
/// literally re-dispatching what a client could have sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Float(f64),
    Text(String),
    Patch(Vec<PatchEntry>),
}

fn float(address: &str, value: &ParamValue) -> Result<f64> {
    match value {
        ParamValue::Float(v) => Ok(*v),
        _ => Err(anyhow!("{} expects a numeric value", address)),
    }
}

/// Translate an addressed value into an engine command. Addresses mirror
/// the OSC surface: `/source/<name>/<param>`, `/trigger/<name>`,
/// `/chan_levels/<channel>`, `/gain/<category>`, `/mode`,
/// `/stutter_period`, `/patchbay` and `/patchbay/clear`.
pub fn dispatch_value(address: &str, value: &ParamValue) -> Result<EngineCommand> {
    let segments: Vec<&str> = address.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["source", source, param] => Ok(EngineCommand::SetSourceParam {
            source: source.to_string(),
            param: param.to_string(),
            value: float(address, value)?,
        }),
        ["trigger", source] => Ok(EngineCommand::Trigger {
            source: source.to_string(),
        }),
        ["chan_levels", channel] => Ok(EngineCommand::SetChannelLevel {
            channel: channel.to_string(),
            level: float(address, value)?,
        }),
        ["gain", category] => Ok(EngineCommand::SetCategoryGain {
            category: category.to_string(),
            gain: float(address, value)?,
        }),
        ["mode"] => match value {
            ParamValue::Text(name) => Ok(EngineCommand::SetMode { mode: name.parse()? }),
            _ => Err(anyhow!("/mode expects a mode name")),
        },
        ["stutter_period"] => Ok(EngineCommand::SetStutterPeriod {
            period: float(address, value)?,
        }),
        ["patchbay"] => match value {
            ParamValue::Patch(entries) => Ok(EngineCommand::LoadPatch {
                entries: entries.clone(),
            }),
            _ => Err(anyhow!("/patchbay expects patch entries")),
        },
        ["patchbay", "clear"] => Ok(EngineCommand::ClearPatch { channel: None }),
        _ => bail!("no parameter at address {}", address),
    }
}

/// Every persistable address with its current value, in replay order:
/// source params first, then levels, gains, topology, and the patch last
/// so routing lands after everything it references is in place.
pub fn enumerate(snapshot: &EngineSnapshot) -> Vec<(String, ParamValue)> {
    let mut values = Vec::new();
    for source in &snapshot.sources {
        for (param, value) in &source.params {
            values.push((
                format!("/source/{}/{}", source.name, param),
                ParamValue::Float(*value),
            ));
        }
    }
    for (channel, level) in &snapshot.channel_levels {
        values.push((format!("/chan_levels/{}", channel), ParamValue::Float(*level)));
    }
    for (category, gain) in &snapshot.gains {
        values.push((format!("/gain/{}", category), ParamValue::Float(*gain)));
    }
    values.push(("/mode".to_string(), ParamValue::Text(snapshot.mode.to_string())));
    values.push((
        "/stutter_period".to_string(),
        ParamValue::Float(snapshot.stutter_period),
    ));
    values.push(("/patchbay".to_string(), ParamValue::Patch(snapshot.patch.clone())));
    values
}
