use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Upper bound of the transport's valid slot value range.
pub const DMX_MAX: f64 = 255.0;

/// One mixed output vector, one scalar per logical channel.
pub type Frame = Vec<f64>;

/// Typed parameter table for a source, generated by `#[derive(Params)]`.
///
/// Every settable field is addressed by a stable name; setting an unknown
/// name is an error reported to the caller, never a silent no-op.
pub trait Params {
    fn state(&self) -> Vec<(&'static str, f64)>;
    fn set(&mut self, param_name: &str, value: f64, source_name: &str) -> Result<()>;
    fn schema() -> &'static [ParamSchema]
    where
        Self: Sized;
}

/// A named, time-varying signal source.
///
/// `value` is a pure function of the timestamp given the current parameter
/// state; all mutation goes through `update_param` or one of the narrow
/// ingestion hooks below, and only ever on the engine thread.
pub trait Source: Send {
    fn name(&self) -> &str;
    fn source_type(&self) -> &'static str;
    fn value(&self, millis: f64) -> f64;
    fn get_state(&self) -> SourceState;
    fn update_param(&mut self, param_name: &str, value: f64) -> Result<()>;

    /// Restart the source's pulse train at `millis`. No-op for sources
    /// without a trigger concept.
    fn trigger(&mut self, _millis: f64) {}

    /// Ingest a band vector from the spectral analysis collaborator.
    fn forward(&mut self, _bands: &[f64], _millis: f64) {}

    /// Ingest a detected downbeat from the beat tracking collaborator.
    fn report_beat(&mut self, _millis: f64, _tempo_bpm: f64) {}
}

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize)]
pub struct ParamSchema {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Serialize)]
pub struct SourceSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub params: &'static [ParamSchema],
}

/// Serializable snapshot of a source's identity and parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    pub name: String,
    pub source_type: String,
    pub params: Vec<(String, f64)>,
}

pub type SourceConstructor = Box<dyn Fn(&str, &serde_json::Value) -> Result<Box<dyn Source>>>;
