use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Params, Source, SourceSchema, SourceState};

const NAME: &str = "tempo";

#[derive(Debug, Clone, Params, Deserialize)]
#[serde(default)]
pub struct TempoParams {
    #[param("amp", "pulse height above the offset")]
    pub amp: f64,
    #[param("offset", "baseline between pulses")]
    pub offset: f64,
    #[param("duty", "pulse width in milliseconds")]
    pub duty: f64,
    #[param("bpm", "current tempo in beats per minute")]
    pub bpm: f64,
    #[param("bpm_mult", "tempo multiplier, e.g. 2.0 for eighth-note pulses")]
    pub bpm_mult: f64,
    #[param("manual_offset", "hand-dialed shift of the downbeat in milliseconds")]
    pub manual_offset: f64,
}

impl Default for TempoParams {
    fn default() -> Self {
        TempoParams {
            amp: 1.0,
            offset: 0.0,
            duty: 100.0,
            bpm: 0.0,
            bpm_mult: 1.0,
            manual_offset: 0.0,
        }
    }
}

#[derive(Deserialize)]
struct TempoConfig {
    #[serde(flatten)]
    params: TempoParams,
}

/// Beat-locked pulse train. Tempo and downbeat alignment arrive from the
/// beat tracking collaborator via `report_beat`; between reports the source
/// free-runs on the last known tempo.
pub struct TempoSource {
    name: String,
    params: TempoParams,
    // Downbeat anchor in engine milliseconds.
    beat_offset: f64,
}

impl TempoSource {
    pub fn new(name: &str, params: TempoParams) -> Self {
        TempoSource {
            name: name.to_string(),
            params,
            beat_offset: 0.0,
        }
    }

    pub fn from_config(name: &str, config: &Value) -> Result<Box<dyn Source>> {
        let config: TempoConfig = serde_json::from_value(config.clone())?;
        Ok(Box::new(TempoSource::new(name, config.params)))
    }

    fn beat_period(&self) -> Option<f64> {
        let effective = self.params.bpm * self.params.bpm_mult;
        if effective > 0.0 {
            Some(60_000.0 / effective)
        } else {
            None
        }
    }

    fn sample(&self, millis: f64) -> f64 {
        let TempoParams {
            amp,
            offset,
            duty,
            manual_offset,
            ..
        } = self.params;
        let Some(period) = self.beat_period() else {
            return offset;
        };
        let elapsed = millis - self.beat_offset - manual_offset;
        if elapsed.rem_euclid(period) < duty {
            amp + offset
        } else {
            offset
        }
    }
}

impl Source for TempoSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &'static str {
        NAME
    }

    fn value(&self, millis: f64) -> f64 {
        self.sample(millis)
    }

    fn get_state(&self) -> SourceState {
        SourceState {
            name: self.name.clone(),
            source_type: NAME.to_string(),
            params: self
                .params
                .state()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        }
    }

    fn update_param(&mut self, param_name: &str, value: f64) -> Result<()> {
        self.params.set(param_name, value, &self.name)
    }

    fn report_beat(&mut self, millis: f64, tempo_bpm: f64) {
        if tempo_bpm > 0.0 {
            self.params.bpm = tempo_bpm;
        }
        let Some(period) = self.beat_period() else {
            return;
        };
        // Blend a third of the new alignment in per report so a jittery
        // tracker nudges the downbeat instead of yanking it.
        let old = self.beat_offset.rem_euclid(period);
        let new = millis.rem_euclid(period);
        self.beat_offset = (new + 2.0 * old) / 3.0;
    }
}

pub fn schema() -> SourceSchema {
    SourceSchema {
        name: NAME,
        description: "pulse train locked to the reported beat grid",
        params: TempoParams::schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempo() -> TempoSource {
        TempoSource::new(
            "t",
            TempoParams {
                amp: 1.0,
                offset: 0.0,
                duty: 100.0,
                bpm: 120.0,
                bpm_mult: 1.0,
                manual_offset: 0.0,
            },
        )
    }

    #[test]
    fn test_pulse_grid_at_tempo() {
        // 120 bpm is a 500 ms beat.
        let t = tempo();
        assert_eq!(t.sample(0.0), 1.0);
        assert_eq!(t.sample(99.0), 1.0);
        assert_eq!(t.sample(100.0), 0.0);
        assert_eq!(t.sample(499.0), 0.0);
        assert_eq!(t.sample(500.0), 1.0);
    }

    #[test]
    fn test_bpm_mult_scales_grid() {
        let mut t = tempo();
        t.params.bpm_mult = 2.0;
        // 250 ms grid now.
        assert_eq!(t.sample(250.0), 1.0);
        assert_eq!(t.sample(125.0), 0.0);
    }

    #[test]
    fn test_unknown_tempo_holds_offset() {
        let mut t = tempo();
        t.params.bpm = 0.0;
        t.params.offset = 0.3;
        assert_eq!(t.sample(0.0), 0.3);
        assert_eq!(t.sample(777.0), 0.3);
    }

    #[test]
    fn test_manual_offset_shifts_grid() {
        let mut t = tempo();
        t.params.manual_offset = 50.0;
        assert_eq!(t.sample(49.0), 0.0);
        assert_eq!(t.sample(50.0), 1.0);
    }

    #[test]
    fn test_report_beat_updates_tempo() {
        let mut t = tempo();
        t.report_beat(0.0, 60.0);
        assert_eq!(t.params.bpm, 60.0);
        // 1000 ms beat.
        assert_eq!(t.sample(999.0), 0.0);
    }

    #[test]
    fn test_report_beat_nudges_alignment() {
        let mut t = tempo();
        t.beat_offset = 0.0;
        // A beat lands 300 ms into the 500 ms grid; the anchor moves a third
        // of the way there.
        t.report_beat(300.0, 120.0);
        assert!((t.beat_offset - 100.0).abs() < 1e-9);
        t.report_beat(300.0, 120.0);
        assert!((t.beat_offset - (300.0 + 200.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_ignores_nonpositive_tempo_report() {
        let mut t = tempo();
        t.report_beat(0.0, -10.0);
        assert_eq!(t.params.bpm, 120.0);
    }
}
