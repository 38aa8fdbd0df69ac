use anyhow::{Result, bail};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Params, Source, SourceSchema, SourceState};
use crate::util::value_map;

const NAME: &str = "wave";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WaveShape {
    Sine,
    Triangle,
    Square,
}

impl Default for WaveShape {
    fn default() -> Self {
        WaveShape::Sine
    }
}

#[derive(Debug, Clone, Params, Deserialize)]
#[serde(default)]
pub struct WaveParams {
    #[param("amp", "peak excursion above and below the offset")]
    pub amp: f64,
    #[param("period", "cycle length in milliseconds, non-zero at construction")]
    pub period: f64,
    #[param("phase", "phase shift in milliseconds")]
    pub phase: f64,
    #[param("offset", "baseline the wave is centered on")]
    pub offset: f64,
}

impl Default for WaveParams {
    fn default() -> Self {
        WaveParams {
            amp: 0.5,
            period: 1000.0,
            phase: 0.0,
            offset: 0.5,
        }
    }
}

#[derive(Deserialize)]
struct WaveConfig {
    #[serde(default)]
    shape: WaveShape,
    #[serde(flatten)]
    params: WaveParams,
}

/// Free-running periodic wave. Stateless in time: the value at a timestamp
/// depends only on the current params, so parameter edits never glitch the
/// clock the wave rides on.
pub struct WaveSource {
    name: String,
    shape: WaveShape,
    params: WaveParams,
}

impl WaveSource {
    pub fn new(name: &str, shape: WaveShape, params: WaveParams) -> Result<Self> {
        if params.period == 0.0 {
            bail!("wave source {} must be constructed with a non-zero period", name);
        }
        Ok(WaveSource {
            name: name.to_string(),
            shape,
            params,
        })
    }

    pub fn from_config(name: &str, config: &Value) -> Result<Box<dyn Source>> {
        let config: WaveConfig = serde_json::from_value(config.clone())?;
        Ok(Box::new(WaveSource::new(name, config.shape, config.params)?))
    }

    fn sample(&self, millis: f64) -> f64 {
        let WaveParams {
            amp,
            period,
            phase,
            offset,
        } = self.params;
        // Params can be driven to zero at runtime; hold the baseline rather
        // than divide.
        if period == 0.0 {
            return offset;
        }
        match self.shape {
            WaveShape::Sine => amp * (std::f64::consts::TAU * (millis + phase) / period).sin() + offset,
            WaveShape::Triangle => {
                // Starts at the offset, peaks at period/4, troughs at 3*period/4.
                let t = (millis + phase).rem_euclid(period);
                if t < period / 4.0 {
                    value_map(t, 0.0, period / 4.0, offset, offset + amp)
                } else if t < 3.0 * period / 4.0 {
                    value_map(t, period / 4.0, 3.0 * period / 4.0, offset + amp, offset - amp)
                } else {
                    value_map(t, 3.0 * period / 4.0, period, offset - amp, offset)
                }
            }
            WaveShape::Square => {
                let t = (millis + phase).rem_euclid(period);
                if t < period / 2.0 {
                    offset + amp
                } else {
                    offset - amp
                }
            }
        }
    }
}

impl Source for WaveSource {
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
}

pub fn schema() -> SourceSchema {
    SourceSchema {
        name: NAME,
        description: "free-running sine, triangle or square wave",
        params: WaveParams::schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(shape: WaveShape, amp: f64, period: f64, phase: f64, offset: f64) -> WaveSource {
        WaveSource::new(
            "w",
            shape,
            WaveParams {
                amp,
                period,
                phase,
                offset,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_sine_breakpoints() {
        let w = wave(WaveShape::Sine, 2.0, 1000.0, 0.0, 1.0);
        assert!((w.sample(0.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(250.0) - 3.0).abs() < 1e-9);
        assert!((w.sample(500.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(750.0) - -1.0).abs() < 1e-9);
        assert!((w.sample(1000.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sine_phase_shift() {
        let w = wave(WaveShape::Sine, 2.0, 1000.0, 250.0, 1.0);
        assert!((w.sample(0.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_breakpoints() {
        let w = wave(WaveShape::Triangle, 2.0, 1000.0, 0.0, 1.0);
        assert!((w.sample(0.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(250.0) - 3.0).abs() < 1e-9);
        assert!((w.sample(500.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(750.0) - -1.0).abs() < 1e-9);
        assert!((w.sample(1000.0) - 1.0).abs() < 1e-9);
        // Midpoint of the rising edge.
        assert!((w.sample(125.0) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_quarter_phase_leads_with_peak() {
        // Shifted a quarter period, the peak lands at t=0.
        let w = wave(WaveShape::Triangle, 2.0, 1000.0, 250.0, 1.0);
        assert!((w.sample(-250.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(0.0) - 3.0).abs() < 1e-9);
        assert!((w.sample(250.0) - 1.0).abs() < 1e-9);
        assert!((w.sample(500.0) - -1.0).abs() < 1e-9);
    }

    #[test]
    fn test_square_breakpoints() {
        let w = wave(WaveShape::Square, 2.0, 1000.0, 0.0, 1.0);
        assert!((w.sample(0.0) - 3.0).abs() < 1e-9);
        assert!((w.sample(499.0) - 3.0).abs() < 1e-9);
        assert!((w.sample(500.0) - -1.0).abs() < 1e-9);
        assert!((w.sample(999.0) - -1.0).abs() < 1e-9);
        assert!((w.sample(1000.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_periodicity_far_from_origin() {
        let w = wave(WaveShape::Triangle, 1.5, 700.0, 33.0, 0.25);
        for t in [0.0, 1.0, 123.0, 456.0] {
            assert!((w.sample(t) - w.sample(t + 700.0 * 1000.0)).abs() < 1e-6);
        }
    }

    #[test]
    fn test_negative_timestamps_wrap() {
        let w = wave(WaveShape::Square, 2.0, 1000.0, 0.0, 1.0);
        assert!((w.sample(-1000.0) - w.sample(0.0)).abs() < 1e-9);
        assert!((w.sample(-250.0) - w.sample(750.0)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_period_construction_rejected() {
        let result = WaveSource::new(
            "w",
            WaveShape::Sine,
            WaveParams {
                period: 0.0,
                ..WaveParams::default()
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_period_at_runtime_holds_offset() {
        let mut w = wave(WaveShape::Sine, 2.0, 1000.0, 0.0, 1.0);
        w.update_param("period", 0.0).unwrap();
        assert_eq!(w.sample(250.0), 1.0);
    }

    #[test]
    fn test_unknown_param_rejected() {
        let mut w = wave(WaveShape::Sine, 2.0, 1000.0, 0.0, 1.0);
        assert!(w.update_param("frequency", 1.0).is_err());
    }

    #[test]
    fn test_from_config_defaults() {
        let source =
            WaveSource::from_config("w", &serde_json::json!({ "shape": "triangle" })).unwrap();
        let state = source.get_state();
        assert_eq!(state.source_type, "wave");
        assert!(state.params.contains(&("period".to_string(), 1000.0)));
    }
}
