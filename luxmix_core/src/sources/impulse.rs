use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Params, Source, SourceSchema, SourceState};

const NAME: &str = "impulse";

#[derive(Debug, Clone, Params, Deserialize)]
#[serde(default)]
pub struct ImpulseParams {
    #[param("amp", "height of the first pulse above the offset")]
    pub amp: f64,
    #[param("offset", "baseline outside the pulse windows")]
    pub offset: f64,
    #[param("period", "spacing of echo repeats in milliseconds")]
    pub period: f64,
    #[param("duty", "width of each pulse window in milliseconds")]
    pub duty: f64,
    #[param("echo", "number of repeats per trigger, at least 1")]
    pub echo: f64,
    #[param("decay", "per-repeat amplitude multiplier, non-negative")]
    pub decay: f64,
}

impl Default for ImpulseParams {
    fn default() -> Self {
        ImpulseParams {
            amp: 1.0,
            offset: 0.0,
            period: 500.0,
            duty: 100.0,
            echo: 1.0,
            decay: 0.5,
        }
    }
}

#[derive(Deserialize)]
struct ImpulseConfig {
    #[serde(flatten)]
    params: ImpulseParams,
}

/// Triggered pulse train: each trigger emits `echo` rectangular pulses
/// spaced `period` apart, each `decay` times the height of the one before.
/// Retriggering moves the train's origin; it does not stack.
pub struct ImpulseSource {
    name: String,
    params: ImpulseParams,
    // Engine timestamp of the most recent trigger. Seeded far in the past
    // so a fresh source rests at its offset.
    trigger_point: f64,
}

impl ImpulseSource {
    pub fn new(name: &str, params: ImpulseParams) -> Self {
        ImpulseSource {
            name: name.to_string(),
            params,
            trigger_point: f64::MIN,
        }
    }

    pub fn from_config(name: &str, config: &Value) -> Result<Box<dyn Source>> {
        let config: ImpulseConfig = serde_json::from_value(config.clone())?;
        Ok(Box::new(ImpulseSource::new(name, config.params)))
    }

    fn sample(&self, millis: f64) -> f64 {
        let ImpulseParams {
            amp,
            offset,
            period,
            duty,
            echo,
            decay,
        } = self.params;
        if period <= 0.0 {
            return offset;
        }
        let elapsed = millis - self.trigger_point;
        if !elapsed.is_finite() || elapsed < 0.0 {
            return offset;
        }
        let repeat = (elapsed / period).floor();
        if repeat >= echo.floor().max(1.0) {
            return offset;
        }
        if elapsed.rem_euclid(period) < duty {
            amp * decay.max(0.0).powf(repeat) + offset
        } else {
            offset
        }
    }
}

impl Source for ImpulseSource {
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

    fn trigger(&mut self, millis: f64) {
        self.trigger_point = millis;
    }
}

pub fn schema() -> SourceSchema {
    SourceSchema {
        name: NAME,
        description: "triggered pulse train with decaying echoes",
        params: ImpulseParams::schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse() -> ImpulseSource {
        ImpulseSource::new(
            "i",
            ImpulseParams {
                amp: 2.0,
                offset: 0.5,
                period: 1000.0,
                duty: 300.0,
                echo: 2.0,
                decay: 0.75,
            },
        )
    }

    #[test]
    fn test_untriggered_rests_at_offset() {
        let i = impulse();
        assert_eq!(i.sample(0.0), 0.5);
        assert_eq!(i.sample(123456.0), 0.5);
    }

    #[test]
    fn test_pulse_train_after_trigger() {
        let mut i = impulse();
        i.trigger(0.0);
        // First pulse at full amplitude.
        assert_eq!(i.sample(0.0), 2.5);
        assert_eq!(i.sample(299.0), 2.5);
        // Outside the duty window.
        assert_eq!(i.sample(300.0), 0.5);
        assert_eq!(i.sample(999.0), 0.5);
        // Second repeat, decayed once.
        assert_eq!(i.sample(1000.0), 2.0);
        assert_eq!(i.sample(1299.0), 2.0);
        // Echo count exhausted.
        assert_eq!(i.sample(2000.0), 0.5);
    }

    #[test]
    fn test_before_trigger_point_rests_at_offset() {
        let mut i = impulse();
        i.trigger(5000.0);
        assert_eq!(i.sample(4999.0), 0.5);
        assert_eq!(i.sample(5000.0), 2.5);
    }

    #[test]
    fn test_retrigger_moves_origin() {
        let mut i = impulse();
        i.trigger(0.0);
        i.trigger(10_000.0);
        assert_eq!(i.sample(1000.0), 0.5);
        assert_eq!(i.sample(10_000.0), 2.5);
    }

    #[test]
    fn test_echo_floor_of_one() {
        let mut i = impulse();
        i.params.echo = 0.0;
        i.trigger(0.0);
        // Even a nonsense echo count keeps the first pulse.
        assert_eq!(i.sample(0.0), 2.5);
        assert_eq!(i.sample(1000.0), 0.5);
    }

    #[test]
    fn test_zero_period_holds_offset() {
        let mut i = impulse();
        i.params.period = 0.0;
        i.trigger(0.0);
        assert_eq!(i.sample(0.0), 0.5);
    }
}
