use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Params, Source, SourceSchema, SourceState};

const NAME: &str = "noise";

#[derive(Debug, Clone, Params, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    #[param("amp", "scale applied to each random step")]
    pub amp: f64,
    #[param("period", "hold time of each step in milliseconds")]
    pub period: f64,
    #[param("offset", "baseline added to each step")]
    pub offset: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        NoiseParams {
            amp: 1.0,
            period: 100.0,
            offset: 0.0,
        }
    }
}

#[derive(Deserialize)]
struct NoiseConfig {
    /// Fixed seed for reproducible runs; freshly drawn when absent.
    seed: Option<u64>,
    #[serde(flatten)]
    params: NoiseParams,
}

/// Stepped sample-and-hold noise. The held value is a pure function of
/// (instance seed, period index), so repeated queries inside one period
/// agree and no per-tick state accumulates.
pub struct NoiseSource {
    name: String,
    seed: u64,
    params: NoiseParams,
}

impl NoiseSource {
    pub fn new(name: &str, seed: Option<u64>, params: NoiseParams) -> Self {
        NoiseSource {
            name: name.to_string(),
            seed: seed.unwrap_or_else(rand::random),
            params,
        }
    }

    pub fn from_config(name: &str, config: &Value) -> Result<Box<dyn Source>> {
        let config: NoiseConfig = serde_json::from_value(config.clone())?;
        Ok(Box::new(NoiseSource::new(name, config.seed, config.params)))
    }

    fn sample(&self, millis: f64) -> f64 {
        let NoiseParams {
            amp,
            period,
            offset,
        } = self.params;
        if period <= 0.0 {
            return offset;
        }
        let period_index = (millis / period).floor() as i64;
        let mut rng =
            StdRng::seed_from_u64(self.seed ^ (period_index as u64).wrapping_mul(0x9E3779B97F4A7C15));
        rng.random::<f64>() * amp + offset
    }
}

impl Source for NoiseSource {
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
        description: "stepped sample-and-hold random values",
        params: NoiseParams::schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noise(period: f64) -> NoiseSource {
        NoiseSource::new(
            "n",
            Some(7),
            NoiseParams {
                amp: 1.0,
                period,
                offset: 0.0,
            },
        )
    }

    #[test]
    fn test_held_within_period() {
        let n = noise(100.0);
        let v = n.sample(0.0);
        assert_eq!(n.sample(1.0), v);
        assert_eq!(n.sample(99.9), v);
    }

    #[test]
    fn test_steps_across_periods() {
        let n = noise(100.0);
        let first = n.sample(50.0);
        let second = n.sample(150.0);
        let third = n.sample(250.0);
        assert_ne!(first, second);
        assert_ne!(second, third);
    }

    #[test]
    fn test_range_respects_amp_and_offset() {
        let n = NoiseSource::new(
            "n",
            Some(7),
            NoiseParams {
                amp: 2.0,
                period: 10.0,
                offset: 1.0,
            },
        );
        for i in 0..200 {
            let v = n.sample(i as f64 * 10.0);
            assert!((1.0..3.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn test_deterministic_for_fixed_seed() {
        let a = noise(100.0);
        let b = noise(100.0);
        assert_eq!(a.sample(1234.0), b.sample(1234.0));
    }

    #[test]
    fn test_zero_period_holds_offset() {
        let n = NoiseSource::new(
            "n",
            Some(7),
            NoiseParams {
                amp: 1.0,
                period: 0.0,
                offset: 0.25,
            },
        );
        assert_eq!(n.sample(0.0), 0.25);
        assert_eq!(n.sample(500.0), 0.25);
    }

    #[test]
    fn test_negative_timestamps_have_their_own_period() {
        let n = noise(100.0);
        // floor(-50 / 100) == -1, a distinct period from index 0.
        assert_ne!(n.sample(-50.0), n.sample(50.0));
        assert_eq!(n.sample(-50.0), n.sample(-1.0));
    }
}
