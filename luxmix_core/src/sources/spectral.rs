use std::collections::VecDeque;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::types::{Params, Source, SourceSchema, SourceState};
use crate::util::constrain;

const NAME: &str = "spectral";

fn default_subdivisions() -> usize {
    1
}

fn default_memory_length() -> usize {
    32
}

#[derive(Debug, Clone, Params, Deserialize)]
#[serde(default)]
pub struct SpectralParams {
    #[param("amp", "scale applied to the averaged band energy")]
    pub amp: f64,
    #[param("offset", "baseline added to the scaled energy")]
    pub offset: f64,
    #[param("threshold", "noise floor subtracted from each band at ingestion")]
    pub threshold: f64,
    #[param("low", "low edge of the band window as a 0..1 fraction")]
    pub low: f64,
    #[param("high", "high edge of the band window as a 0..1 fraction")]
    pub high: f64,
}

impl Default for SpectralParams {
    fn default() -> Self {
        SpectralParams {
            amp: 1.0,
            offset: 0.0,
            threshold: 0.0,
            low: 0.0,
            high: 1.0,
        }
    }
}

#[derive(Deserialize)]
struct SpectralConfig {
    #[serde(default = "default_subdivisions")]
    subdivisions: usize,
    #[serde(default = "default_memory_length")]
    memory_length: usize,
    #[serde(flatten)]
    params: SpectralParams,
}

/// Follower over externally analyzed spectra. Band vectors arrive through
/// `forward` into a short timestamped memory; `value` reads the vector
/// whose stamp is nearest the queried time and averages a fractional
/// sub-band window of it.
pub struct SpectralSource {
    name: String,
    params: SpectralParams,
    subdivisions: usize,
    memory_length: usize,
    // Newest at the front.
    memory: VecDeque<(f64, Vec<f64>)>,
}

impl SpectralSource {
    pub fn new(name: &str, subdivisions: usize, memory_length: usize, params: SpectralParams) -> Self {
        SpectralSource {
            name: name.to_string(),
            params,
            subdivisions,
            memory_length,
            memory: VecDeque::with_capacity(memory_length),
        }
    }

    pub fn from_config(name: &str, config: &Value) -> Result<Box<dyn Source>> {
        let config: SpectralConfig = serde_json::from_value(config.clone())?;
        Ok(Box::new(SpectralSource::new(
            name,
            config.subdivisions,
            config.memory_length,
            config.params,
        )))
    }

    fn nearest(&self, millis: f64) -> Option<&Vec<f64>> {
        self.memory
            .iter()
            .min_by(|(a, _), (b, _)| {
                (a - millis)
                    .abs()
                    .partial_cmp(&(b - millis).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(_, bands)| bands)
    }

    fn sample(&self, millis: f64) -> f64 {
        let SpectralParams {
            amp,
            offset,
            low,
            high,
            ..
        } = self.params;
        if self.subdivisions == 0 {
            return offset;
        }
        let Some(bands) = self.nearest(millis) else {
            return offset;
        };
        let (low, high) = if low <= high { (low, high) } else { (high, low) };
        let sub = self.subdivisions;
        let start = constrain((low * sub as f64).floor(), 0.0, (sub - 1) as f64) as usize;
        let end = constrain((high * sub as f64).ceil(), (start + 1) as f64, sub as f64) as usize;
        let sum: f64 = bands[start..end].iter().sum();
        sum / (end - start) as f64 * amp + offset
    }
}

impl Source for SpectralSource {
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

    fn forward(&mut self, bands: &[f64], millis: f64) {
        if self.memory_length == 0 {
            return;
        }
        let threshold = self.params.threshold;
        // Pad or truncate to the configured band count, flooring each band.
        let clipped: Vec<f64> = (0..self.subdivisions)
            .map(|i| {
                let v = bands.get(i).copied().unwrap_or(0.0);
                if v < threshold { 0.0 } else { v - threshold }
            })
            .collect();
        self.memory.push_front((millis, clipped));
        self.memory.truncate(self.memory_length);
    }
}

pub fn schema() -> SourceSchema {
    SourceSchema {
        name: NAME,
        description: "follows a sub-band window of externally analyzed spectra",
        params: SpectralParams::schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spectral(subdivisions: usize, memory_length: usize) -> SpectralSource {
        SpectralSource::new("s", subdivisions, memory_length, SpectralParams::default())
    }

    #[test]
    fn test_empty_memory_holds_offset() {
        let mut s = spectral(4, 8);
        s.params.offset = 0.5;
        assert_eq!(s.sample(0.0), 0.5);
    }

    #[test]
    fn test_full_window_average() {
        let mut s = spectral(4, 8);
        s.forward(&[1.0, 2.0, 3.0, 4.0], 100.0);
        assert!((s.sample(100.0) - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_sub_band_window() {
        let mut s = spectral(4, 8);
        s.params.low = 0.5;
        s.params.high = 1.0;
        s.forward(&[1.0, 2.0, 3.0, 4.0], 100.0);
        assert!((s.sample(100.0) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_inverted_window_swaps_edges() {
        let mut s = spectral(4, 8);
        s.params.low = 1.0;
        s.params.high = 0.5;
        s.forward(&[1.0, 2.0, 3.0, 4.0], 100.0);
        assert!((s.sample(100.0) - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_window_keeps_one_band() {
        let mut s = spectral(4, 8);
        s.params.low = 0.5;
        s.params.high = 0.5;
        s.forward(&[1.0, 2.0, 3.0, 4.0], 100.0);
        assert!((s.sample(100.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_stamp_wins() {
        let mut s = spectral(1, 8);
        s.forward(&[1.0], 100.0);
        s.forward(&[5.0], 200.0);
        assert!((s.sample(120.0) - 1.0).abs() < 1e-9);
        assert!((s.sample(180.0) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_floor_at_ingestion() {
        let mut s = spectral(2, 8);
        s.params.threshold = 1.5;
        s.forward(&[1.0, 4.0], 100.0);
        // Band 0 falls below the floor, band 1 is shifted down by it.
        assert!((s.sample(100.0) - 1.25).abs() < 1e-9);
        // Raising the threshold later does not rewrite history.
        s.params.threshold = 10.0;
        assert!((s.sample(100.0) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn test_short_band_vector_padded_with_zeros() {
        let mut s = spectral(4, 8);
        s.forward(&[4.0], 100.0);
        assert!((s.sample(100.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_memory_bounded() {
        let mut s = spectral(1, 2);
        s.forward(&[1.0], 100.0);
        s.forward(&[2.0], 200.0);
        s.forward(&[3.0], 300.0);
        assert_eq!(s.memory.len(), 2);
        // The oldest vector fell off; a query near its stamp now resolves
        // to the closest survivor.
        assert!((s.sample(100.0) - 2.0).abs() < 1e-9);
    }
}
