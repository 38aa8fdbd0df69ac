use anyhow::{Result, anyhow, bail};

use crate::channels::ChannelLayout;
use crate::history::HistoryBuffer;
use crate::matrix::PatchMatrix;
use crate::types::{Source, SourceState};

/// Owns the hot path: sources, the patch matrix, the channel layout and the
/// frame history, combined once per tick at a single shared timestamp.
pub struct Mixer {
    pub sources: Vec<Box<dyn Source>>,
    pub layout: ChannelLayout,
    pub matrix: PatchMatrix,
    pub history: HistoryBuffer,
}

impl Mixer {
    pub fn new(
        sources: Vec<Box<dyn Source>>,
        layout: ChannelLayout,
        retention_ms: f64,
        tick_ms: f64,
    ) -> Result<Self> {
        let mut source_names = Vec::with_capacity(sources.len());
        for source in &sources {
            let name = source.name().to_string();
            if source_names.contains(&name) {
                bail!("duplicate source name {}", name);
            }
            source_names.push(name);
        }
        let matrix = PatchMatrix::new(source_names, layout.names());
        let depth = HistoryBuffer::for_retention(retention_ms, tick_ms);
        let history = HistoryBuffer::new(depth, layout.len());
        Ok(Mixer {
            sources,
            layout,
            matrix,
            history,
        })
    }

    pub fn source_mut(&mut self, name: &str) -> Result<&mut Box<dyn Source>> {
        self.sources
            .iter_mut()
            .find(|s| s.name() == name)
            .ok_or_else(|| anyhow!("no source named {}", name))
    }

    pub fn set_source_param(&mut self, source: &str, param: &str, value: f64) -> Result<()> {
        self.source_mut(source)?.update_param(param, value)
    }

    pub fn trigger(&mut self, source: &str, millis: f64) -> Result<()> {
        self.source_mut(source)?.trigger(millis);
        Ok(())
    }

    /// Broadcast a band vector to every source; only spectral followers
    /// react.
    pub fn forward_bands(&mut self, bands: &[f64], millis: f64) {
        for source in self.sources.iter_mut() {
            source.forward(bands, millis);
        }
    }

    pub fn report_beat(&mut self, millis: f64, tempo_bpm: f64) {
        for source in self.sources.iter_mut() {
            source.report_beat(millis, tempo_bpm);
        }
    }

    pub fn source_states(&self) -> Vec<SourceState> {
        self.sources.iter().map(|s| s.get_state()).collect()
    }

    /// Swap in a new channel layout. The patch matrix and history are
    /// rebuilt against the new channel set; sources and their params stay.
    pub fn reconfigure(&mut self, layout: ChannelLayout) {
        let source_names = self.sources.iter().map(|s| s.name().to_string()).collect();
        self.matrix.resize(source_names, layout.names());
        self.history = HistoryBuffer::new(self.history.depth(), layout.len());
        self.layout = layout;
    }

    /// One mixing pass at `millis`: rotate the history ring, seed the head
    /// with base levels, add each patched source scaled by its weight, then
    /// apply category gains to the finished sums.
    pub fn mix(&mut self, millis: f64) {
        let base = self.layout.base_levels();
        let head = self.history.begin_frame(&base);
        for (s, row) in self.matrix.weights().iter().enumerate() {
            let mut value = None;
            for (c, &weight) in row.iter().enumerate() {
                if weight != 0.0 {
                    // Sampled at most once per source per tick.
                    let v = *value.get_or_insert_with(|| self.sources[s].value(millis));
                    head[c] += v * weight;
                }
            }
        }
        for (c, def) in self.layout.channels().iter().enumerate() {
            head[c] *= self.layout.gain_of(&def.category);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::ChannelDef;
    use crate::sources::wave::{WaveParams, WaveShape, WaveSource};

    fn square(name: &str, amp: f64, offset: f64) -> Box<dyn Source> {
        // A square wave sampled at t=0 reads offset + amp, which makes the
        // arithmetic below easy to follow.
        Box::new(
            WaveSource::new(
                name,
                WaveShape::Square,
                WaveParams {
                    amp,
                    period: 1000.0,
                    phase: 0.0,
                    offset,
                },
            )
            .unwrap(),
        )
    }

    fn chan(name: &str, category: &str, base_level: f64) -> ChannelDef {
        ChannelDef {
            name: name.to_string(),
            category: category.to_string(),
            base_level,
        }
    }

    fn mixer() -> Mixer {
        Mixer::new(
            vec![square("a", 100.0, 0.0), square("b", 10.0, 0.0)],
            ChannelLayout::new(vec![
                chan("c1", "face", 0.0),
                chan("c2", "face", 5.0),
                chan("c3", "wash", 0.0),
            ])
            .unwrap(),
            50.0,
            10.0,
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_source_names_rejected() {
        let result = Mixer::new(
            vec![square("a", 1.0, 0.0), square("a", 1.0, 0.0)],
            ChannelLayout::new(vec![chan("c1", "face", 0.0)]).unwrap(),
            50.0,
            10.0,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unpatched_mix_is_base_levels() {
        let mut m = mixer();
        m.mix(0.0);
        assert_eq!(m.history.head(), &vec![0.0, 5.0, 0.0]);
    }

    #[test]
    fn test_weighted_sum_plus_base() {
        let mut m = mixer();
        m.matrix.connect("a", "c1", 1.0).unwrap();
        m.matrix.connect("a", "c2", 0.5).unwrap();
        m.matrix.connect("b", "c2", 1.0).unwrap();
        m.mix(0.0);
        // a reads 100, b reads 10 at t=0.
        assert_eq!(m.history.head(), &vec![100.0, 65.0, 0.0]);
    }

    #[test]
    fn test_negative_weight_subtracts() {
        let mut m = mixer();
        m.matrix.connect("b", "c2", -1.0).unwrap();
        m.mix(0.0);
        assert_eq!(m.history.head()[1], -5.0);
    }

    #[test]
    fn test_category_gain_scales_whole_channel() {
        let mut m = mixer();
        m.matrix.connect("a", "c2", 1.0).unwrap();
        m.layout.set_gain("face", 0.5).unwrap();
        m.mix(0.0);
        // Gain applies to base + contributions, and only to its category.
        assert_eq!(m.history.head(), &vec![0.0, 52.5, 0.0]);
    }

    #[test]
    fn test_single_timestamp_per_tick() {
        let mut m = mixer();
        m.matrix.connect("a", "c1", 1.0).unwrap();
        m.matrix.connect("a", "c3", 1.0).unwrap();
        // Sample right at the square's falling edge; both channels must
        // agree on which side of it the tick landed.
        m.mix(500.0);
        assert_eq!(m.history.head()[0], m.history.head()[2]);
    }

    #[test]
    fn test_history_rotates_per_mix() {
        let mut m = mixer();
        m.matrix.connect("a", "c1", 1.0).unwrap();
        m.mix(0.0);
        m.mix(600.0);
        // t=600 is on the square's low side.
        assert_eq!(m.history.head()[0], -100.0);
        assert_eq!(m.history.delayed(1)[0], 100.0);
    }
}
