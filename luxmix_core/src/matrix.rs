use std::collections::HashMap;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

/// One non-zero cell of the patch matrix, in a serializable form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub source: String,
    pub channel: String,
    pub weight: f64,
}

/// Dense source-by-channel weight matrix.
///
/// All name resolution happens here so the mix loop can run on raw indices.
/// Edits are atomic at the call level: an edit naming an unknown source or
/// channel is rejected whole, leaving the matrix untouched.
pub struct PatchMatrix {
    source_names: Vec<String>,
    channel_names: Vec<String>,
    source_index: HashMap<String, usize>,
    channel_index: HashMap<String, usize>,
    // weights[source][channel]
    weights: Vec<Vec<f64>>,
}

impl PatchMatrix {
    pub fn new(source_names: Vec<String>, channel_names: Vec<String>) -> Self {
        let source_index = source_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let channel_index = channel_names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        let weights = vec![vec![0.0; channel_names.len()]; source_names.len()];
        PatchMatrix {
            source_names,
            channel_names,
            source_index,
            channel_index,
            weights,
        }
    }

    fn source_ix(&self, source: &str) -> Result<usize> {
        self.source_index
            .get(source)
            .copied()
            .ok_or_else(|| anyhow!("no source named {}", source))
    }

    fn channel_ix(&self, channel: &str) -> Result<usize> {
        self.channel_index
            .get(channel)
            .copied()
            .ok_or_else(|| anyhow!("no channel named {}", channel))
    }

    pub fn connect(&mut self, source: &str, channel: &str, weight: f64) -> Result<()> {
        let s = self.source_ix(source)?;
        let c = self.channel_ix(channel)?;
        self.weights[s][c] = weight;
        Ok(())
    }

    /// Replace a source's entire row: the named channels get weight 1.0,
    /// every other channel drops to 0.0. Any unknown name rejects the whole
    /// edit before anything changes.
    pub fn route(&mut self, source: &str, channels: &[String]) -> Result<()> {
        let s = self.source_ix(source)?;
        let mut targets = Vec::with_capacity(channels.len());
        for channel in channels {
            targets.push(self.channel_ix(channel)?);
        }
        for w in self.weights[s].iter_mut() {
            *w = 0.0;
        }
        for c in targets {
            self.weights[s][c] = 1.0;
        }
        Ok(())
    }

    /// Zero one channel's column, or the whole matrix when `channel` is None.
    pub fn clear(&mut self, channel: Option<&str>) -> Result<()> {
        match channel {
            Some(channel) => {
                let c = self.channel_ix(channel)?;
                for row in self.weights.iter_mut() {
                    row[c] = 0.0;
                }
            }
            None => {
                for row in self.weights.iter_mut() {
                    for w in row.iter_mut() {
                        *w = 0.0;
                    }
                }
            }
        }
        Ok(())
    }

    /// Row-clearing bulk load: each source named in `entries` has its row
    /// zeroed first, then the listed weights applied; unnamed sources keep
    /// their routing. Unknown names reject the whole load.
    pub fn load(&mut self, entries: &[PatchEntry]) -> Result<()> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            resolved.push((
                self.source_ix(&entry.source)?,
                self.channel_ix(&entry.channel)?,
                entry.weight,
            ));
        }
        for (s, _, _) in &resolved {
            for w in self.weights[*s].iter_mut() {
                *w = 0.0;
            }
        }
        for (s, c, weight) in resolved {
            self.weights[s][c] = weight;
        }
        Ok(())
    }

    /// Atomic rebuild against new name lists. All weights drop; there is no
    /// meaningful carry-over when the axes change.
    pub fn resize(&mut self, source_names: Vec<String>, channel_names: Vec<String>) {
        *self = PatchMatrix::new(source_names, channel_names);
    }

    pub fn weight_of(&self, source: &str, channel: &str) -> f64 {
        match (self.source_index.get(source), self.channel_index.get(channel)) {
            (Some(&s), Some(&c)) => self.weights[s][c],
            _ => 0.0,
        }
    }

    /// Non-zero cells in row-major order.
    pub fn entries(&self) -> Vec<PatchEntry> {
        let mut entries = Vec::new();
        for (s, row) in self.weights.iter().enumerate() {
            for (c, &weight) in row.iter().enumerate() {
                if weight != 0.0 {
                    entries.push(PatchEntry {
                        source: self.source_names[s].clone(),
                        channel: self.channel_names[c].clone(),
                        weight,
                    });
                }
            }
        }
        entries
    }

    pub fn weights(&self) -> &[Vec<f64>] {
        &self.weights
    }
}
