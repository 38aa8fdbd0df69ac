use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Serialize};

fn default_base_level() -> f64 {
    0.0
}

/// One logical output channel and the gain category it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDef {
    pub name: String,
    pub category: String,
    #[serde(default = "default_base_level")]
    pub base_level: f64,
}

/// The named channel set: per-channel base levels plus a category-keyed
/// gain table. Channel order here is the frame order everywhere downstream.
pub struct ChannelLayout {
    channels: Vec<ChannelDef>,
    index: HashMap<String, usize>,
    gains: HashMap<String, f64>,
}

impl ChannelLayout {
    pub fn new(channels: Vec<ChannelDef>) -> Result<Self> {
        if channels.is_empty() {
            bail!("channel layout must define at least one channel");
        }
        let mut index = HashMap::new();
        let mut gains = HashMap::new();
        for (i, def) in channels.iter().enumerate() {
            if index.insert(def.name.clone(), i).is_some() {
                bail!("duplicate channel name {}", def.name);
            }
            // Every category starts at unity.
            gains.entry(def.category.clone()).or_insert(1.0);
        }
        Ok(ChannelLayout {
            channels,
            index,
            gains,
        })
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> &[ChannelDef] {
        &self.channels
    }

    pub fn names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name.clone()).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn set_base_level(&mut self, name: &str, level: f64) -> Result<()> {
        let i = self
            .index_of(name)
            .ok_or_else(|| anyhow!("no channel named {}", name))?;
        self.channels[i].base_level = level;
        Ok(())
    }

    pub fn base_levels(&self) -> Vec<f64> {
        self.channels.iter().map(|c| c.base_level).collect()
    }

    /// Category names in first-appearance order.
    pub fn categories(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for def in &self.channels {
            if !seen.contains(&def.category) {
                seen.push(def.category.clone());
            }
        }
        seen
    }

    pub fn set_gain(&mut self, category: &str, gain: f64) -> Result<()> {
        match self.gains.get_mut(category) {
            Some(g) => {
                *g = gain;
                Ok(())
            }
            None => Err(anyhow!("no gain category named {}", category)),
        }
    }

    pub fn gain_of(&self, category: &str) -> f64 {
        self.gains.get(category).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chan(name: &str, category: &str, base_level: f64) -> ChannelDef {
        ChannelDef {
            name: name.to_string(),
            category: category.to_string(),
            base_level,
        }
    }

    fn layout() -> ChannelLayout {
        ChannelLayout::new(vec![
            chan("face_1", "face", 0.0),
            chan("face_2", "face", 10.0),
            chan("wash_1", "wash", 0.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_layout_order_and_index() {
        let l = layout();
        assert_eq!(l.len(), 3);
        assert_eq!(l.index_of("face_2"), Some(1));
        assert_eq!(l.index_of("nope"), None);
        assert_eq!(l.base_levels(), vec![0.0, 10.0, 0.0]);
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let result = ChannelLayout::new(vec![chan("a", "face", 0.0), chan("a", "wash", 0.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_layout_rejected() {
        assert!(ChannelLayout::new(vec![]).is_err());
    }

    #[test]
    fn test_gains_start_at_unity() {
        let l = layout();
        assert_eq!(l.gain_of("face"), 1.0);
        assert_eq!(l.gain_of("wash"), 1.0);
    }

    #[test]
    fn test_set_gain_known_category() {
        let mut l = layout();
        l.set_gain("wash", 0.5).unwrap();
        assert_eq!(l.gain_of("wash"), 0.5);
        assert_eq!(l.gain_of("face"), 1.0);
    }

    #[test]
    fn test_set_gain_unknown_category_rejected() {
        let mut l = layout();
        assert!(l.set_gain("strobe", 0.5).is_err());
    }

    #[test]
    fn test_categories_in_first_appearance_order() {
        let l = layout();
        assert_eq!(l.categories(), vec!["face".to_string(), "wash".to_string()]);
    }

    #[test]
    fn test_set_base_level() {
        let mut l = layout();
        l.set_base_level("wash_1", 42.0).unwrap();
        assert_eq!(l.base_levels(), vec![0.0, 10.0, 42.0]);
        assert!(l.set_base_level("nope", 1.0).is_err());
    }
}
