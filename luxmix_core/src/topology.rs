use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::channels::ChannelLayout;
use crate::history::HistoryBuffer;
use crate::transport::Transport;
use crate::util::{clamp_dmx, constrain};

/// Stutter-period units per fixture position step.
pub const POSITION_SPACING: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TopologyMode {
    Unison,
    Mirror,
    Spread,
    ChaseFwd,
    ChaseBack,
    Zigzag,
}

impl Default for TopologyMode {
    fn default() -> Self {
        TopologyMode::Unison
    }
}

impl fmt::Display for TopologyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TopologyMode::Unison => "unison",
            TopologyMode::Mirror => "mirror",
            TopologyMode::Spread => "spread",
            TopologyMode::ChaseFwd => "chase-fwd",
            TopologyMode::ChaseBack => "chase-back",
            TopologyMode::Zigzag => "zigzag",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TopologyMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "unison" => Ok(TopologyMode::Unison),
            "mirror" => Ok(TopologyMode::Mirror),
            "spread" => Ok(TopologyMode::Spread),
            "chase-fwd" => Ok(TopologyMode::ChaseFwd),
            "chase-back" => Ok(TopologyMode::ChaseBack),
            "zigzag" => Ok(TopologyMode::Zigzag),
            _ => Err(anyhow!("unknown topology mode {}", s)),
        }
    }
}

/// A logical channel wired straight to one output slot, bypassing the
/// topology modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectFixture {
    pub channel: String,
    pub address: u16,
}

/// A left/right pair of movable fixtures at one spatial position. Pairs are
/// listed front to back; that ordering is what the chase modes traverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixturePair {
    pub left: u16,
    pub right: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FixtureLayout {
    #[serde(default)]
    pub direct: Vec<DirectFixture>,
    #[serde(default)]
    pub pairs: Vec<FixturePair>,
}

/// Projects channel history onto the fixture topology each tick.
pub struct Renderer {
    pub mode: TopologyMode,
    pub stutter_period: f64,
    pairs: Vec<FixturePair>,
    // (channel index, slot address), resolved once at construction.
    direct: Vec<(usize, u16)>,
    width: usize,
}

impl Renderer {
    pub fn new(layout: FixtureLayout, channels: &ChannelLayout) -> Result<Self> {
        let mut direct = Vec::with_capacity(layout.direct.len());
        for fixture in &layout.direct {
            let ix = channels.index_of(&fixture.channel).ok_or_else(|| {
                anyhow!(
                    "direct fixture at address {} names unknown channel {}",
                    fixture.address,
                    fixture.channel
                )
            })?;
            direct.push((ix, fixture.address));
        }
        Ok(Renderer {
            mode: TopologyMode::default(),
            stutter_period: 0.0,
            pairs: layout.pairs,
            direct,
            width: channels.len(),
        })
    }

    /// Every output slot the renderer can touch, for blackout on shutdown.
    pub fn addresses(&self) -> Vec<u16> {
        let mut addresses: Vec<u16> = self.direct.iter().map(|&(_, a)| a).collect();
        for pair in &self.pairs {
            addresses.push(pair.left);
            addresses.push(pair.right);
        }
        addresses
    }

    fn delay_index(&self, position: usize, depth: usize) -> usize {
        constrain(
            (self.stutter_period * position as f64 / POSITION_SPACING).round(),
            0.0,
            (depth - 1) as f64,
        ) as usize
    }

    fn channel(&self, ordinal: usize) -> usize {
        ordinal % self.width
    }

    /// Write one frame of fixture values. Direct fixtures always track
    /// their channel's current value; pairs are driven per the active mode.
    pub fn render(&self, history: &HistoryBuffer, transport: &mut dyn Transport) {
        let head = history.head();
        for &(ix, address) in &self.direct {
            transport.set_channel(address, clamp_dmx(head[ix]));
        }
        let n = self.pairs.len();
        if n == 0 {
            return;
        }
        let depth = history.depth();
        match self.mode {
            TopologyMode::Unison => {
                let value = clamp_dmx(head[0]);
                for pair in &self.pairs {
                    transport.set_channel(pair.left, value);
                    transport.set_channel(pair.right, value);
                }
            }
            TopologyMode::Mirror => {
                for (p, pair) in self.pairs.iter().enumerate() {
                    let value = clamp_dmx(head[self.channel(p)]);
                    transport.set_channel(pair.left, value);
                    transport.set_channel(pair.right, value);
                }
            }
            TopologyMode::Spread => {
                for (p, pair) in self.pairs.iter().enumerate() {
                    transport.set_channel(pair.left, clamp_dmx(head[self.channel(2 * p)]));
                    transport.set_channel(pair.right, clamp_dmx(head[self.channel(2 * p + 1)]));
                }
            }
            TopologyMode::ChaseFwd => {
                for (p, pair) in self.pairs.iter().enumerate() {
                    let frame = history.delayed(self.delay_index(p, depth));
                    transport.set_channel(pair.left, clamp_dmx(frame[0]));
                    transport.set_channel(pair.right, clamp_dmx(frame[self.channel(1)]));
                }
            }
            TopologyMode::ChaseBack => {
                for (p, pair) in self.pairs.iter().enumerate() {
                    let frame = history.delayed(self.delay_index(n - 1 - p, depth));
                    transport.set_channel(pair.left, clamp_dmx(frame[0]));
                    transport.set_channel(pair.right, clamp_dmx(frame[self.channel(1)]));
                }
            }
            TopologyMode::Zigzag => {
                // Alternating sides as the delay grows: L0 R0 L1 R1...
                for (p, pair) in self.pairs.iter().enumerate() {
                    let left = clamp_dmx(history.delayed(self.delay_index(2 * p, depth))[0]);
                    let right =
                        clamp_dmx(history.delayed(self.delay_index(2 * p + 1, depth))[0]);
                    transport.set_channel(pair.left, left);
                    transport.set_channel(pair.right, right);
                }
            }
        }
    }
}
