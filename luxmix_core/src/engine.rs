use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::RwLock;
use serde::Serialize;

use crate::matrix::PatchEntry;
use crate::message::{EngineCommand, EngineEvent};
use crate::mixer::Mixer;
use crate::topology::{Renderer, TopologyMode};
use crate::transport::Transport;
use crate::types::SourceState;

pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Read-only view of the engine published after every state-changing
/// command, for the server's sync and persistence surfaces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub state: LoopState,
    pub sources: Vec<SourceState>,
    pub patch: Vec<PatchEntry>,
    pub channel_levels: Vec<(String, f64)>,
    pub gains: Vec<(String, f64)>,
    pub mode: TopologyMode,
    pub stutter_period: f64,
    pub transport_connected: bool,
}

/// Monotonic engine time in milliseconds since construction. Cheap to copy
/// around; the server uses it to stamp analysis input into the same time
/// domain the tick loop samples in.
#[derive(Debug, Clone, Copy)]
pub struct EngineClock {
    start: Instant,
}

impl EngineClock {
    pub fn new() -> Self {
        EngineClock {
            start: Instant::now(),
        }
    }

    pub fn now_millis(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for EngineClock {
    fn default() -> Self {
        EngineClock::new()
    }
}

/// The control loop: drains queued commands between ticks, mixes one frame
/// per tick at a single timestamp, renders it through the topology, and
/// pushes it out the transport.
pub struct Engine {
    mixer: Mixer,
    renderer: Renderer,
    transport: Box<dyn Transport>,
    transport_connected: bool,
    tick: Duration,
    state: LoopState,
    clock: EngineClock,
    snapshot: Arc<RwLock<EngineSnapshot>>,
}

impl Engine {
    pub fn new(mixer: Mixer, renderer: Renderer, transport: Box<dyn Transport>, tick: Duration) -> Self {
        let mut engine = Engine {
            mixer,
            renderer,
            transport,
            transport_connected: true,
            tick,
            state: LoopState::Idle,
            clock: EngineClock::new(),
            snapshot: Arc::new(RwLock::new(EngineSnapshot {
                state: LoopState::Idle,
                sources: Vec::new(),
                patch: Vec::new(),
                channel_levels: Vec::new(),
                gains: Vec::new(),
                mode: TopologyMode::default(),
                stutter_period: 0.0,
                transport_connected: true,
            })),
        };
        engine.publish();
        engine
    }

    pub fn snapshot(&self) -> Arc<RwLock<EngineSnapshot>> {
        self.snapshot.clone()
    }

    pub fn clock(&self) -> EngineClock {
        self.clock
    }

    /// Hand the engine its own thread. The loop runs until a `Shutdown`
    /// command arrives, then drains: blackout frame, transport closed,
    /// `Stopped` event emitted.
    pub fn spawn(
        self,
        incoming: Receiver<EngineCommand>,
        outgoing: Sender<EngineEvent>,
    ) -> JoinHandle<()> {
        thread::Builder::new()
            .name("luxmix-engine".to_string())
            .spawn(move || self.run(incoming, outgoing))
            .expect("failed to spawn engine thread")
    }

    fn run(mut self, incoming: Receiver<EngineCommand>, outgoing: Sender<EngineEvent>) {
        self.state = LoopState::Running;
        self.publish();
        let mut deadline = Instant::now();
        while self.state == LoopState::Running {
            let mut dirty = self.drain(&incoming, &outgoing);
            if self.state != LoopState::Running {
                break;
            }
            let now = self.clock.now_millis();
            self.mixer.mix(now);
            self.renderer.render(&self.mixer.history, self.transport.as_mut());
            dirty |= self.submit(&outgoing);
            if dirty {
                self.publish();
            }
            // Fixed cadence with resync: a late tick shifts the grid
            // instead of accumulating debt.
            deadline += self.tick;
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            } else {
                deadline = now;
            }
        }
        for address in self.renderer.addresses() {
            self.transport.set_channel(address, 0);
        }
        let _ = self.transport.submit();
        self.transport.close();
        self.state = LoopState::Stopped;
        self.publish();
        let _ = outgoing.send(EngineEvent::Stopped);
    }

    /// Apply every queued command. Failures are reported and skipped; the
    /// loop never stops for a bad command.
    fn drain(&mut self, incoming: &Receiver<EngineCommand>, outgoing: &Sender<EngineEvent>) -> bool {
        let mut dirty = false;
        while let Ok(command) = incoming.try_recv() {
            match self.apply(command) {
                Ok(()) => dirty = true,
                Err(err) => {
                    let _ = outgoing.send(EngineEvent::CommandRejected {
                        reason: format!("{:#}", err),
                    });
                }
            }
        }
        dirty
    }

    fn apply(&mut self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::SetSourceParam {
                source,
                param,
                value,
            } => self.mixer.set_source_param(&source, &param, value),
            EngineCommand::Trigger { source } => {
                let now = self.clock.now_millis();
                self.mixer.trigger(&source, now)
            }
            EngineCommand::Route { source, channels } => {
                self.mixer.matrix.route(&source, &channels)
            }
            EngineCommand::Connect {
                source,
                channel,
                weight,
            } => self.mixer.matrix.connect(&source, &channel, weight),
            EngineCommand::ClearPatch { channel } => self.mixer.matrix.clear(channel.as_deref()),
            EngineCommand::LoadPatch { entries } => self.mixer.matrix.load(&entries),
            EngineCommand::SetChannelLevel { channel, level } => {
                self.mixer.layout.set_base_level(&channel, level)
            }
            EngineCommand::SetCategoryGain { category, gain } => {
                self.mixer.layout.set_gain(&category, gain)
            }
            EngineCommand::SetMode { mode } => {
                self.renderer.mode = mode;
                Ok(())
            }
            EngineCommand::SetStutterPeriod { period } => {
                self.renderer.stutter_period = period;
                Ok(())
            }
            EngineCommand::Bands { bands, millis } => {
                self.mixer.forward_bands(&bands, millis);
                Ok(())
            }
            EngineCommand::Beat { millis, tempo_bpm } => {
                self.mixer.report_beat(millis, tempo_bpm);
                Ok(())
            }
            EngineCommand::Reconfigure { channels, fixtures } => {
                let layout = crate::channels::ChannelLayout::new(channels)?;
                let mut renderer = Renderer::new(fixtures, &layout)?;
                renderer.mode = self.renderer.mode;
                renderer.stutter_period = self.renderer.stutter_period;
                self.mixer.reconfigure(layout);
                self.renderer = renderer;
                Ok(())
            }
            EngineCommand::Publish => Ok(()),
            EngineCommand::Shutdown => {
                self.state = LoopState::Draining;
                Ok(())
            }
        }
    }

    /// Push transport state: a failed submit flips to disconnected, a later
    /// success flips back. Either edge is an event and a snapshot refresh.
    fn submit(&mut self, outgoing: &Sender<EngineEvent>) -> bool {
        match self.transport.submit() {
            Ok(()) => {
                if !self.transport_connected {
                    self.transport_connected = true;
                    let _ = outgoing.send(EngineEvent::TransportConnected);
                    return true;
                }
                false
            }
            Err(_) => {
                if self.transport_connected {
                    self.transport_connected = false;
                    let _ = outgoing.send(EngineEvent::TransportDisconnected);
                    return true;
                }
                false
            }
        }
    }

    fn publish(&mut self) {
        let layout = &self.mixer.layout;
        let snapshot = EngineSnapshot {
            state: self.state,
            sources: self.mixer.source_states(),
            patch: self.mixer.matrix.entries(),
            channel_levels: layout
                .channels()
                .iter()
                .map(|c| (c.name.clone(), c.base_level))
                .collect(),
            gains: layout
                .categories()
                .into_iter()
                .map(|category| {
                    let gain = layout.gain_of(&category);
                    (category, gain)
                })
                .collect(),
            mode: self.renderer.mode,
            stutter_period: self.renderer.stutter_period,
            transport_connected: self.transport_connected,
        };
        *self.snapshot.write() = snapshot;
    }
}
