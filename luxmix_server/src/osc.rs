use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use rosc::{OscMessage, OscPacket, OscType, decoder, encoder};
use tracing::{debug, info, warn};

use luxmix_core::engine::{EngineClock, EngineSnapshot};
use luxmix_core::message::EngineCommand;

use crate::params::{self, ParamValue};
use crate::persistence::{DEFAULT_PRESET, PresetStore};

const RECV_BUFFER_SIZE: usize = 8192;
const RECV_TIMEOUT: Duration = Duration::from_millis(250);

/// What one inbound message asks for: most go straight to the engine,
/// the rest are server-side verbs.
#[derive(Debug, PartialEq)]
enum Action {
    Engine(EngineCommand),
    SavePreset(String),
    SelectPreset(String),
    DeletePreset(String),
    Sync,
}

fn arg_to_f64(arg: &OscType) -> Option<f64> {
    match arg {
        OscType::Float(v) => Some(*v as f64),
        OscType::Double(v) => Some(*v),
        OscType::Int(v) => Some(*v as f64),
        OscType::Long(v) => Some(*v as f64),
        OscType::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn arg_to_string(arg: &OscType) -> Option<String> {
    match arg {
        OscType::String(v) => Some(v.clone()),
        _ => None,
    }
}

fn string_args(message: &OscMessage) -> Result<Vec<String>> {
    message
        .args
        .iter()
        .map(|arg| arg_to_string(arg).ok_or_else(|| anyhow!("{} expects string args", message.addr)))
        .collect()
}

/// Map one OSC message onto an action. Analysis input is stamped with the
/// engine clock here, at receipt, so spectral lookups share the tick
/// loop's time domain.
fn translate(message: &OscMessage, clock: &EngineClock) -> Result<Action> {
    let segments: Vec<&str> =
        message.addr.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["patchbay"] => {
            // Live routing gesture: [source, channel, channel, ...].
            let mut args = string_args(message)?;
            if args.is_empty() {
                bail!("/patchbay expects a source name");
            }
            let source = args.remove(0);
            Ok(Action::Engine(EngineCommand::Route {
                source,
                channels: args,
            }))
        }
        ["patchbay", "clear"] => {
            let channel = message.args.first().and_then(arg_to_string);
            Ok(Action::Engine(EngineCommand::ClearPatch { channel }))
        }
        ["analysis", "bands"] => {
            let bands = message
                .args
                .iter()
                .map(|arg| arg_to_f64(arg).ok_or_else(|| anyhow!("/analysis/bands expects numbers")))
                .collect::<Result<Vec<f64>>>()?;
            Ok(Action::Engine(EngineCommand::Bands {
                bands,
                millis: clock.now_millis(),
            }))
        }
        ["analysis", "beat"] => {
            let tempo_bpm = message.args.first().and_then(arg_to_f64).unwrap_or(0.0);
            Ok(Action::Engine(EngineCommand::Beat {
                millis: clock.now_millis(),
                tempo_bpm,
            }))
        }
        ["sync"] => Ok(Action::Sync),
        ["save_preset"] => {
            let name = message
                .args
                .first()
                .and_then(arg_to_string)
                .unwrap_or_else(|| DEFAULT_PRESET.to_string());
            Ok(Action::SavePreset(name))
        }
        ["preset"] => {
            let name = message
                .args
                .first()
                .and_then(arg_to_string)
                .ok_or_else(|| anyhow!("/preset expects a preset name"))?;
            Ok(Action::SelectPreset(name))
        }
        ["preset", "delete"] => {
            let name = message
                .args
                .first()
                .and_then(arg_to_string)
                .ok_or_else(|| anyhow!("/preset/delete expects a preset name"))?;
            Ok(Action::DeletePreset(name))
        }
        _ => {
            // Everything else is a plain addressed value.
            let value = match message.args.first() {
                None => ParamValue::Float(1.0),
                Some(arg) => arg_to_f64(arg)
                    .map(ParamValue::Float)
                    .or_else(|| arg_to_string(arg).map(ParamValue::Text))
                    .ok_or_else(|| anyhow!("unsupported argument at {}", message.addr))?,
            };
            Ok(Action::Engine(params::dispatch_value(&message.addr, &value)?))
        }
    }
}

/// Outbound half: sends addressed values back to the controlling client.
pub struct OscClient {
    socket: UdpSocket,
    target: SocketAddr,
}

impl OscClient {
    pub fn new(target: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").context("failed to bind OSC client socket")?;
        Ok(OscClient { socket, target })
    }

    pub fn send(&self, addr: &str, args: Vec<OscType>) -> Result<()> {
        let packet = OscPacket::Message(OscMessage {
            addr: addr.to_string(),
            args,
        });
        let bytes = encoder::encode(&packet)
            .map_err(|err| anyhow!("failed to encode OSC message: {:?}", err))?;
        self.socket
            .send_to(&bytes, self.target)
            .with_context(|| format!("failed to send OSC message to {}", self.target))?;
        Ok(())
    }

    /// A patch value becomes one `/patchbay` message per source; floats and
    /// text go out at their own address.
    pub fn send_value(&self, address: &str, value: &ParamValue) -> Result<()> {
        match value {
            ParamValue::Float(v) => self.send(address, vec![OscType::Float(*v as f32)]),
            ParamValue::Text(v) => self.send(address, vec![OscType::String(v.clone())]),
            ParamValue::Patch(entries) => {
                self.send("/patchbay/clear", vec![])?;
                let mut sources: Vec<&str> = Vec::new();
                for entry in entries {
                    if !sources.contains(&entry.source.as_str()) {
                        sources.push(&entry.source);
                    }
                }
                for source in sources {
                    let mut args = vec![OscType::String(source.to_string())];
                    for entry in entries.iter().filter(|e| e.source == source) {
                        args.push(OscType::String(entry.channel.clone()));
                    }
                    self.send("/patchbay", args)?;
                }
                Ok(())
            }
        }
    }

    /// Push the whole exposed surface, one message per address.
    pub fn sync(&self, snapshot: &EngineSnapshot) -> Result<()> {
        for (address, value) in params::enumerate(snapshot) {
            self.send_value(&address, &value)?;
        }
        Ok(())
    }
}

/// Shared handles the listener thread works against.
pub struct OscContext {
    pub commands: Sender<EngineCommand>,
    pub snapshot: Arc<RwLock<EngineSnapshot>>,
    pub clock: EngineClock,
    pub presets: Arc<Mutex<PresetStore>>,
    pub client: Arc<OscClient>,
}

impl OscContext {
    fn handle(&self, message: OscMessage) {
        let action = match translate(&message, &self.clock) {
            Ok(action) => action,
            Err(err) => {
                warn!("dropping {}: {:#}", message.addr, err);
                return;
            }
        };
        match action {
            Action::Engine(command) => {
                debug!("{} -> {:?}", message.addr, command);
                let _ = self.commands.send(command);
            }
            Action::Sync => {
                // Ask the engine for a fresh publish so the next reader of
                // the shared view sees current state.
                let _ = self.commands.send(EngineCommand::Publish);
                let snapshot = self.snapshot.read().clone();
                if let Err(err) = self.client.sync(&snapshot) {
                    warn!("sync failed: {:#}", err);
                }
            }
            Action::SavePreset(name) => {
                let snapshot = self.snapshot.read().clone();
                let values = params::enumerate(&snapshot);
                match self.presets.lock().save_preset(&name, values) {
                    Ok(()) => info!("saved preset {}", name),
                    Err(err) => warn!("failed to save preset {}: {:#}", name, err),
                }
            }
            Action::SelectPreset(name) => {
                let replay = {
                    let mut presets = self.presets.lock();
                    match presets.select(&name) {
                        Ok(values) => values.to_vec(),
                        Err(err) => {
                            warn!("failed to select preset {}: {:#}", name, err);
                            return;
                        }
                    }
                };
                info!("selected preset {}", name);
                self.replay(&replay);
            }
            Action::DeletePreset(name) => match self.presets.lock().delete(&name) {
                Ok(()) => info!("deleted preset {}", name),
                Err(err) => warn!("failed to delete preset {}: {:#}", name, err),
            },
        }
    }

    /// Replay stored values through the same dispatch as live input, then
    /// echo them to the client so its surface follows. The engine gets every
    /// entry even when the feedback socket gives out; only echoing stops.
    pub fn replay(&self, values: &[(String, ParamValue)]) {
        let mut echoing = true;
        for (address, value) in values {
            match params::dispatch_value(address, value) {
                Ok(command) => {
                    let _ = self.commands.send(command);
                }
                Err(err) => warn!("skipping stored value {}: {:#}", address, err),
            }
            if echoing {
                if let Err(err) = self.client.send_value(address, value) {
                    warn!("stopping echo at {}: {:#}", address, err);
                    echoing = false;
                }
            }
        }
    }
}

fn dispatch_packet(context: &OscContext, packet: OscPacket) {
    match packet {
        OscPacket::Message(message) => context.handle(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                dispatch_packet(context, inner);
            }
        }
    }
}

/// Bind the control socket and pump messages until `running` clears.
pub fn spawn_listener(
    local: SocketAddr,
    context: OscContext,
    running: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let socket = UdpSocket::bind(local)
        .with_context(|| format!("failed to bind OSC listener on {}", local))?;
    socket
        .set_read_timeout(Some(RECV_TIMEOUT))
        .context("failed to set OSC socket timeout")?;
    info!("listening for OSC on {}", local);
    let handle = thread::Builder::new()
        .name("luxmix-osc".to_string())
        .spawn(move || {
            let mut buffer = [0u8; RECV_BUFFER_SIZE];
            while running.load(Ordering::Relaxed) {
                match socket.recv_from(&mut buffer) {
                    Ok((length, _peer)) => match decoder::decode_udp(&buffer[..length]) {
                        Ok((_, packet)) => dispatch_packet(&context, packet),
                        Err(err) => warn!("undecodable OSC packet: {:?}", err),
                    },
                    Err(err)
                        if err.kind() == std::io::ErrorKind::WouldBlock
                            || err.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        continue;
                    }
                    Err(err) => {
                        warn!("OSC socket error: {}", err);
                    }
                }
            }
        })
        .context("failed to spawn OSC listener thread")?;
    Ok(handle)
}
