use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::unbounded;
use parking_lot::Mutex;
use rosc::OscType;
use tracing::{info, warn};

use luxmix_core::engine::Engine;
use luxmix_core::message::{EngineCommand, EngineEvent};
use luxmix_core::mixer::Mixer;
use luxmix_core::topology::Renderer;
use luxmix_core::transport::{NullTransport, Transport};

pub mod artnet;
pub mod config;
pub mod osc;
pub mod params;
pub mod persistence;

use artnet::{ARTNET_PORT, ArtNetTransport};
use config::EngineConfig;
use osc::{OscClient, OscContext};
use persistence::PresetStore;

pub struct ServerConfig {
    pub local_ip: String,
    pub local_port: u16,
    pub target_ip: String,
    pub target_port: u16,
    pub config_path: Option<PathBuf>,
    pub preset_path: PathBuf,
    pub artnet_ip: Option<String>,
    pub artnet_universe: u16,
    pub debug: bool,
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve {}:{}", host, port))?
        .next()
        .ok_or_else(|| anyhow!("{}:{} resolved to nothing", host, port))
}

pub fn run_server(server_config: ServerConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(if server_config.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    // A broken rig description is fatal; only an absent one falls back.
    let engine_config = match &server_config.config_path {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    let layout = engine_config.channel_layout()?;
    let sources = engine_config.build_sources()?;
    info!(
        "rig: {} channels, {} sources, {} fixture pairs",
        layout.len(),
        sources.len(),
        engine_config.fixtures.pairs.len()
    );
    let mixer = Mixer::new(
        sources,
        layout,
        engine_config.history_ms,
        engine_config.tick_ms as f64,
    )?;
    let renderer = Renderer::new(engine_config.fixtures.clone(), &mixer.layout)?;

    let transport: Box<dyn Transport> = match &server_config.artnet_ip {
        Some(host) => {
            info!("Art-Net output to {}:{}", host, ARTNET_PORT);
            Box::new(ArtNetTransport::new(
                host,
                ARTNET_PORT,
                server_config.artnet_universe,
            )?)
        }
        None => {
            info!("no Art-Net target configured, output disabled");
            Box::new(NullTransport)
        }
    };

    let engine = Engine::new(
        mixer,
        renderer,
        transport,
        Duration::from_millis(engine_config.tick_ms),
    );
    let snapshot = engine.snapshot();
    let clock = engine.clock();
    let (command_tx, command_rx) = unbounded();
    let (event_tx, event_rx) = unbounded();
    let engine_handle = engine.spawn(command_rx, event_tx);

    let presets = Arc::new(Mutex::new(PresetStore::load(&server_config.preset_path)?));
    let client = Arc::new(OscClient::new(resolve(
        &server_config.target_ip,
        server_config.target_port,
    )?)?);

    let context = OscContext {
        commands: command_tx.clone(),
        snapshot: snapshot.clone(),
        clock,
        presets: presets.clone(),
        client: client.clone(),
    };

    // Bring the last selected look back before accepting input.
    let startup = presets
        .lock()
        .startup()
        .map(|(name, values)| (name.to_string(), values.to_vec()));
    if let Some((name, values)) = startup {
        info!("restoring preset {}", name);
        context.replay(&values);
    }

    let running = Arc::new(AtomicBool::new(true));
    let osc_handle = osc::spawn_listener(
        resolve(&server_config.local_ip, server_config.local_port)?,
        context,
        running.clone(),
    )?;

    {
        let command_tx = command_tx.clone();
        ctrlc::set_handler(move || {
            let _ = command_tx.send(EngineCommand::Shutdown);
        })
        .context("failed to install shutdown handler")?;
    }

    // The main thread becomes the event pump until the engine drains.
    for event in event_rx.iter() {
        match event {
            EngineEvent::CommandRejected { reason } => warn!("command rejected: {}", reason),
            EngineEvent::TransportConnected => {
                info!("transport up");
                let _ = client.send("/status/transport", vec![OscType::Int(1)]);
            }
            EngineEvent::TransportDisconnected => {
                warn!("transport down, holding last frame");
                let _ = client.send("/status/transport", vec![OscType::Int(0)]);
            }
            EngineEvent::Stopped => break,
        }
    }

    running.store(false, Ordering::Relaxed);
    engine_handle
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?;
    osc_handle
        .join()
        .map_err(|_| anyhow!("OSC listener thread panicked"))?;
    info!("stopped");
    Ok(())
}
