use anyhow::Result;
use clap::{Arg, ArgAction, Command, value_parser};
use std::path::PathBuf;

use luxmix_server::{ServerConfig, run_server};

fn main() -> Result<()> {
    let matches = Command::new("luxmix")
        .about("lighting signal engine driving DMX over Art-Net, controlled over OSC")
        .arg(
            Arg::new("local-ip")
                .long("local-ip")
                .help("address to listen for OSC on")
                .default_value("0.0.0.0"),
        )
        .arg(
            Arg::new("local-port")
                .long("local-port")
                .help("port to listen for OSC on")
                .value_parser(value_parser!(u16))
                .default_value("8000"),
        )
        .arg(
            Arg::new("target-ip")
                .long("target-ip")
                .help("address OSC feedback is sent to")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("target-port")
                .long("target-port")
                .help("port OSC feedback is sent to")
                .value_parser(value_parser!(u16))
                .default_value("9000"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("rig config YAML; the built-in house rig when omitted")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("presets")
                .long("presets")
                .help("preset file, created on first save")
                .value_parser(value_parser!(PathBuf))
                .default_value("presets.yaml"),
        )
        .arg(
            Arg::new("artnet-ip")
                .long("artnet-ip")
                .help("Art-Net node address; output disabled when omitted"),
        )
        .arg(
            Arg::new("artnet-universe")
                .long("artnet-universe")
                .help("Art-Net universe to output on")
                .value_parser(value_parser!(u16))
                .default_value("0"),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("verbose logging")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    run_server(ServerConfig {
        local_ip: matches.get_one::<String>("local-ip").unwrap().clone(),
        local_port: *matches.get_one::<u16>("local-port").unwrap(),
        target_ip: matches.get_one::<String>("target-ip").unwrap().clone(),
        target_port: *matches.get_one::<u16>("target-port").unwrap(),
        config_path: matches.get_one::<PathBuf>("config").cloned(),
        preset_path: matches.get_one::<PathBuf>("presets").unwrap().clone(),
        artnet_ip: matches.get_one::<String>("artnet-ip").cloned(),
        artnet_universe: *matches.get_one::<u16>("artnet-universe").unwrap(),
        debug: matches.get_flag("debug"),
    })
}
