// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use std::net::SocketAddrV4;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use packet::{Generation, ServerRole};

use crate::entrance::ChannelEntry;

#[derive(ValueEnum, Debug, Clone, PartialEq)]
#[clap(rename_all = "kebab_case")]
pub enum Service {
    Entrance,
    Proxy,
}

#[derive(Parser, Debug)]
#[clap(name = "mhfsrv", version)]
pub struct Config {
    #[clap(short = 's', long = "service", value_delimiter = ',', num_args = 1..)]
    pub services: Vec<Service>,

    #[clap(flatten)]
    pub entrance: crate::entrance::EntranceArgs,

    #[clap(flatten)]
    pub proxy: crate::proxy::ProxyArgs,

    /// where capture files get written
    #[clap(long = "capture-dir", default_value = "captures")]
    pub capture_dir: PathBuf,
}

pub fn parse_from_str(args: &str) -> Config {
    Config::parse_from(std::iter::once("mhfsrv").chain(args.split_whitespace()))
}

pub fn parse_role(s: &str) -> Result<ServerRole, String> {
    match s {
        "sign" => Ok(ServerRole::Sign),
        "entrance" => Ok(ServerRole::Entrance),
        "channel" => Ok(ServerRole::Channel),
        _ => Err(format!("unknown role {s:?} (sign, entrance, channel)")),
    }
}

pub fn parse_generation(s: &str) -> Result<Generation, String> {
    match s {
        "forward" => Ok(Generation::Forward),
        "zenith" => Ok(Generation::Zenith),
        _ => Err(format!("unknown generation {s:?} (forward, zenith)")),
    }
}

pub fn parse_channel(s: &str) -> Result<ChannelEntry, String> {
    let addr: SocketAddrV4 = s
        .parse()
        .map_err(|e| format!("invalid channel address {s:?}: {e}"))?;
    Ok(ChannelEntry {
        ip: addr.ip().octets(),
        port: addr.port(),
    })
}
