// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

// Inspect or fix up capture files produced by the proxy service.

use capture::{filter, patch_metadata, CaptureReader, PacketRecord};
use clap::Parser;
use packet::Direction;

use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Dump or patch a packet capture file.
#[derive(Parser, Debug)]
#[command(name = "capdump", version)]
struct Args {
    file: PathBuf,

    /// only show records with these opcodes
    #[clap(long = "opcode", value_delimiter = ',')]
    opcodes: Vec<u16>,

    /// only show one direction (in / out)
    #[clap(long = "direction", value_parser = parse_direction)]
    direction: Option<Direction>,

    /// rewrite the character id in the metadata block
    #[clap(long = "set-char-id")]
    char_id: Option<u32>,

    /// rewrite the user id in the metadata block
    #[clap(long = "set-user-id")]
    user_id: Option<u32>,
}

fn parse_direction(s: &str) -> Result<Direction, String> {
    match s {
        "in" => Ok(Direction::Inbound),
        "out" => Ok(Direction::Outbound),
        _ => Err(format!("unknown direction {s:?} (in, out)")),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.char_id.is_some() || args.user_id.is_some() {
        return patch(&args);
    }

    let file = File::open(&args.file).with_context(|| format!("cannot open {:?}", args.file))?;
    let mut reader = CaptureReader::new(file)?;
    println!(
        "role {:?}, generation {:?}, started {}",
        reader.header.role, reader.header.generation, reader.header.started_at
    );
    println!("meta: {:?}", reader.meta);

    let mut records = Vec::new();
    while let Some(record) = reader.read_packet()? {
        records.push(record);
    }
    let total = records.len();

    let records = match args.opcodes.is_empty() {
        true => records,
        false => filter::keep_opcodes(&records, &args.opcodes),
    };
    let records = match args.direction {
        Some(direction) => filter::by_direction(&records, direction),
        None => records,
    };

    for record in &records {
        print_record(record);
    }
    println!("{} records shown ({total} in file)", records.len());
    Ok(())
}

fn patch(args: &Args) -> Result<()> {
    let file = File::open(&args.file).with_context(|| format!("cannot open {:?}", args.file))?;
    let mut meta = CaptureReader::new(file)?.meta;
    if let Some(id) = args.char_id {
        meta.char_id = id;
    }
    if let Some(id) = args.user_id {
        meta.user_id = id;
    }

    let mut file = File::options()
        .read(true)
        .write(true)
        .open(&args.file)
        .with_context(|| format!("cannot reopen {:?} for writing", args.file))?;
    patch_metadata(&mut file, &meta)?;
    println!("metadata updated: {meta:?}");
    Ok(())
}

fn print_record(record: &PacketRecord) {
    let preview: Vec<String> = record
        .payload
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect();
    println!(
        "{} {:3} {:#06x} {:6}B  {}",
        record.timestamp,
        record.direction,
        record.opcode,
        record.payload.len(),
        preview.join(" ")
    );
}
