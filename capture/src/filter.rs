// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Record selection helpers for analysis and replay tooling. All of these
//! leave their input alone and hand back a fresh list.

use packet::Direction;

use crate::PacketRecord;

/// Records whose opcode is in `opcodes`.
pub fn keep_opcodes(records: &[PacketRecord], opcodes: &[u16]) -> Vec<PacketRecord> {
    records
        .iter()
        .filter(|r| opcodes.contains(&r.opcode))
        .cloned()
        .collect()
}

/// Records whose opcode is not in `opcodes`.
pub fn drop_opcodes(records: &[PacketRecord], opcodes: &[u16]) -> Vec<PacketRecord> {
    records
        .iter()
        .filter(|r| !opcodes.contains(&r.opcode))
        .cloned()
        .collect()
}

/// Records that travelled in `direction`.
pub fn by_direction(records: &[PacketRecord], direction: Direction) -> Vec<PacketRecord> {
    records
        .iter()
        .filter(|r| r.direction == direction)
        .cloned()
        .collect()
}
