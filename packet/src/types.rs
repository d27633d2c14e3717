// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Which way a recorded packet travelled, relative to the recording side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Direction {
    Inbound = 0,
    Outbound = 1,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Direction::Inbound => "in",
            Direction::Outbound => "out",
        })
    }
}

/// The three services a client talks to over its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ServerRole {
    Sign = 0,
    Entrance = 1,
    Channel = 2,
}

/// Client protocol generation, negotiated out of band and fixed for the
/// lifetime of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Generation {
    Forward = 0,
    Zenith = 1,
}

impl Generation {
    /// Zenith clients pack bodies larger than 64KiB with the extended-size
    /// header bits; older clients never exceed the 16-bit size field.
    pub fn has_extended_size(self) -> bool {
        matches!(self, Generation::Zenith)
    }
}
