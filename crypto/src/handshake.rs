// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk
// Cipher and checksum for the directory/sign exchanges that happen before
// a session key exists. Reverse engineered from the wild.

const SUM_TABLE0: [u8; 7] = [0x5e, 0x93, 0x1c, 0x47, 0xa6, 0x3b, 0xd2];
const SUM_TABLE1: [u8; 9] = [0x88, 0x2f, 0x74, 0xc1, 0x0b, 0x9a, 0xe5, 0x36, 0x6d];

const PAD: [u8; 8] = [0x4a, 0xd7, 0x21, 0xb8, 0x9c, 0x03, 0xe6, 0x5f];

/// Table-driven 32-bit checksum over pre-session payloads.
///
/// Both table walks start at offsets derived from the input (its length and
/// its middle byte), so the same bytes at a different position or length sum
/// differently. Empty input has no middle byte and sums to 0.
pub fn sum32(data: &[u8]) -> u32 {
    if data.is_empty() {
        return 0;
    }

    let idx0 = (data.len() + 1) % 256;
    let idx1 = (data[data.len() / 2] as usize + 1) % 256;

    let mut out = [0u8; 4];
    for (i, b) in data.iter().enumerate() {
        let key = b ^ SUM_TABLE0[(idx0 + i) % 7] ^ SUM_TABLE1[(idx1 + i) % 9];
        out[i % 4] = out[i % 4].wrapping_add(key);
    }
    u32::from_be_bytes(out)
}

// The keystream is a plain LCG; the step runs before every byte so the
// seed itself never touches the data.
fn next_key(k: u32) -> u32 {
    k.wrapping_mul(54323).wrapping_add(1)
}

/// Inverse of [`encrypt`] for the same `key`.
pub fn decrypt(data: &[u8], key: u32) -> Vec<u8> {
    let mut k = key;
    data.iter()
        .enumerate()
        .map(|(i, b)| {
            k = next_key(k);
            let tmp = b ^ (k >> 13) as u8;
            tmp ^ PAD[i % 8]
        })
        .collect()
}

pub fn encrypt(data: &[u8], key: u32) -> Vec<u8> {
    let mut k = key;
    data.iter()
        .enumerate()
        .map(|(i, b)| {
            k = next_key(k);
            (b ^ PAD[i % 8]) ^ (k >> 13) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum32_is_deterministic() {
        let data = b"Hello, MHF!";
        assert_eq!(sum32(data), sum32(data));
        assert_eq!(sum32(data), 0x6a19467e);
    }

    #[test]
    fn sum32_tells_close_inputs_apart() {
        assert_ne!(sum32(b"Hello, MHF!"), sum32(b"Hello, MHF?"));
        assert_eq!(sum32(b"Hello, MHF?"), 0x6a192c7e);
    }

    #[test]
    fn sum32_edge_lengths() {
        assert_eq!(sum32(b""), 0);
        assert_ne!(sum32(b"\x00"), sum32(b"\x00\x00"));

        let bytes: Vec<u8> = (0..32).collect();
        assert_eq!(sum32(&bytes), 0x62160377);
    }

    #[test]
    fn sum32_sees_every_position() {
        let base: Vec<u8> = (0..64).map(|i| (i * 7) as u8).collect();
        let reference = sum32(&base);
        for pos in [0, 1, 31, 63] {
            let mut tampered = base.clone();
            tampered[pos] ^= 0x01;
            assert_ne!(sum32(&tampered), reference, "flip at {pos} went unnoticed");
        }
    }

    #[test]
    fn cipher_inverse_law() {
        let payloads: [&[u8]; 4] = [b"", b"\x00", b"directory request", &[0xff; 300]];
        for key in 0..=255u32 {
            for payload in payloads {
                let enc = encrypt(payload, key);
                assert_eq!(enc.len(), payload.len());
                assert_eq!(decrypt(&enc, key), payload);
            }
        }
    }

    #[test]
    fn cipher_inverse_law_wide_keys() {
        let payload = b"wider than a byte";
        for key in [0x100u32, 0xdeadbeef, u32::MAX] {
            assert_eq!(decrypt(&encrypt(payload, key), key), payload);
        }
    }

    #[test]
    fn keystream_depends_on_the_key() {
        let payload = [0u8; 16];
        assert_ne!(encrypt(&payload, 1), encrypt(&payload, 2));
    }
}
