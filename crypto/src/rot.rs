// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk
// Keyed stream cipher used by the game's session layer once a connection
// is past the directory handshake. Reverse engineered from the wild.

/// Seeds for the per-packet keystream. The session layer rotates a 32-bit
/// key on every frame; [`key_index`] folds that key into an index here.
const KEY_TABLE: [u32; 256] = [
    0x380C394E, 0x26DA306B, 0x3D9C420D, 0xD9B1051C, 0x8A4DFE4B, 0x4ADF5F23, 0x1342E992, 0xDBD55CB0,
    0xFAA3AE23, 0xF684F9A8, 0x31A34365, 0x21D84766, 0xEE106636, 0x07311988, 0x8291B480, 0x978BDF9F,
    0xA6888652, 0xFE0F45BE, 0x98A04858, 0x14BA935E, 0x2E00667C, 0x8FC5E23E, 0xD50FE30E, 0x1E91AECE,
    0xA4D2B0C5, 0x544BA14E, 0x8CA8F9C4, 0x01231442, 0xFA63EBE3, 0x024340A2, 0x317B9670, 0x2185A9A8,
    0xAEEC1431, 0x786FCB68, 0xA3C2D39D, 0x67510377, 0xA83C0843, 0x94F9312F, 0x0D864F6B, 0xE3140A0C,
    0x637EF8B2, 0xF4C13D52, 0xE305C10C, 0x41C8F53A, 0x7A75FE47, 0x18265D40, 0x55E5DCFC, 0x587A92C3,
    0xFDFF5A22, 0xB7DF5CA4, 0x83EC24CC, 0x80CBB003, 0x71FB9CCB, 0x498D335B, 0x669451AF, 0x45A9CF7B,
    0xE3DFDD08, 0x5E1CF169, 0xC3825AB5, 0x38F74624, 0x748271EC, 0x5FF55C07, 0x8D6243D4, 0x605941C7,
    0xBF69B71E, 0xD63AD345, 0xE0D6BF6B, 0xFE427327, 0xF15E06E6, 0x5375A4EA, 0x04CDCD7B, 0xB434D94A,
    0x72737674, 0x16A687A3, 0xAB0F14DA, 0x4067EF84, 0x2025A581, 0xD956667F, 0x57793086, 0x8B9A40A8,
    0x9BFC825D, 0x48C2DE18, 0x2B92532F, 0x37B06348, 0x127D4A6E, 0xEE2FF10B, 0x2CAE77F6, 0x0C210FB1,
    0x4B94320D, 0x0AD88D86, 0x462D8060, 0x4A0C6357, 0xBAF8C485, 0x03B39DB1, 0x80D7CDD2, 0xF0266289,
    0xB40609BF, 0xAAC2638A, 0xD31A02A2, 0x358D4B8D, 0x8F0CDC9B, 0x6B2C3C3C, 0x81BB0729, 0x7F226B3A,
    0x9D567877, 0x34225950, 0xC93AA9EA, 0x2C9ED28A, 0xDA72D406, 0xB8F25271, 0x115B9A61, 0xB5F79A4C,
    0xCCE634B7, 0x730EB18E, 0x1CB3F5B2, 0x40A75ADE, 0x7D6B1001, 0x83D92EA8, 0x8E492460, 0x3A43D69A,
    0x80CBC088, 0x69D08181, 0x8CE2AAF3, 0xE9334AE9, 0xEA620590, 0x51E0D968, 0xF4B76324, 0xC97CA30E,
    0x8BCCCB36, 0x987436FE, 0x111E3248, 0xF8881500, 0x2BDF2D0A, 0xE69A1B5E, 0xD4BBB6F4, 0x8EC305FA,
    0x693164B7, 0xA81502F9, 0xF5F60CB9, 0x212A9C72, 0x3D2DE01A, 0xDE19E69B, 0xD9E101E6, 0x382195DB,
    0x350F3129, 0x17A251ED, 0x30226591, 0xB942FBE6, 0x1EA54305, 0x8030478D, 0x34599432, 0x31A7893B,
    0xF375F666, 0xD7608459, 0x8A19633E, 0x0F92DDFD, 0x629EDD2B, 0xD823D830, 0x415F03F3, 0x311D6624,
    0xCEDE1B74, 0xD15364A0, 0x2863E785, 0x680C9E01, 0x4C225043, 0x2C6F8D4D, 0xFA9B53F6, 0x4D331F0A,
    0x0E08EE64, 0x22026456, 0x4691C019, 0xA95DFA18, 0x3F6B6BA7, 0xA4A28E49, 0x6DA72CC3, 0xB3060737,
    0x81D14A67, 0xF1A13A3D, 0xE8D4CD1B, 0xF12FDD21, 0xD422C801, 0x8AEA6034, 0x62D98FFF, 0x27AFCD49,
    0x7720D720, 0x8A64B317, 0xDD617C80, 0xB2BEABA9, 0x34487403, 0x49201C19, 0x61558D8E, 0xC389D6C9,
    0x3A6A32F7, 0x01BEF1EA, 0xE14DFC2B, 0x1A9D0465, 0xEAE0EE47, 0x2722E937, 0x458AAD9A, 0xD9139237,
    0x428A9AC3, 0x7E40FF5A, 0x677A0041, 0xA81B1C96, 0xF1CE992C, 0xA8F8F672, 0xFB7E391D, 0x6DF5DF25,
    0x7F0B37DA, 0x551B23FD, 0x9DF8D5D7, 0xF9241678, 0xE7B60FE3, 0x4A72468E, 0x19D7E386, 0xE0A6733C,
    0x24B1D6EE, 0x5EB25285, 0x30E1F149, 0x61A3DE24, 0x0A318364, 0xCC324B69, 0xE579ABB1, 0xCA05C93D,
    0xEB3B48F3, 0xE67AFA2E, 0xD3C58A22, 0x9B41F392, 0x4CA67AB6, 0x575C66D8, 0xB30B63E5, 0xC87F68D9,
    0x422CE8FF, 0x91210BDE, 0x423B1705, 0xB4CB4BA8, 0x9A51201D, 0xD2197D10, 0xE7E66CCF, 0xE17D82DE,
    0xAE807CAF, 0x93B25B86, 0x1CFFE2BB, 0x1090845D, 0xFE8FA86C, 0x8EF3374C, 0x992437CE, 0xA9BE1A50,
    0xA431CD18, 0x2FBEAF0C, 0xCF3B39BD, 0xB3C7F7E0, 0x7104E2A1, 0xEBA61B34, 0x01CE4041, 0xCB5475BA,
];

/// One cipher pass over a whole frame body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub data: Vec<u8>,
    /// Summary of the three checksums, carried into the next frame's header.
    pub combined: u16,
    pub checks: [u16; 3],
}

/// Fold a rotating key into a [`KEY_TABLE`] index.
///
/// The result stays strictly below 0xff, which is what makes the receive
/// side's single-byte recovery scan able to reproduce any rotated key.
pub fn key_index(key_rot: u32) -> u8 {
    (((key_rot ^ (key_rot >> 16)) & 0xffff) % 0xff) as u8
}

/// Encrypt or decrypt `data` under `key_rot` (or, when `override_key` is
/// given, under that table index directly, ignoring `key_rot`).
///
/// Pure function of its four inputs. The output always has the same length
/// as the input, and the transform is its own inverse under a shared key.
/// The checksums describe the plaintext side of the call: the input when
/// `encrypting`, the output otherwise.
pub fn transform(data: &[u8], key_rot: u32, encrypting: bool, override_key: Option<u8>) -> Transformed {
    let idx = override_key.unwrap_or_else(|| key_index(key_rot));
    let mut state = KEY_TABLE[idx as usize];

    let mut out = Vec::with_capacity(data.len());
    for b in data {
        state = state.wrapping_mul(0x343fd).wrapping_add(0x269ec3);
        out.push(b ^ (state >> 16) as u8);
    }

    let plaintext = if encrypting { data } else { &out };
    let (checks, combined) = payload_checks(plaintext);

    Transformed { data: out, combined, checks }
}

/// Three interleaved checksums over the plaintext, plus their summary.
/// Position-sensitive, so reordered bytes don't cancel out.
fn payload_checks(plaintext: &[u8]) -> ([u16; 3], u16) {
    let mut checks = [0u16; 3];
    for (i, b) in plaintext.iter().enumerate() {
        let c = &mut checks[i % 3];
        *c = c.rotate_left(3) ^ (*b as u16) ^ (i as u16).wrapping_mul(29);
    }
    let combined = checks[0].wrapping_add(checks[1]).wrapping_add(checks[2]);
    (checks, combined)
}
