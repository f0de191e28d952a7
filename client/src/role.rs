use crate::IndexMap;
use smol_str::SmolStr;

pub type Roles = IndexMap<u64, Role>;

#[derive(Debug, Default, Clone)]
pub struct Role {
    pub name: SmolStr,
    pub color: Option<[u8; 3]>,
    pub hoist: bool,
    pub position: i32,
}

/// Decodes the wire representation of a role color. The server packs the
/// color as RGB in the low 24 bits; a negative value means "no color set".
pub fn decode_color(raw: i32) -> Option<[u8; 3]> {
    (raw >= 0).then(|| {
        let raw = raw as u32;
        [(raw >> 16) as u8, (raw >> 8) as u8, raw as u8]
    })
}

pub fn encode_color(color: Option<[u8; 3]>) -> i32 {
    match color {
        Some([r, g, b]) => ((r as i32) << 16) | ((g as i32) << 8) | b as i32,
        None => -1,
    }
}
