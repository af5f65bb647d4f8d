use serde::Deserialize;

/// Quantities are `0x`-prefixed hex strings on the wire.
pub fn parse_hex_u64(raw: &str) -> Option<u64> {
    u64::from_str_radix(raw.strip_prefix("0x")?, 16).ok()
}

pub fn parse_hex_bytes(raw: &str) -> Option<Vec<u8>> {
    hex::decode(raw.strip_prefix("0x")?).ok()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CkbBlock {
    pub header: CkbHeader,
    #[serde(default)]
    pub transactions: Vec<CkbTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CkbHeader {
    pub number: String,
    pub hash: String,
    pub parent_hash: String,
    /// Milliseconds, hex.
    pub timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CkbTransaction {
    pub hash: String,
    #[serde(default)]
    pub outputs: Vec<CellOutput>,
    #[serde(default)]
    pub outputs_data: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellOutput {
    /// Shannons, hex.
    pub capacity: String,
    pub lock: Script,
    #[serde(rename = "type")]
    pub type_: Option<Script>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Script {
    pub code_hash: String,
    pub hash_type: String,
    pub args: String,
}
