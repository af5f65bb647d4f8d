/// A value transfer to one of the watched recipient addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub tx_hash: String,
    /// Payer, when the chain exposes it without extra lookups.
    pub from: Option<String>,
    pub to: String,
    pub token_id: i64,
    /// Smallest indivisible unit of the token.
    pub value: u128,
    /// Order id embedded in the transaction, if any.
    pub tag: Option<String>,
    pub timestamp_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBlock {
    pub number: u64,
    pub hash: String,
    pub parent_hash: String,
    pub timestamp_ms: i64,
    pub transfers: Vec<Transfer>,
}

/// Extracts an order id from a tag payload.
///
/// Accepts 32 raw bytes or the 64-character hex form (any case, optional
/// `0x`). Anything else carries no tag.
pub fn decode_tag(payload: &[u8]) -> Option<String> {
    if payload.len() == 32 {
        return Some(hex::encode(payload));
    }

    let text = std::str::from_utf8(payload).ok()?;
    let text = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    if text.len() == 64 && text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Some(text.to_ascii_lowercase());
    }
    None
}
