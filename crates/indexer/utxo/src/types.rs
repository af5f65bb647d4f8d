use serde::{de, Deserialize, Deserializer};
use serde_json::value::RawValue;

const SATS_PER_COIN: u128 = 100_000_000;
const COIN_DECIMALS: usize = 8;

#[derive(Debug, Clone, Deserialize)]
pub struct UtxoBlock {
    pub hash: String,
    pub height: u64,
    /// Absent on the genesis block.
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    /// Seconds.
    pub time: i64,
    #[serde(default)]
    pub tx: Vec<BlockTx>,
}

/// Decoded transaction at verbosity 2, txid only at verbosity 1.
#[derive(Debug, Clone)]
pub enum BlockTx {
    Full(UtxoTransaction),
    Id(String),
}

// Untagged buffering would read amounts as floats before `Sats` sees them.
impl<'de> Deserialize<'de> for BlockTx {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        let text = raw.get();
        if text.trim_start().starts_with('"') {
            serde_json::from_str(text).map(BlockTx::Id)
        } else {
            serde_json::from_str(text).map(BlockTx::Full)
        }
        .map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UtxoTransaction {
    pub txid: String,
    #[serde(default)]
    pub vin: Vec<TxInput>,
    #[serde(default)]
    pub vout: Vec<TxOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxInput {
    pub coinbase: Option<String>,
    /// Only present when the node resolves spent outputs.
    pub prevout: Option<PrevOut>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrevOut {
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxOutput {
    /// Reported by the node in whole coins.
    pub value: Sats,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    #[serde(default)]
    pub hex: String,
    pub address: Option<String>,
    /// Pre-22 Bitcoin Core and Dogecoin report a list instead.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl ScriptPubKey {
    pub fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .or_else(|| self.addresses.first().map(String::as_str))
    }
}

impl UtxoTransaction {
    pub fn is_coinbase(&self) -> bool {
        self.vin.iter().any(|input| input.coinbase.is_some())
    }
}

/// Amount in the chain's smallest unit, read from the node's decimal coin
/// amount without going through `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Sats(pub u128);

impl<'de> Deserialize<'de> for Sats {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        parse_coins(raw.get())
            .map(Sats)
            .ok_or_else(|| de::Error::custom(format!("invalid coin amount {}", raw.get())))
    }
}

/// Parses a non-negative decimal coin amount with at most eight fractional
/// digits into satoshis.
pub fn parse_coins(text: &str) -> Option<u128> {
    let text = text.trim();
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty()
        || fraction.len() > COIN_DECIMALS
        || !whole.bytes().all(|b| b.is_ascii_digit())
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }

    let whole: u128 = whole.parse().ok()?;
    let fraction: u128 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<width$}", fraction, width = COIN_DECIMALS)
            .parse()
            .ok()?
    };
    whole.checked_mul(SATS_PER_COIN)?.checked_add(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coin_amounts_parse_exactly() {
        assert_eq!(parse_coins("0.1"), Some(10_000_000));
        assert_eq!(parse_coins("0.00000001"), Some(1));
        assert_eq!(parse_coins("21.12345678"), Some(2_112_345_678));
        assert_eq!(parse_coins("5"), Some(500_000_000));
        // Above 2^53 satoshis.
        assert_eq!(parse_coins("123456789.12345678"), Some(12_345_678_912_345_678));
        assert_eq!(parse_coins("-1.0"), None);
        assert_eq!(parse_coins("1.123456789"), None);
        assert_eq!(parse_coins("1e-8"), None);
    }

    #[test]
    fn verbose_block_keeps_large_outputs_exact() {
        let text = r#"{
            "hash": "00ab",
            "height": 5,
            "time": 1700000000,
            "tx": [
                "cd01",
                {
                    "txid": "ef02",
                    "vin": [],
                    "vout": [{
                        "value": 98765432.10987654,
                        "n": 0,
                        "scriptPubKey": { "hex": "", "address": "DMerchant" }
                    }]
                }
            ]
        }"#;
        let block: UtxoBlock = serde_json::from_str(text).unwrap();

        assert!(matches!(&block.tx[0], BlockTx::Id(id) if id == "cd01"));
        match &block.tx[1] {
            BlockTx::Full(tx) => assert_eq!(tx.vout[0].value, Sats(9_876_543_210_987_654)),
            other => panic!("unexpected {:?}", other),
        }
    }
}
