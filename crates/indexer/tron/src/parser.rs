use std::collections::{HashMap, HashSet};

use common::config::TronConfig;
use generic_indexer::{decode_tag, ChainBlock, ScanError, Transfer};
use tracing::{debug, warn};

use crate::types::{TransferContract, TriggerSmartContract, TronBlock, TronTransaction};

/// `transfer(address,uint256)`
const TRC20_TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];
const TRC20_CALL_LEN: usize = 4 + 32 + 32;
const ADDRESS_PREFIX: u8 = 0x41;

/// Base58check form (`T...`) of a 21-byte hex address (`41...`).
pub fn hex_to_base58(hex_address: &str) -> Option<String> {
    let bytes = hex::decode(hex_address.trim_start_matches("0x")).ok()?;
    if bytes.len() != 21 || bytes[0] != ADDRESS_PREFIX {
        return None;
    }
    Some(bs58::encode(bytes).with_check().into_string())
}

pub fn base58_to_hex(address: &str) -> Option<String> {
    let bytes = bs58::decode(address).with_check(None).into_vec().ok()?;
    if bytes.len() != 21 || bytes[0] != ADDRESS_PREFIX {
        return None;
    }
    Some(hex::encode(bytes))
}

#[derive(Debug, Clone)]
pub struct WatchList {
    recipients: HashSet<String>,
    /// Contract address (base58) to token id.
    tokens: HashMap<String, i64>,
    native_token_id: i64,
}

impl WatchList {
    pub fn new(
        recipients: impl IntoIterator<Item = String>,
        tokens: impl IntoIterator<Item = (String, i64)>,
        native_token_id: i64,
    ) -> Self {
        Self {
            recipients: recipients.into_iter().collect(),
            tokens: tokens.into_iter().collect(),
            native_token_id,
        }
    }

    pub fn from_config(cfg: &TronConfig) -> eyre::Result<Self> {
        for address in cfg
            .common
            .recipients
            .iter()
            .chain(cfg.tokens.iter().map(|t| &t.contract))
        {
            if base58_to_hex(address).is_none() {
                return Err(eyre::eyre!("invalid tron address {}", address));
            }
        }
        Ok(Self::new(
            cfg.common.recipients.iter().cloned(),
            cfg.tokens.iter().map(|t| (t.contract.clone(), t.token_id)),
            cfg.common.native_token_id,
        ))
    }
}

/// Converts a node block into the generic form. A block without an id is
/// one the node has not produced yet.
pub fn parse_block(number: u64, block: TronBlock, watch: &WatchList) -> Result<ChainBlock, ScanError> {
    let (Some(block_id), Some(header)) = (block.block_id, block.block_header) else {
        return Err(ScanError::BlockNotAvailable(number));
    };
    let raw = header.raw_data;
    if raw.number != number {
        return Err(ScanError::decode(format!(
            "asked for block {} but node returned {}",
            number, raw.number
        )));
    }

    let mut transfers = Vec::new();
    for tx in &block.transactions {
        if !tx.succeeded() {
            debug!("Skipping failed transaction {}", tx.tx_id);
            continue;
        }
        transfers.extend(parse_transaction(tx, watch, raw.timestamp)?);
    }

    Ok(ChainBlock {
        number,
        hash: block_id,
        parent_hash: raw.parent_hash,
        timestamp_ms: raw.timestamp,
        transfers,
    })
}

pub fn parse_transaction(
    tx: &TronTransaction,
    watch: &WatchList,
    timestamp_ms: i64,
) -> Result<Vec<Transfer>, ScanError> {
    let memo_tag = tx
        .raw_data
        .data
        .as_deref()
        .and_then(|data| hex::decode(data).ok())
        .and_then(|memo| decode_tag(&memo));

    let mut transfers = Vec::new();
    for contract in &tx.raw_data.contract {
        let transfer = match contract.kind.as_str() {
            "TransferContract" => {
                let value: TransferContract = serde_json::from_value(contract.parameter.value.clone())
                    .map_err(|e| ScanError::decode(format!("tx {}: {}", tx.tx_id, e)))?;
                parse_trx_transfer(tx, &value, watch, memo_tag.clone(), timestamp_ms)
            }
            "TriggerSmartContract" => {
                let value: TriggerSmartContract =
                    serde_json::from_value(contract.parameter.value.clone())
                        .map_err(|e| ScanError::decode(format!("tx {}: {}", tx.tx_id, e)))?;
                parse_trc20_transfer(tx, &value, watch, memo_tag.clone(), timestamp_ms)
            }
            _ => None,
        };
        transfers.extend(transfer);
    }
    Ok(transfers)
}

fn parse_trx_transfer(
    tx: &TronTransaction,
    contract: &TransferContract,
    watch: &WatchList,
    tag: Option<String>,
    timestamp_ms: i64,
) -> Option<Transfer> {
    let to = hex_to_base58(&contract.to_address)?;
    if !watch.recipients.contains(&to) || contract.amount <= 0 {
        return None;
    }

    Some(Transfer {
        tx_hash: tx.tx_id.clone(),
        from: hex_to_base58(&contract.owner_address),
        to,
        token_id: watch.native_token_id,
        value: contract.amount as u128,
        tag,
        timestamp_ms,
    })
}

fn parse_trc20_transfer(
    tx: &TronTransaction,
    contract: &TriggerSmartContract,
    watch: &WatchList,
    memo_tag: Option<String>,
    timestamp_ms: i64,
) -> Option<Transfer> {
    let token = hex_to_base58(&contract.contract_address)?;
    let token_id = *watch.tokens.get(&token)?;

    let data = hex::decode(&contract.data).ok()?;
    if data.len() < TRC20_CALL_LEN || data[..4] != TRC20_TRANSFER_SELECTOR {
        return None;
    }

    let mut recipient = Vec::with_capacity(21);
    recipient.push(ADDRESS_PREFIX);
    recipient.extend_from_slice(&data[16..36]);
    let to = hex_to_base58(&hex::encode(recipient))?;
    if !watch.recipients.contains(&to) {
        return None;
    }

    let amount = &data[36..68];
    if amount[..16].iter().any(|b| *b != 0) {
        warn!("Skipping {}: TRC-20 amount exceeds u128", tx.tx_id);
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&amount[16..]);
    let value = u128::from_be_bytes(low);
    if value == 0 {
        return None;
    }

    Some(Transfer {
        tx_hash: tx.tx_id.clone(),
        from: hex_to_base58(&contract.owner_address),
        to,
        token_id,
        value,
        tag: memo_tag.or_else(|| decode_tag(&data[TRC20_CALL_LEN..])),
        timestamp_ms,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const USDT_HEX: &str = "41a614f803b6fd780986a42c78ec9c7f77e6ded13c";
    const USDT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
    const MERCHANT_HEX: &str = "41000000000000000000000000000000000000aa00";
    const PAYER_HEX: &str = "41000000000000000000000000000000000000bb00";
    const TAG: &str = "5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c";

    fn merchant() -> String {
        hex_to_base58(MERCHANT_HEX).unwrap()
    }

    fn watch() -> WatchList {
        WatchList::new([merchant()], [(USDT.to_string(), 3)], 2)
    }

    fn block(transactions: serde_json::Value) -> TronBlock {
        serde_json::from_value(json!({
            "blockID": "00000000000003e8aa",
            "block_header": { "raw_data": {
                "number": 1000,
                "parentHash": "00000000000003e7bb",
                "timestamp": 1_700_000_000_000i64
            }},
            "transactions": transactions
        }))
        .unwrap()
    }

    fn trx_tx(id: &str, to_hex: &str, amount: i64, memo: Option<&str>, ret: &str) -> serde_json::Value {
        let mut raw = json!({
            "contract": [{
                "type": "TransferContract",
                "parameter": { "value": {
                    "owner_address": PAYER_HEX,
                    "to_address": to_hex,
                    "amount": amount
                }, "type_url": "type.googleapis.com/protocol.TransferContract" }
            }]
        });
        if let Some(memo) = memo {
            raw["data"] = json!(hex::encode(memo));
        }
        json!({ "txID": id, "ret": [{ "contractRet": ret }], "raw_data": raw })
    }

    fn trc20_tx(id: &str, to_hex: &str, amount: u128, tail: &[u8]) -> serde_json::Value {
        let mut data = TRC20_TRANSFER_SELECTOR.to_vec();
        let mut word = [0u8; 32];
        word[11..].copy_from_slice(&hex::decode(to_hex).unwrap());
        word[11] = 0;
        data.extend_from_slice(&word);
        let mut amount_word = [0u8; 32];
        amount_word[16..].copy_from_slice(&amount.to_be_bytes());
        data.extend_from_slice(&amount_word);
        data.extend_from_slice(tail);
        json!({
            "txID": id,
            "ret": [{ "contractRet": "SUCCESS" }],
            "raw_data": { "contract": [{
                "type": "TriggerSmartContract",
                "parameter": { "value": {
                    "owner_address": PAYER_HEX,
                    "contract_address": USDT_HEX,
                    "data": hex::encode(data)
                }}
            }]}
        })
    }

    #[test]
    fn address_conversion_round_trips() {
        assert_eq!(hex_to_base58(USDT_HEX).as_deref(), Some(USDT));
        assert_eq!(base58_to_hex(USDT).as_deref(), Some(USDT_HEX));
        assert_eq!(hex_to_base58("00a614f803b6fd780986a42c78ec9c7f77e6ded13c"), None);
        assert_eq!(base58_to_hex("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6u"), None);
    }

    #[test]
    fn trx_transfer_with_memo_tag() {
        let parsed = parse_block(
            1000,
            block(json!([trx_tx("aa01", MERCHANT_HEX, 5_000_000, Some(TAG), "SUCCESS")])),
            &watch(),
        )
        .unwrap();

        assert_eq!(parsed.hash, "00000000000003e8aa");
        assert_eq!(parsed.parent_hash, "00000000000003e7bb");
        assert_eq!(parsed.transfers.len(), 1);
        let t = &parsed.transfers[0];
        assert_eq!(t.to, merchant());
        assert_eq!(t.from, hex_to_base58(PAYER_HEX));
        assert_eq!(t.token_id, 2);
        assert_eq!(t.value, 5_000_000);
        assert_eq!(t.tag.as_deref(), Some(TAG));
        assert_eq!(t.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn failed_and_unwatched_transfers_are_skipped() {
        let parsed = parse_block(
            1000,
            block(json!([
                trx_tx("aa01", MERCHANT_HEX, 5, None, "REVERT"),
                trx_tx("aa02", PAYER_HEX, 5, None, "SUCCESS"),
                trx_tx("aa03", MERCHANT_HEX, 7, Some("hello"), "SUCCESS"),
            ])),
            &watch(),
        )
        .unwrap();

        assert_eq!(parsed.transfers.len(), 1);
        assert_eq!(parsed.transfers[0].tx_hash, "aa03");
        assert_eq!(parsed.transfers[0].tag, None);
    }

    #[test]
    fn trc20_transfer_with_call_data_tag() {
        let raw_tag = hex::decode(TAG).unwrap();
        let parsed = parse_block(
            1000,
            block(json!([trc20_tx("bb01", MERCHANT_HEX, 12_000_000, &raw_tag)])),
            &watch(),
        )
        .unwrap();

        assert_eq!(parsed.transfers.len(), 1);
        let t = &parsed.transfers[0];
        assert_eq!(t.token_id, 3);
        assert_eq!(t.value, 12_000_000);
        assert_eq!(t.to, merchant());
        assert_eq!(t.tag.as_deref(), Some(TAG));
    }

    #[test]
    fn empty_block_is_not_available() {
        let err = parse_block(1001, TronBlock::default(), &watch()).unwrap_err();
        assert!(matches!(err, ScanError::BlockNotAvailable(1001)));
    }

    #[test]
    fn height_mismatch_is_a_decode_error() {
        let err = parse_block(999, block(json!([])), &watch()).unwrap_err();
        assert!(matches!(err, ScanError::Decode(_)));
    }
}
