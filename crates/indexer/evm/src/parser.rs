use std::{
    collections::{HashMap, HashSet},
    str::FromStr,
};

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol,
    sol_types::SolCall,
};
use common::config::EvmConfig;
use generic_indexer::{decode_tag, Transfer};
use tracing::warn;

sol! {
    function transfer(address to, uint256 amount) returns (bool);
}

/// Length of an ABI-encoded `transfer` call: selector plus two words.
const TRANSFER_CALL_LEN: usize = 4 + 32 + 32;

/// The fields of a transaction the parser needs.
#[derive(Debug, Clone)]
pub struct EvmTx {
    pub hash: B256,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
}

/// Recipients and token contracts watched on one EVM chain.
#[derive(Debug, Clone)]
pub struct WatchList {
    recipients: HashSet<Address>,
    tokens: HashMap<Address, i64>,
    native_token_id: i64,
}

pub fn format_address(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}

pub fn format_hash(hash: &B256) -> String {
    format!("0x{}", hex::encode(hash.as_slice()))
}

fn parse_address(raw: &str) -> eyre::Result<Address> {
    Address::from_str(raw.trim()).map_err(|e| eyre::eyre!("invalid address {}: {}", raw, e))
}

impl WatchList {
    pub fn new(
        recipients: impl IntoIterator<Item = Address>,
        tokens: impl IntoIterator<Item = (Address, i64)>,
        native_token_id: i64,
    ) -> Self {
        Self {
            recipients: recipients.into_iter().collect(),
            tokens: tokens.into_iter().collect(),
            native_token_id,
        }
    }

    pub fn from_config(cfg: &EvmConfig) -> eyre::Result<Self> {
        let recipients = cfg
            .common
            .recipients
            .iter()
            .map(|r| parse_address(r))
            .collect::<eyre::Result<Vec<_>>>()?;
        let tokens = cfg
            .tokens
            .iter()
            .map(|t| Ok((parse_address(&t.contract)?, t.token_id)))
            .collect::<eyre::Result<Vec<_>>>()?;
        Ok(Self::new(recipients, tokens, cfg.common.native_token_id))
    }

    pub fn is_recipient(&self, address: &Address) -> bool {
        self.recipients.contains(address)
    }
}

/// Decodes a transaction into a transfer to a watched recipient.
///
/// Native transfers carry the order tag as the whole call data; token
/// transfers carry it after the ABI-encoded `transfer` arguments.
pub fn parse_transaction(tx: &EvmTx, watch: &WatchList, timestamp_ms: i64) -> Option<Transfer> {
    let to = tx.to?;

    if let Some(token_id) = watch.tokens.get(&to) {
        return parse_token_transfer(tx, *token_id, watch, timestamp_ms);
    }

    if !watch.is_recipient(&to) || tx.value.is_zero() {
        return None;
    }
    let value = to_u128(tx, tx.value)?;

    Some(Transfer {
        tx_hash: format_hash(&tx.hash),
        from: Some(format_address(&tx.from)),
        to: format_address(&to),
        token_id: watch.native_token_id,
        value,
        tag: decode_tag(&tx.input),
        timestamp_ms,
    })
}

fn parse_token_transfer(
    tx: &EvmTx,
    token_id: i64,
    watch: &WatchList,
    timestamp_ms: i64,
) -> Option<Transfer> {
    let input = tx.input.as_ref();
    if input.len() < TRANSFER_CALL_LEN || input[..4] != transferCall::SELECTOR {
        return None;
    }

    let call = transferCall::abi_decode(&input[..TRANSFER_CALL_LEN], true).ok()?;
    if !watch.is_recipient(&call.to) || call.amount.is_zero() {
        return None;
    }
    let value = to_u128(tx, call.amount)?;

    Some(Transfer {
        tx_hash: format_hash(&tx.hash),
        from: Some(format_address(&tx.from)),
        to: format_address(&call.to),
        token_id,
        value,
        tag: decode_tag(&input[TRANSFER_CALL_LEN..]),
        timestamp_ms,
    })
}

fn to_u128(tx: &EvmTx, value: U256) -> Option<u128> {
    match u128::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Skipping {}: value {} exceeds u128", format_hash(&tx.hash), value);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    const MERCHANT: Address = address!("00000000000000000000000000000000000000aa");
    const PAYER: Address = address!("00000000000000000000000000000000000000bb");
    const USDT: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");
    const TAG: &str = "5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c";

    fn watch() -> WatchList {
        WatchList::new([MERCHANT], [(USDT, 2)], 1)
    }

    fn tx(to: Address, value: u64, input: Vec<u8>) -> EvmTx {
        EvmTx {
            hash: b256!("1111111111111111111111111111111111111111111111111111111111111111"),
            from: PAYER,
            to: Some(to),
            value: U256::from(value),
            input: Bytes::from(input),
        }
    }

    fn transfer_input(to: Address, amount: u64, tail: &[u8]) -> Vec<u8> {
        let mut input = transferCall {
            to,
            amount: U256::from(amount),
        }
        .abi_encode();
        input.extend_from_slice(tail);
        input
    }

    #[test]
    fn native_transfer_with_tag() {
        let parsed = parse_transaction(&tx(MERCHANT, 1_000, TAG.as_bytes().to_vec()), &watch(), 5)
            .expect("transfer");
        assert_eq!(parsed.token_id, 1);
        assert_eq!(parsed.value, 1_000);
        assert_eq!(parsed.to, "0x00000000000000000000000000000000000000aa");
        assert_eq!(parsed.from.as_deref(), Some("0x00000000000000000000000000000000000000bb"));
        assert_eq!(parsed.tag.as_deref(), Some(TAG));
        assert_eq!(parsed.timestamp_ms, 5);
    }

    #[test]
    fn native_transfer_without_tag() {
        let parsed = parse_transaction(&tx(MERCHANT, 1, vec![]), &watch(), 0).expect("transfer");
        assert_eq!(parsed.tag, None);
    }

    #[test]
    fn unwatched_or_empty_native_transfers_are_skipped() {
        assert!(parse_transaction(&tx(PAYER, 1_000, vec![]), &watch(), 0).is_none());
        assert!(parse_transaction(&tx(MERCHANT, 0, vec![]), &watch(), 0).is_none());
        let mut creation = tx(MERCHANT, 1, vec![]);
        creation.to = None;
        assert!(parse_transaction(&creation, &watch(), 0).is_none());
    }

    #[test]
    fn token_transfer_with_trailing_raw_tag() {
        let raw_tag = hex::decode(TAG).unwrap();
        let input = transfer_input(MERCHANT, 2_500_000, &raw_tag);
        let parsed = parse_transaction(&tx(USDT, 0, input), &watch(), 0).expect("transfer");
        assert_eq!(parsed.token_id, 2);
        assert_eq!(parsed.value, 2_500_000);
        assert_eq!(parsed.to, "0x00000000000000000000000000000000000000aa");
        assert_eq!(parsed.tag.as_deref(), Some(TAG));
    }

    #[test]
    fn token_transfer_to_other_recipient_is_skipped() {
        let input = transfer_input(PAYER, 10, &[]);
        assert!(parse_transaction(&tx(USDT, 0, input), &watch(), 0).is_none());
    }

    #[test]
    fn other_token_calls_are_skipped() {
        // approve(address,uint256)
        let mut input = transfer_input(MERCHANT, 10, &[]);
        input[..4].copy_from_slice(&[0x09, 0x5e, 0xa7, 0xb3]);
        assert!(parse_transaction(&tx(USDT, 0, input), &watch(), 0).is_none());
        assert!(parse_transaction(&tx(USDT, 0, vec![0xa9, 0x05]), &watch(), 0).is_none());
    }

    #[test]
    fn config_addresses_are_parsed() {
        let cfg: EvmConfig = serde_json::from_value(serde_json::json!({
            "common": {
                "name": "ethereum",
                "http_rpc_url": "http://localhost:8545",
                "chain_id": 1,
                "block_time_ms": 12000,
                "recipients": ["0x00000000000000000000000000000000000000AA"],
                "native_token_id": 1
            },
            "tokens": [{ "token_id": 2, "contract": "0xdAC17F958D2ee523a2206206994597C13D831ec7" }]
        }))
        .unwrap();
        let watch = WatchList::from_config(&cfg).unwrap();
        assert!(watch.is_recipient(&MERCHANT));
        assert_eq!(watch.tokens.get(&USDT), Some(&2));
    }
}
