use std::collections::{BTreeMap, HashSet};

use common::config::CkbConfig;
use generic_indexer::{decode_tag, ChainBlock, ScanError, Transfer};

use crate::types::{parse_hex_bytes, parse_hex_u64, CellOutput, CkbBlock, CkbTransaction, Script};

/// UDT cell data starts with the amount as a little-endian u128.
const UDT_AMOUNT_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdtType {
    pub token_id: i64,
    pub code_hash: String,
    pub args: String,
}

/// Lock script family and lock args of the watched recipients, plus the
/// accepted UDT type scripts.
#[derive(Debug, Clone)]
pub struct WatchList {
    lock_code_hash: String,
    recipients: HashSet<String>,
    udts: Vec<UdtType>,
    native_token_id: i64,
}

impl WatchList {
    pub fn new(
        lock_code_hash: &str,
        recipients: impl IntoIterator<Item = String>,
        udts: Vec<UdtType>,
        native_token_id: i64,
    ) -> Self {
        Self {
            lock_code_hash: lock_code_hash.to_ascii_lowercase(),
            recipients: recipients
                .into_iter()
                .map(|r| r.to_ascii_lowercase())
                .collect(),
            udts: udts
                .into_iter()
                .map(|u| UdtType {
                    token_id: u.token_id,
                    code_hash: u.code_hash.to_ascii_lowercase(),
                    args: u.args.to_ascii_lowercase(),
                })
                .collect(),
            native_token_id,
        }
    }

    pub fn from_config(cfg: &CkbConfig) -> Self {
        Self::new(
            &cfg.lock_code_hash,
            cfg.common.recipients.iter().cloned(),
            cfg.udts
                .iter()
                .map(|u| UdtType {
                    token_id: u.token_id,
                    code_hash: u.type_code_hash.clone(),
                    args: u.type_args.clone(),
                })
                .collect(),
            cfg.common.native_token_id,
        )
    }

    fn recipient(&self, lock: &Script) -> Option<String> {
        if !lock.code_hash.eq_ignore_ascii_case(&self.lock_code_hash) {
            return None;
        }
        let args = lock.args.to_ascii_lowercase();
        self.recipients.contains(&args).then_some(args)
    }

    fn udt(&self, type_script: &Script) -> Option<&UdtType> {
        self.udts.iter().find(|u| {
            type_script.code_hash.eq_ignore_ascii_case(&u.code_hash)
                && type_script.args.eq_ignore_ascii_case(&u.args)
        })
    }
}

pub fn parse_block(number: u64, block: CkbBlock, watch: &WatchList) -> Result<ChainBlock, ScanError> {
    let header = block.header;
    let header_number = parse_hex_u64(&header.number)
        .ok_or_else(|| ScanError::decode(format!("bad block number {}", header.number)))?;
    if header_number != number {
        return Err(ScanError::decode(format!(
            "asked for block {} but node returned {}",
            number, header_number
        )));
    }
    let timestamp_ms = parse_hex_u64(&header.timestamp)
        .ok_or_else(|| ScanError::decode(format!("bad timestamp {}", header.timestamp)))?
        as i64;

    let mut transfers = Vec::new();
    // The first transaction is the cellbase.
    for tx in block.transactions.iter().skip(1) {
        transfers.extend(parse_transaction(tx, watch, timestamp_ms)?);
    }

    Ok(ChainBlock {
        number,
        hash: header.hash,
        parent_hash: header.parent_hash,
        timestamp_ms,
        transfers,
    })
}

/// One transfer per watched recipient and token, summing every cell of the
/// transaction. The tag comes from the first tagged cell.
pub fn parse_transaction(
    tx: &CkbTransaction,
    watch: &WatchList,
    timestamp_ms: i64,
) -> Result<Vec<Transfer>, ScanError> {
    let mut received: BTreeMap<(String, i64), (u128, Option<String>)> = BTreeMap::new();
    for (index, output) in tx.outputs.iter().enumerate() {
        let Some(to) = watch.recipient(&output.lock) else {
            continue;
        };
        let data = tx
            .outputs_data
            .get(index)
            .and_then(|d| parse_hex_bytes(d))
            .ok_or_else(|| ScanError::decode(format!("tx {} output {} has no data", tx.hash, index)))?;

        let Some((token_id, value, tag)) = parse_output(tx, output, &data, watch)? else {
            continue;
        };
        let (total, first_tag) = received.entry((to, token_id)).or_default();
        *total = total.checked_add(value).ok_or_else(|| {
            ScanError::decode(format!("tx {}: amount overflow on output {}", tx.hash, index))
        })?;
        if first_tag.is_none() {
            *first_tag = tag;
        }
    }

    Ok(received
        .into_iter()
        .filter(|(_, (value, _))| *value > 0)
        .map(|((to, token_id), (value, tag))| Transfer {
            tx_hash: tx.hash.clone(),
            from: None,
            to,
            token_id,
            value,
            tag,
            timestamp_ms,
        })
        .collect())
}

/// Token, amount and tag carried by one watched cell, or `None` for cells of
/// unknown types.
fn parse_output(
    tx: &CkbTransaction,
    output: &CellOutput,
    data: &[u8],
    watch: &WatchList,
) -> Result<Option<(i64, u128, Option<String>)>, ScanError> {
    match &output.type_ {
        None => {
            let capacity = parse_hex_u64(&output.capacity).ok_or_else(|| {
                ScanError::decode(format!("tx {}: bad capacity {}", tx.hash, output.capacity))
            })?;
            Ok(Some((watch.native_token_id, capacity as u128, decode_tag(data))))
        }
        Some(type_script) => {
            let Some(udt) = watch.udt(type_script) else {
                return Ok(None);
            };
            if data.len() < UDT_AMOUNT_LEN {
                return Ok(None);
            }
            let mut amount = [0u8; UDT_AMOUNT_LEN];
            amount.copy_from_slice(&data[..UDT_AMOUNT_LEN]);
            Ok(Some((
                udt.token_id,
                u128::from_le_bytes(amount),
                decode_tag(&data[UDT_AMOUNT_LEN..]),
            )))
        }
    }
}
