use std::collections::{BTreeMap, HashSet};

use generic_indexer::{decode_tag, Transfer};
use tracing::warn;

use crate::types::UtxoTransaction;

const OP_RETURN: u8 = 0x6a;
const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

/// Data pushes of an `OP_RETURN` script, or `None` for any other script.
pub fn op_return_pushes(script: &[u8]) -> Option<Vec<Vec<u8>>> {
    let (&first, mut rest) = script.split_first()?;
    if first != OP_RETURN {
        return None;
    }

    let mut pushes = Vec::new();
    while let Some((&opcode, tail)) = rest.split_first() {
        let (len, tail) = match opcode {
            0x01..=0x4b => (opcode as usize, tail),
            OP_PUSHDATA1 => {
                let (&len, tail) = tail.split_first()?;
                (len as usize, tail)
            }
            OP_PUSHDATA2 => {
                if tail.len() < 2 {
                    return None;
                }
                (u16::from_le_bytes([tail[0], tail[1]]) as usize, &tail[2..])
            }
            OP_PUSHDATA4 => {
                if tail.len() < 4 {
                    return None;
                }
                let len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]);
                (len as usize, &tail[4..])
            }
            // Non-push opcodes carry no data.
            _ => (0, tail),
        };
        if tail.len() < len {
            return None;
        }
        if len > 0 {
            pushes.push(tail[..len].to_vec());
        }
        rest = &tail[len..];
    }
    Some(pushes)
}

/// First order id found in the transaction's `OP_RETURN` outputs.
pub fn find_tag(tx: &UtxoTransaction) -> Option<String> {
    tx.vout.iter().find_map(|output| {
        let script = hex::decode(&output.script_pub_key.hex).ok()?;
        op_return_pushes(&script)?
            .iter()
            .find_map(|push| decode_tag(push))
    })
}

/// One transfer per watched recipient, summing every output it receives.
pub fn parse_transaction(
    tx: &UtxoTransaction,
    recipients: &HashSet<String>,
    token_id: i64,
    timestamp_ms: i64,
) -> Vec<Transfer> {
    if tx.is_coinbase() {
        return Vec::new();
    }

    let mut received: BTreeMap<&str, u128> = BTreeMap::new();
    for output in &tx.vout {
        let Some(address) = output.script_pub_key.address() else {
            continue;
        };
        if !recipients.contains(address) {
            continue;
        }
        let total = received.entry(address).or_default();
        match total.checked_add(output.value.0) {
            Some(sum) => *total = sum,
            None => warn!("Skipping output {}:{}, amount overflows", tx.txid, output.n),
        }
    }
    if received.is_empty() {
        return Vec::new();
    }

    let tag = find_tag(tx);
    let sender = tx
        .vin
        .first()
        .and_then(|input| input.prevout.as_ref())
        .and_then(|prevout| prevout.script_pub_key.address())
        .map(str::to_string);

    received
        .into_iter()
        .filter(|(_, value)| *value > 0)
        .map(|(address, value)| Transfer {
            tx_hash: tx.txid.clone(),
            from: sender.clone(),
            to: address.to_string(),
            token_id,
            value,
            tag: tag.clone(),
            timestamp_ms,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    const TAG: &str = "5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c5f2b1c0e9d8a7b6c";
    const MERCHANT: &str = "bc1qmerchant";

    fn recipients() -> HashSet<String> {
        [MERCHANT.to_string()].into_iter().collect()
    }

    fn op_return_hex(payload: &[u8]) -> String {
        let mut script = vec![OP_RETURN];
        if payload.len() <= 0x4b {
            script.push(payload.len() as u8);
        } else {
            script.push(OP_PUSHDATA1);
            script.push(payload.len() as u8);
        }
        script.extend_from_slice(payload);
        hex::encode(script)
    }

    fn tx(vout: serde_json::Value, vin: serde_json::Value) -> UtxoTransaction {
        let text = json!({ "txid": "ab".repeat(32), "vin": vin, "vout": vout }).to_string();
        serde_json::from_str(&text).unwrap()
    }

    fn spend() -> serde_json::Value {
        json!([{ "txid": "cd".repeat(32), "vout": 0 }])
    }

    #[test]
    fn op_return_push_forms() {
        let raw = hex::decode(TAG).unwrap();
        let script = hex::decode(op_return_hex(&raw)).unwrap();
        assert_eq!(op_return_pushes(&script), Some(vec![raw]));

        let ascii = TAG.as_bytes().to_vec();
        let script = hex::decode(op_return_hex(&ascii)).unwrap();
        assert_eq!(op_return_pushes(&script), Some(vec![ascii]));

        // Truncated push.
        assert_eq!(op_return_pushes(&[OP_RETURN, 0x05, 0x01]), None);
        // Not an OP_RETURN script.
        assert_eq!(op_return_pushes(&[0x76, 0xa9]), None);
    }

    #[test]
    fn tagged_payment_aggregates_outputs() {
        let tx = tx(
            json!([
                { "value": 0.001, "n": 0, "scriptPubKey": { "hex": "0014aa", "address": MERCHANT } },
                { "value": 0.0005, "n": 1, "scriptPubKey": { "hex": "0014aa", "addresses": [MERCHANT] } },
                { "value": 0.0, "n": 2, "scriptPubKey": { "hex": op_return_hex(&hex::decode(TAG).unwrap()) } },
                { "value": 5.0, "n": 3, "scriptPubKey": { "hex": "0014bb", "address": "bc1qchange" } }
            ]),
            spend(),
        );

        let transfers = parse_transaction(&tx, &recipients(), 10, 1_000);
        assert_eq!(transfers.len(), 1);
        let t = &transfers[0];
        assert_eq!(t.to, MERCHANT);
        assert_eq!(t.value, 150_000);
        assert_eq!(t.token_id, 10);
        assert_eq!(t.tag.as_deref(), Some(TAG));
        assert_eq!(t.from, None);
    }

    #[test]
    fn sender_comes_from_prevout() {
        let tx = tx(
            json!([{ "value": 1.0, "n": 0, "scriptPubKey": { "hex": "", "address": MERCHANT } }]),
            json!([{ "txid": "cd".repeat(32), "vout": 1, "prevout": {
                "value": 2.0, "scriptPubKey": { "hex": "", "address": "bc1qpayer" }
            }}]),
        );
        let transfers = parse_transaction(&tx, &recipients(), 10, 0);
        assert_eq!(transfers[0].from.as_deref(), Some("bc1qpayer"));
        assert_eq!(transfers[0].tag, None);
    }

    #[test]
    fn coinbase_and_unwatched_are_skipped() {
        let coinbase = tx(
            json!([{ "value": 6.25, "n": 0, "scriptPubKey": { "hex": "", "address": MERCHANT } }]),
            json!([{ "coinbase": "03abcdef" }]),
        );
        assert!(parse_transaction(&coinbase, &recipients(), 10, 0).is_empty());

        let unrelated = tx(
            json!([{ "value": 1.0, "n": 0, "scriptPubKey": { "hex": "", "address": "bc1qother" } }]),
            spend(),
        );
        assert!(parse_transaction(&unrelated, &recipients(), 10, 0).is_empty());
    }
}
