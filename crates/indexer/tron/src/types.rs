use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TronBlock {
    #[serde(rename = "blockID")]
    pub block_id: Option<String>,
    pub block_header: Option<BlockHeader>,
    #[serde(default)]
    pub transactions: Vec<TronTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub raw_data: BlockHeaderRaw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeaderRaw {
    #[serde(default)]
    pub number: u64,
    #[serde(rename = "parentHash", default)]
    pub parent_hash: String,
    #[serde(default)]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronTransaction {
    #[serde(rename = "txID")]
    pub tx_id: String,
    #[serde(default)]
    pub ret: Vec<TransactionResult>,
    pub raw_data: TransactionRaw,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionResult {
    #[serde(rename = "contractRet")]
    pub contract_ret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRaw {
    #[serde(default)]
    pub contract: Vec<Contract>,
    /// Hex-encoded memo.
    pub data: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Contract {
    #[serde(rename = "type")]
    pub kind: String,
    pub parameter: ContractParameter,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractParameter {
    pub value: Value,
}

/// `TransferContract` payload: a TRX transfer in sun.
#[derive(Debug, Clone, Deserialize)]
pub struct TransferContract {
    pub owner_address: String,
    pub to_address: String,
    pub amount: i64,
}

/// `TriggerSmartContract` payload: a contract call, TRC-20 transfers included.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerSmartContract {
    pub owner_address: String,
    pub contract_address: String,
    #[serde(default)]
    pub data: String,
}

impl TronTransaction {
    /// Missing results are reported by some nodes for plain transfers.
    pub fn succeeded(&self) -> bool {
        self.ret
            .iter()
            .all(|r| r.contract_ret.as_deref().map_or(true, |s| s == "SUCCESS"))
    }
}
