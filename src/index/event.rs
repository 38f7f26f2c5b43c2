use super::*;

/// Fire-and-forget notifications for downstream consumers. `confirming` and
/// `height` are `None` when the subject is only known from the mempool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  BlockConnected {
    block_id: BlockHash,
    height: u32,
  },
  ScriptTouched {
    script_id: ScriptId,
    txid: Txid,
    raw: Vec<u8>,
    height: Option<u32>,
  },
  TransactionSeen {
    txid: Txid,
    raw: Vec<u8>,
    confirming: Option<BlockHash>,
  },
}
