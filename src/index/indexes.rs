use super::*;

pub(crate) use self::{
  fee::FeeIndex, script::ScriptIndex, spent::SpentIndex, tx::TxIndex, txo::TxoIndex,
};

mod fee;
mod script;
mod spent;
mod tx;
mod txo;

/// Tip records live under the index's data prefix with the high bit set, so
/// a prefix scan over data records can never collide with a tip.
const TIP_BIT: u8 = 0x80;

/// One derived index over the chain. Each index owns a data-key prefix,
/// persists its own tip, and connects or disconnects one block at a time
/// into a caller-provided batch, which the caller commits atomically.
pub(crate) trait BlockIndex {
  fn prefix(&self) -> u8;

  fn connect(&self, store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result;

  /// Removes exactly the records added by the most recent `connect` of
  /// `block` and rewinds the tip to the block's parent.
  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result;

  fn tip(&self, store: &dyn Store) -> Result<Option<Tip>> {
    store
      .get(&[self.prefix() | TIP_BIT])?
      .map(|bytes| Tip::load(&bytes))
      .transpose()
  }
}

pub(crate) fn advance_tip(batch: &mut Batch, prefix: u8, block: &BlockData) {
  batch.put(
    vec![prefix | TIP_BIT],
    Tip {
      block_id: block.id,
      height: block.height,
    }
    .store(),
  );
}

pub(crate) fn rewind_tip(batch: &mut Batch, prefix: u8, block: &BlockData) {
  if block.height == 0 {
    // Disconnecting the genesis block returns the index to its
    // pre-bootstrap, tipless state.
    batch.delete(vec![prefix | TIP_BIT]);
  } else {
    batch.put(
      vec![prefix | TIP_BIT],
      Tip {
        block_id: block.prev,
        height: block.height - 1,
      }
      .store(),
    );
  }
}

pub(crate) struct Indexes {
  pub(crate) fee: FeeIndex,
  pub(crate) script: ScriptIndex,
  pub(crate) spent: SpentIndex,
  pub(crate) tx: TxIndex,
  pub(crate) txo: TxoIndex,
}

impl Indexes {
  pub(crate) fn new() -> Self {
    Self {
      fee: FeeIndex,
      script: ScriptIndex,
      spent: SpentIndex,
      tx: TxIndex,
      txo: TxoIndex,
    }
  }

  pub(crate) fn all(&self) -> [&dyn BlockIndex; 5] {
    [&self.script, &self.spent, &self.tx, &self.txo, &self.fee]
  }

  /// The indexes that read nothing back out of the store while connecting.
  /// The fee index is excluded: it resolves input values through the txo
  /// index, so it connects in a second batch after these have committed.
  pub(crate) fn first_order(&self) -> [&dyn BlockIndex; 4] {
    [&self.script, &self.spent, &self.tx, &self.txo]
  }
}
