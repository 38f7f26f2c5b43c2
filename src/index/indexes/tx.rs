use super::*;

const PREFIX: u8 = 0x03;

fn key(txid: Txid) -> Vec<u8> {
  let mut key = Vec::with_capacity(33);
  key.push(PREFIX);
  key.extend(txid.to_byte_array());
  key
}

/// Confirmation height by transaction id.
pub(crate) struct TxIndex;

impl TxIndex {
  pub(crate) fn height_by(&self, store: &dyn Store, txid: Txid) -> Result<Option<u32>> {
    store
      .get(&key(txid))?
      .map(|bytes| u32::load(&bytes))
      .transpose()
  }
}

impl BlockIndex for TxIndex {
  fn prefix(&self) -> u8 {
    PREFIX
  }

  fn connect(&self, _store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result {
    for (_tx, txid) in &block.txdata {
      batch.put(key(*txid), block.height.store());
    }

    advance_tip(batch, PREFIX, block);

    Ok(())
  }

  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result {
    for (_tx, txid) in &block.txdata {
      batch.delete(key(*txid));
    }

    rewind_tip(batch, PREFIX, block);

    Ok(())
  }
}
