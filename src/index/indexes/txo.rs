use super::*;

const PREFIX: u8 = 0x04;

fn key(txid: Txid, vout: u32) -> Vec<u8> {
  let mut key = Vec::with_capacity(37);
  key.push(PREFIX);
  key.extend(txid.to_byte_array());
  key.extend(vout.to_le_bytes());
  key
}

/// Every confirmed output's value and script, keyed by outpoint. The fee
/// index resolves transaction inputs through this index, and queries join
/// script-index rows against it for values.
pub(crate) struct TxoIndex;

impl TxoIndex {
  pub(crate) fn get(&self, store: &dyn Store, txid: Txid, vout: u32) -> Result<Option<TxoValue>> {
    store
      .get(&key(txid, vout))?
      .map(|bytes| TxoValue::load(&bytes))
      .transpose()
  }
}

impl BlockIndex for TxoIndex {
  fn prefix(&self) -> u8 {
    PREFIX
  }

  fn connect(&self, _store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, txid) in &block.txdata {
      for (vout, output) in tx.output.iter().enumerate() {
        batch.put(
          key(*txid, u32::try_from(vout).unwrap()),
          TxoValue {
            value: output.value.to_sat(),
            script: output.script_pubkey.clone(),
          }
          .store(),
        );
      }
    }

    advance_tip(batch, PREFIX, block);

    Ok(())
  }

  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, txid) in &block.txdata {
      for (vout, _output) in tx.output.iter().enumerate() {
        batch.delete(key(*txid, u32::try_from(vout).unwrap()));
      }
    }

    rewind_tip(batch, PREFIX, block);

    Ok(())
  }
}
