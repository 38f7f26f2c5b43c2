use super::*;

const PREFIX: u8 = 0x02;

fn key(txid: Txid, vout: u32) -> Vec<u8> {
  let mut key = Vec::with_capacity(37);
  key.push(PREFIX);
  key.extend(txid.to_byte_array());
  key.extend(vout.to_le_bytes());
  key
}

/// Which confirmed transaction consumed each output, keyed by the consumed
/// outpoint. At most one confirmed spend of an output can exist.
pub(crate) struct SpentIndex;

impl SpentIndex {
  pub(crate) fn get(&self, store: &dyn Store, txid: Txid, vout: u32) -> Result<Option<Spend>> {
    store
      .get(&key(txid, vout))?
      .map(|bytes| Spend::load(&bytes))
      .transpose()
  }
}

impl BlockIndex for SpentIndex {
  fn prefix(&self) -> u8 {
    PREFIX
  }

  fn connect(&self, _store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, txid) in &block.txdata {
      for (vin, input) in tx.input.iter().enumerate() {
        if input.previous_output.is_null() {
          continue;
        }

        batch.put(
          key(input.previous_output.txid, input.previous_output.vout),
          Spend {
            txid: *txid,
            vin: u32::try_from(vin).unwrap(),
          }
          .store(),
        );
      }
    }

    advance_tip(batch, PREFIX, block);

    Ok(())
  }

  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, _txid) in &block.txdata {
      for input in &tx.input {
        if input.previous_output.is_null() {
          continue;
        }

        batch.delete(key(input.previous_output.txid, input.previous_output.vout));
      }
    }

    rewind_tip(batch, PREFIX, block);

    Ok(())
  }
}
