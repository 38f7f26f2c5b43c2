use super::*;

const PREFIX: u8 = 0x01;

/// Key layout: prefix, script id, big-endian height, txid, vout. Height is
/// big-endian so that a scan over one script visits its outputs in
/// confirmation order, and so that a height range maps onto a key range.
fn key(script_id: ScriptId, height: u32, txid: Txid, vout: u32) -> Vec<u8> {
  let mut key = Vec::with_capacity(73);
  key.push(PREFIX);
  key.extend(script_id.to_byte_array());
  key.extend(height.to_be_bytes());
  key.extend(txid.to_byte_array());
  key.extend(vout.to_le_bytes());
  key
}

/// A confirmed output parsed back out of a script-index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScriptTxo {
  pub(crate) txid: Txid,
  pub(crate) vout: u32,
  pub(crate) height: u32,
}

fn parse(key: &[u8]) -> Result<ScriptTxo> {
  ensure!(key.len() == 73, CorruptSnafu { what: "script key" });

  Ok(ScriptTxo {
    height: u32::from_be_bytes(key[33..37].try_into().unwrap()),
    txid: Txid::from_byte_array(key[37..69].try_into().unwrap()),
    vout: u32::from_le_bytes(key[69..73].try_into().unwrap()),
  })
}

/// Which outputs pay which scripts, keyed for height-ranged scans. Records
/// are key-only.
pub(crate) struct ScriptIndex;

impl ScriptIndex {
  fn bounds(script_id: ScriptId, height_range: &Range<u32>) -> (Vec<u8>, Vec<u8>) {
    (
      key(script_id, height_range.start, Txid::all_zeros(), 0),
      key(script_id, height_range.end, Txid::all_zeros(), 0),
    )
  }

  pub(crate) fn seen(&self, store: &dyn Store, script_id: ScriptId) -> Result<bool> {
    let (lower, upper) = Self::bounds(script_id, &(0..u32::MAX));

    let mut seen = false;

    store.scan(&lower, &upper, &mut |_, _| {
      seen = true;
      false
    })?;

    Ok(seen)
  }

  pub(crate) fn txos_by(
    &self,
    store: &dyn Store,
    script_id: ScriptId,
    height_range: &Range<u32>,
    max_rows: usize,
  ) -> Result<Vec<ScriptTxo>> {
    if height_range.end <= height_range.start {
      return Ok(Vec::new());
    }

    // A range narrower than two blocks cannot be re-paged by splitting it,
    // so the row limit is not enforced for it.
    let enforce_limit = height_range.end - height_range.start >= 2;

    let (lower, upper) = Self::bounds(script_id, height_range);

    let mut rows = Vec::new();
    let mut parse_error = None;
    let mut exceeded = false;

    store.scan(&lower, &upper, &mut |key, _| {
      if enforce_limit && rows.len() == max_rows {
        exceeded = true;
        return false;
      }

      match parse(key) {
        Ok(row) => {
          rows.push(row);
          true
        }
        Err(err) => {
          parse_error = Some(err);
          false
        }
      }
    })?;

    if let Some(err) = parse_error {
      return Err(err);
    }

    ensure!(!exceeded, ExceededLimitSnafu { limit: max_rows });

    Ok(rows)
  }
}

impl BlockIndex for ScriptIndex {
  fn prefix(&self) -> u8 {
    PREFIX
  }

  fn connect(&self, _store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, txid) in &block.txdata {
      for (vout, output) in tx.output.iter().enumerate() {
        batch.put(
          key(
            ScriptId::from_script(&output.script_pubkey),
            block.height,
            *txid,
            u32::try_from(vout).unwrap(),
          ),
          Vec::new(),
        );
      }
    }

    advance_tip(batch, PREFIX, block);

    Ok(())
  }

  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result {
    for (tx, txid) in &block.txdata {
      for (vout, output) in tx.output.iter().enumerate() {
        batch.delete(key(
          ScriptId::from_script(&output.script_pubkey),
          block.height,
          *txid,
          u32::try_from(vout).unwrap(),
        ));
      }
    }

    rewind_tip(batch, PREFIX, block);

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_order_by_height() {
    let script_id = ScriptId::from_byte_array([0x22; 32]);
    let txid = Txid::all_zeros();

    let mut keys = vec![
      key(script_id, 70_000, txid, 0),
      key(script_id, 1, txid, 0),
      key(script_id, 256, txid, 0),
      key(script_id, 0, txid, 0),
    ];

    keys.sort();

    assert_eq!(
      keys
        .iter()
        .map(|key| parse(key).unwrap().height)
        .collect::<Vec<u32>>(),
      vec![0, 1, 256, 70_000],
    );
  }
}
