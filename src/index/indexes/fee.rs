use super::*;

const PREFIX: u8 = 0x05;

/// Big-endian height so that a scan visits fee records in height order.
fn key(height: u32) -> Vec<u8> {
  let mut key = Vec::with_capacity(5);
  key.push(PREFIX);
  key.extend(height.to_be_bytes());
  key
}

fn parse(key: &[u8]) -> Result<u32> {
  ensure!(key.len() == 5, CorruptSnafu { what: "fee key" });
  Ok(u32::from_be_bytes(key[1..5].try_into().unwrap()))
}

/// Nearest-rank quartiles of an ascending-sorted rate list.
fn quartiles(sorted: &[u64]) -> FeeBox {
  if sorted.is_empty() {
    return FeeBox::default();
  }

  let quarter = sorted.len() / 4;
  let midpoint = sorted.len() / 2;

  FeeBox {
    q1: sorted[quarter],
    median: sorted[midpoint],
    q3: sorted[midpoint + quarter],
  }
}

/// Per-block fee-rate distributions. Second-order: connecting a block reads
/// its inputs' values back out of the txo index, so this index only takes a
/// block the txo index has already committed, and its tip can never pass the
/// txo tip.
pub(crate) struct FeeIndex;

impl FeeIndex {
  pub(crate) fn latest_fees_for(&self, store: &dyn Store, n: usize) -> Result<Vec<FeeSnapshot>> {
    let Some(tip) = self.tip(store)? else {
      return Ok(Vec::new());
    };

    if n == 0 {
      return Ok(Vec::new());
    }

    let start = tip.height.saturating_sub(u32::try_from(n).unwrap_or(u32::MAX) - 1);

    let mut snapshots = Vec::new();
    let mut parse_error = None;

    store.scan(
      &key(start),
      &key(tip.height.saturating_add(1)),
      &mut |key, value| {
        match parse(key).and_then(|height| {
          let fee = FeeValue::load(value)?;
          Ok(FeeSnapshot {
            height,
            fees: fee.fees,
            size: fee.size,
          })
        }) {
          Ok(snapshot) => {
            snapshots.push(snapshot);
            snapshots.len() < n
          }
          Err(err) => {
            parse_error = Some(err);
            false
          }
        }
      },
    )?;

    if let Some(err) = parse_error {
      return Err(err);
    }

    Ok(snapshots)
  }
}

impl BlockIndex for FeeIndex {
  fn prefix(&self) -> u8 {
    PREFIX
  }

  fn connect(&self, store: &dyn Store, batch: &mut Batch, block: &BlockData) -> Result {
    let mut rates = Vec::with_capacity(block.txdata.len());

    for (tx, _txid) in &block.txdata {
      if tx.is_coinbase() {
        rates.push(0);
        continue;
      }

      let mut consumed = 0u64;

      for input in &tx.input {
        let previous = input.previous_output;

        let txo = TxoIndex
          .get(store, previous.txid, previous.vout)?
          .context(MissingTxoSnafu {
            txid: previous.txid,
            vout: previous.vout,
          })?;

        consumed += txo.value;
      }

      let produced = tx
        .output
        .iter()
        .map(|output| output.value.to_sat())
        .sum::<u64>();

      let fee = consumed.saturating_sub(produced);

      rates.push(fee / u64::try_from(tx.vsize()).unwrap());
    }

    rates.sort_unstable();

    batch.put(
      key(block.height),
      FeeValue {
        fees: quartiles(&rates),
        size: block.stripped_size,
      }
      .store(),
    );

    advance_tip(batch, PREFIX, block);

    Ok(())
  }

  fn disconnect(&self, batch: &mut Batch, block: &BlockData) -> Result {
    batch.delete(key(block.height));
    rewind_tip(batch, PREFIX, block);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quartiles_of_empty_list_are_zero() {
    assert_eq!(quartiles(&[]), FeeBox::default());
  }

  #[test]
  fn quartiles_of_single_rate_repeat_it() {
    assert_eq!(
      quartiles(&[7]),
      FeeBox {
        q1: 7,
        median: 7,
        q3: 7,
      },
    );
  }

  #[test]
  fn quartiles_use_nearest_rank() {
    assert_eq!(
      quartiles(&[10, 20, 30, 40, 50]),
      FeeBox {
        q1: 20,
        median: 30,
        q3: 40,
      },
    );
  }
}
