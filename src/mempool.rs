use super::*;

#[derive(Default)]
struct Maps {
  scripts: HashMap<ScriptId, Vec<(Txid, u32)>>,
  spents: HashMap<(Txid, u32), Vec<Spend>>,
  txos: HashMap<(Txid, u32), TxoValue>,
}

/// Shadow index over the node's mempool, mirroring the confirmed indexes'
/// shapes: outputs by script, spends by consumed outpoint, and output values
/// by outpoint. Rebuilt wholesale after every successful resync rather than
/// maintained incrementally through confirmations and evictions.
pub(crate) struct Mempool {
  maps: Mutex<Maps>,
}

impl Mempool {
  pub(crate) fn new() -> Self {
    Self {
      maps: Mutex::new(Maps::default()),
    }
  }

  /// Fetches and shadow-indexes one unconfirmed transaction. A transaction
  /// the source no longer knows was evicted between announcement and fetch
  /// and is dropped without error.
  pub(crate) fn add(&self, index: &Index, txid: Txid) -> Result {
    let Some(tx) = index.source.transaction(txid)? else {
      log::debug!("{txid} left the mempool before it could be fetched");
      return Ok(());
    };

    {
      let mut maps = self.maps.lock().unwrap();

      for (vin, input) in tx.input.iter().enumerate() {
        if input.previous_output.is_null() {
          continue;
        }

        maps
          .spents
          .entry((input.previous_output.txid, input.previous_output.vout))
          .or_default()
          .push(Spend {
            txid,
            vin: u32::try_from(vin).unwrap(),
          });
      }

      for (vout, output) in tx.output.iter().enumerate() {
        let vout = u32::try_from(vout).unwrap();
        let script_id = ScriptId::from_script(&output.script_pubkey);

        maps.scripts.entry(script_id).or_default().push((txid, vout));

        maps.txos.insert(
          (txid, vout),
          TxoValue {
            value: output.value.to_sat(),
            script: output.script_pubkey.clone(),
          },
        );
      }
    }

    if index.event_sender.is_some() {
      let raw = consensus::serialize(&tx);

      for output in &tx.output {
        index.emit(Event::ScriptTouched {
          script_id: ScriptId::from_script(&output.script_pubkey),
          txid,
          raw: raw.clone(),
          height: None,
        });
      }

      index.emit(Event::TransactionSeen {
        txid,
        raw,
        confirming: None,
      });
    }

    Ok(())
  }

  /// Discards the shadow and rebuilds it from the source's current mempool.
  pub(crate) fn reset(&self, index: &Index) -> Result {
    *self.maps.lock().unwrap() = Maps::default();

    let txids = index.source.mempool_tx_ids()?;

    log::debug!("mempool reset; shadowing {} transactions", txids.len());

    for txid in txids {
      self.add(index, txid)?;
    }

    Ok(())
  }

  pub(crate) fn known_script(&self, script_id: ScriptId) -> bool {
    self.maps.lock().unwrap().scripts.contains_key(&script_id)
  }

  pub(crate) fn txos_by_script(&self, script_id: ScriptId) -> Vec<(Txid, u32)> {
    self
      .maps
      .lock()
      .unwrap()
      .scripts
      .get(&script_id)
      .cloned()
      .unwrap_or_default()
  }

  pub(crate) fn txo(&self, txid: Txid, vout: u32) -> Option<TxoValue> {
    self.maps.lock().unwrap().txos.get(&(txid, vout)).cloned()
  }

  pub(crate) fn spents_from(&self, txid: Txid, vout: u32) -> Vec<Spend> {
    self
      .maps
      .lock()
      .unwrap()
      .spents
      .get(&(txid, vout))
      .cloned()
      .unwrap_or_default()
  }
}
