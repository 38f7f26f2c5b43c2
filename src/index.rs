use super::*;

pub mod entry;
pub mod event;
pub(crate) mod indexes;
pub(crate) mod updater;

/// A script and the half-open confirmation-height range to query it over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRange {
  pub script_id: ScriptId,
  pub height_range: Range<u32>,
}

/// A transaction output as queries return it. `height` is `None` while the
/// output is only known from the mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Txo {
  pub txid: Txid,
  pub vout: u32,
  pub height: Option<u32>,
  pub value: u64,
}

/// One block's fee-rate distribution and stripped size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSnapshot {
  pub height: u32,
  pub fees: FeeBox,
  pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
  pub chain: ChainTip,
  pub script: Option<Tip>,
  pub spent: Option<Tip>,
  pub tx: Option<Tip>,
  pub txo: Option<Tip>,
  pub fee: Option<Tip>,
}

pub struct Index {
  pub(crate) event_sender: Option<mpsc::Sender<Event>>,
  pub(crate) height_limit: Option<u32>,
  pub(crate) indexes: Indexes,
  pub(crate) mempool: Mempool,
  pub(crate) source: Box<dyn ChainSource>,
  pub(crate) store: Box<dyn Store>,
  sync_lock: Mutex<()>,
  syncing: AtomicBool,
}

impl Index {
  pub fn open(options: &Options) -> Result<Self> {
    let data_dir = options.data_dir();
    fs::create_dir_all(&data_dir).context(IoSnafu)?;

    let store = LevelDb::open(&data_dir.join("db"))?;
    let source = CoreClient::new(&options.rpc_url(), options.auth())?;

    Ok(Self {
      height_limit: options.height_limit,
      ..Self::new(Box::new(store), Box::new(source), None)
    })
  }

  pub fn new(
    store: Box<dyn Store>,
    source: Box<dyn ChainSource>,
    event_sender: Option<mpsc::Sender<Event>>,
  ) -> Self {
    Self {
      event_sender,
      height_limit: None,
      indexes: Indexes::new(),
      mempool: Mempool::new(),
      source,
      store,
      sync_lock: Mutex::new(()),
      syncing: AtomicBool::new(false),
    }
  }

  pub(crate) fn emit(&self, event: Event) {
    if let Some(sender) = &self.event_sender
      && sender.send(event).is_err()
    {
      log::debug!("event receiver disconnected");
    }
  }

  /// Reconciles every index with the chain source's active chain, then
  /// rebuilds the mempool shadow. At most one resync runs at a time; a call
  /// arriving while one is in flight coalesces into it and returns `false`.
  pub fn try_resync(&self) -> Result<bool> {
    let Ok(_guard) = self.sync_lock.try_lock() else {
      log::debug!("resync already in flight; coalescing");
      return Ok(false);
    };

    self.syncing.store(true, atomic::Ordering::SeqCst);
    let outcome = Updater::new(self).resync();
    self.syncing.store(false, atomic::Ordering::SeqCst);

    outcome?;

    self.mempool.reset(self)?;

    Ok(true)
  }

  /// Records a newly announced unconfirmed transaction in the mempool
  /// shadow. Announcements arriving while a resync is rebuilding the shadow
  /// are dropped; the reset that ends the resync re-reads the node's mempool
  /// wholesale, so nothing is lost.
  pub fn see(&self, txid: Txid) -> Result {
    if self.syncing.load(atomic::Ordering::SeqCst) {
      log::debug!("resync in flight; skipping mempool add of {txid}");
      return Ok(());
    }

    self.mempool.add(self, txid)
  }

  /// The lowest tip across all indexes, or `None` until every index has
  /// connected at least one block.
  pub fn tip(&self) -> Result<Option<Tip>> {
    let mut lowest: Option<Tip> = None;

    for index in self.indexes.all() {
      let Some(tip) = index.tip(self.store.as_ref())? else {
        return Ok(None);
      };

      if lowest.is_none_or(|lowest| tip.height < lowest.height) {
        lowest = Some(tip);
      }
    }

    Ok(lowest)
  }

  pub fn tip_height(&self) -> Result<Option<u32>> {
    Ok(self.tip()?.map(|tip| tip.height))
  }

  pub fn status(&self) -> Result<Status> {
    let store = self.store.as_ref();

    Ok(Status {
      chain: self.source.tip()?,
      script: self.indexes.script.tip(store)?,
      spent: self.indexes.spent.tip(store)?,
      tx: self.indexes.tx.tip(store)?,
      txo: self.indexes.txo.tip(store)?,
      fee: self.indexes.fee.tip(store)?,
    })
  }

  /// The id of the active-chain block that confirmed `txid`, or `None` for
  /// unconfirmed or unknown transactions.
  pub fn block_id_by_transaction_id(&self, txid: Txid) -> Result<Option<BlockHash>> {
    match self.indexes.tx.height_by(self.store.as_ref(), txid)? {
      Some(height) => self.source.block_id_at_height(height),
      None => Ok(None),
    }
  }

  /// Whether any output paying `script_id` has ever been indexed or is
  /// currently in the mempool shadow.
  pub fn seen_script_id(&self, script_id: ScriptId) -> Result<bool> {
    Ok(
      self.indexes.script.seen(self.store.as_ref(), script_id)?
        || self.mempool.known_script(script_id),
    )
  }

  pub fn latest_fees_for_n_blocks(&self, n: usize) -> Result<Vec<FeeSnapshot>> {
    self.indexes.fee.latest_fees_for(self.store.as_ref(), n)
  }

  pub fn txo_by_txo(&self, txid: Txid, vout: u32) -> Result<Option<TxoValue>> {
    if let Some(txo) = self.indexes.txo.get(self.store.as_ref(), txid, vout)? {
      return Ok(Some(txo));
    }

    Ok(self.mempool.txo(txid, vout))
  }

  /// Spends of `txid:vout`. A confirmed spend is authoritative and returned
  /// alone; otherwise every unconfirmed spend is returned, and more than one
  /// means the mempool currently holds conflicting transactions.
  pub fn spents_from_txo(&self, txid: Txid, vout: u32) -> Result<Vec<Spend>> {
    if let Some(spend) = self.indexes.spent.get(self.store.as_ref(), txid, vout)? {
      return Ok(vec![spend]);
    }

    Ok(self.mempool.spents_from(txid, vout))
  }

  /// Outputs paying the script, confirmed within the height range, merged
  /// with unconfirmed outputs from the mempool shadow. Confirmed rows win
  /// when both sides know an output.
  pub fn txos_by_script_range(&self, range: &ScriptRange, max_rows: usize) -> Result<Vec<Txo>> {
    let store = self.store.as_ref();

    let mut rows = Vec::new();
    let mut seen = BTreeSet::new();

    for row in
      self
        .indexes
        .script
        .txos_by(store, range.script_id, &range.height_range, max_rows)?
    {
      let txo = self
        .indexes
        .txo
        .get(store, row.txid, row.vout)?
        .context(MissingTxoSnafu {
          txid: row.txid,
          vout: row.vout,
        })?;

      seen.insert((row.txid, row.vout));
      rows.push(Txo {
        txid: row.txid,
        vout: row.vout,
        height: Some(row.height),
        value: txo.value,
      });
    }

    for (txid, vout) in self.mempool.txos_by_script(range.script_id) {
      if !seen.insert((txid, vout)) {
        continue;
      }

      let value = self.mempool.txo(txid, vout).map(|txo| txo.value).unwrap_or_default();

      rows.push(Txo {
        txid,
        vout,
        height: None,
        value,
      });
    }

    Ok(rows)
  }

  /// `txos_by_script_range` narrowed to outputs that are still unspent for
  /// the purposes of the queried range: a confirmed spend only disqualifies
  /// an output when it confirmed below the range's upper bound, while an
  /// unconfirmed spend always does.
  pub fn utxos_by_script_range(&self, range: &ScriptRange, max_rows: usize) -> Result<Vec<Txo>> {
    let mut unspent = Vec::new();

    for txo in self.txos_by_script_range(range, max_rows)? {
      if self.spent_within_bound(txo.txid, txo.vout, range.height_range.end)? {
        continue;
      }

      unspent.push(txo);
    }

    Ok(unspent)
  }

  fn spent_within_bound(&self, txid: Txid, vout: u32, upper: u32) -> Result<bool> {
    let store = self.store.as_ref();

    if let Some(spend) = self.indexes.spent.get(store, txid, vout)? {
      return Ok(match self.indexes.tx.height_by(store, spend.txid)? {
        Some(height) => height < upper,
        None => true,
      });
    }

    Ok(!self.mempool.spents_from(txid, vout).is_empty())
  }

  /// Every transaction id that touched the script in the range: the
  /// transactions that produced its outputs plus the transactions, confirmed
  /// or unconfirmed, that spent them.
  pub fn transaction_ids_by_script_range(
    &self,
    range: &ScriptRange,
    max_rows: usize,
  ) -> Result<Vec<Txid>> {
    let mut ids = BTreeSet::new();

    for txo in self.txos_by_script_range(range, max_rows)? {
      ids.insert(txo.txid);

      if let Some(spend) = self.indexes.spent.get(self.store.as_ref(), txo.txid, txo.vout)? {
        ids.insert(spend.txid);
      } else {
        for spend in self.mempool.spents_from(txo.txid, txo.vout) {
          ids.insert(spend.txid);
        }
      }
    }

    Ok(ids.into_iter().collect())
  }
}
