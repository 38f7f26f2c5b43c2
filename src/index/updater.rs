use {
  super::*,
  indicatif::{ProgressBar, ProgressStyle},
};

/// An index with no tip is catching up from scratch and takes every block
/// the walk hands it; otherwise the block must extend the index's tip
/// exactly.
fn is_due(tip: Option<Tip>, prev: Option<BlockHash>) -> bool {
  match tip {
    None => true,
    Some(tip) => Some(tip.block_id) == prev,
  }
}

/// Drives every index toward the chain source's active tip. All progress is
/// re-derived from the persisted per-index tips on every pass, so an aborted
/// or failed attempt can always be retried wholesale.
pub(crate) struct Updater<'index> {
  index: &'index Index,
}

impl<'index> Updater<'index> {
  pub(crate) fn new(index: &'index Index) -> Self {
    Self { index }
  }

  pub(crate) fn resync(&mut self) -> Result {
    loop {
      if shutting_down() {
        return Ok(());
      }

      let chain_tip = self.index.source.tip()?;

      let Some(indexed_tip) = self.index.tip()? else {
        log::info!("no indexed tip; bootstrapping from genesis");

        let genesis = self
          .index
          .source
          .block_id_at_height(0)?
          .context(HeightUnavailableSnafu { height: 0_u32 })?;

        return self.connect_from(None, genesis, 0, &chain_tip);
      };

      if indexed_tip.block_id == chain_tip.block_id {
        log::debug!(
          "caught up at {} height {}",
          indexed_tip.block_id,
          indexed_tip.height
        );
        return Ok(());
      }

      match self.index.source.header(indexed_tip.block_id)? {
        Some(header) if header.on_active_chain => {
          let Some(next) = header.next else {
            // The source claims a different tip but no successor to ours;
            // it regressed or is mid-reorg, so leave it for the next pass.
            log::debug!("no successor to {}; deferring", indexed_tip.block_id);
            return Ok(());
          };

          return self.connect_from(Some(indexed_tip.block_id), next, header.height + 1, &chain_tip);
        }
        _ => {
          log::info!(
            "fork: {} height {} left the active chain; rolling back",
            indexed_tip.block_id,
            indexed_tip.height,
          );

          self.disconnect(indexed_tip.block_id)?;
        }
      }
    }
  }

  /// Walks successor links from `block_id` to the end of the active chain,
  /// offering each block to every index.
  fn connect_from(
    &mut self,
    mut prev: Option<BlockHash>,
    mut block_id: BlockHash,
    mut height: u32,
    chain_tip: &ChainTip,
  ) -> Result {
    let progress_bar = if cfg!(test)
      || log::log_enabled!(log::Level::Info)
      || chain_tip.height <= height
    {
      None
    } else {
      let progress_bar = ProgressBar::new(chain_tip.height.into());
      progress_bar.set_position(height.into());
      progress_bar.set_style(
        ProgressStyle::with_template("[indexing blocks] {wide_bar} {pos}/{len}").unwrap(),
      );
      Some(progress_bar)
    };

    loop {
      if shutting_down() {
        break;
      }

      if let Some(limit) = self.index.height_limit
        && height >= limit
      {
        break;
      }

      let block = self
        .index
        .source
        .block(block_id)?
        .context(BlockUnavailableSnafu { block_id })?;

      ensure!(
        block.height == height,
        HeightMismatchSnafu {
          expected: height,
          actual: block.height,
        }
      );

      self.connect(prev, &block)?;

      if let Some(progress_bar) = &progress_bar {
        progress_bar.inc(1);
      }

      match block.next {
        Some(next) => {
          prev = Some(block_id);
          block_id = next;
          height += 1;
        }
        None => break,
      }
    }

    if let Some(progress_bar) = &progress_bar {
      progress_bar.finish_and_clear();
    }

    Ok(())
  }

  /// Offers one block to every index whose tip it extends. First-order
  /// indexes share one atomic batch; the fee index commits in a second batch
  /// afterwards, because it reads this block's outputs back out of the txo
  /// index and must never get ahead of it.
  fn connect(&mut self, prev: Option<BlockHash>, block: &BlockData) -> Result {
    let store = self.index.store.as_ref();
    let indexes = &self.index.indexes;

    let mut batch = Batch::new();
    let mut due = Vec::with_capacity(4);

    for index in indexes.first_order() {
      if !is_due(index.tip(store)?, prev) {
        continue;
      }

      index.connect(store, &mut batch, block)?;
      due.push(index.prefix());
    }

    let txo_reaches_block = due.contains(&indexes.txo.prefix())
      || indexes
        .txo
        .tip(store)?
        .is_some_and(|tip| tip.height >= block.height);

    let fee_due = is_due(indexes.fee.tip(store)?, prev) && txo_reaches_block;

    ensure!(
      !due.is_empty() || fee_due,
      NoIndexDueSnafu { block_id: block.id }
    );

    log::debug!(
      "connecting {} height {} ({} transactions)",
      block.id,
      block.height,
      block.txdata.len(),
    );

    if !batch.is_empty() {
      store.write(batch)?;
    }

    if fee_due {
      let mut batch = Batch::new();
      indexes.fee.connect(store, &mut batch, block)?;
      store.write(batch)?;
    }

    self.emit_connected(block);

    Ok(())
  }

  fn emit_connected(&self, block: &BlockData) {
    if self.index.event_sender.is_none() {
      return;
    }

    for (tx, txid) in &block.txdata {
      let raw = consensus::serialize(tx);

      for output in &tx.output {
        self.index.emit(Event::ScriptTouched {
          script_id: ScriptId::from_script(&output.script_pubkey),
          txid: *txid,
          raw: raw.clone(),
          height: Some(block.height),
        });
      }

      self.index.emit(Event::TransactionSeen {
        txid: *txid,
        raw,
        confirming: Some(block.id),
      });
    }

    self.index.emit(Event::BlockConnected {
      block_id: block.id,
      height: block.height,
    });
  }

  /// Removes one block from every index whose tip is that block. Stale
  /// blocks stay fetchable by id from the source, which is what makes
  /// rolling back a reorganized branch possible.
  pub(crate) fn disconnect(&mut self, block_id: BlockHash) -> Result {
    let store = self.index.store.as_ref();

    let block = self
      .index
      .source
      .block(block_id)?
      .context(BlockUnavailableSnafu { block_id })?;

    log::debug!("disconnecting {} height {}", block.id, block.height);

    let mut batch = Batch::new();

    for index in self.index.indexes.all() {
      if index
        .tip(store)?
        .is_some_and(|tip| tip.block_id == block_id)
      {
        index.disconnect(&mut batch, &block)?;
      }
    }

    store.write(batch)
  }
}
