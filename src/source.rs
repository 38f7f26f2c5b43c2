use {
  super::*,
  bitcoin::Block,
  bitcoincore_rpc::{Auth, Client, RpcApi, jsonrpc},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChainTip {
  pub block_id: BlockHash,
  pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderInfo {
  pub height: u32,
  pub prev: Option<BlockHash>,
  pub next: Option<BlockHash>,
  pub on_active_chain: bool,
}

/// A block as the indexes consume it: transactions paired with their
/// pre-computed ids, the header linkage needed to walk the chain, and the
/// stripped size recorded by the fee index.
pub struct BlockData {
  pub id: BlockHash,
  pub height: u32,
  pub prev: BlockHash,
  pub next: Option<BlockHash>,
  pub stripped_size: u32,
  pub txdata: Vec<(Transaction, Txid)>,
}

impl BlockData {
  pub fn new(id: BlockHash, header: &HeaderInfo, block: Block) -> Self {
    // weight = stripped_size * 3 + total_size
    let weight = block.weight().to_wu();
    let total_size = u64::try_from(block.total_size()).unwrap();
    let stripped_size = u32::try_from((weight - total_size) / 3).unwrap();

    Self {
      id,
      height: header.height,
      prev: header.prev.unwrap_or_else(BlockHash::all_zeros),
      next: header.next,
      stripped_size,
      txdata: block
        .txdata
        .into_iter()
        .map(|tx| {
          let txid = tx.compute_txid();
          (tx, txid)
        })
        .collect(),
    }
  }
}

/// Everything the engine needs from a Bitcoin node. Blocks and headers are
/// fetched by id and remain fetchable after being reorganized off the active
/// chain, which disconnection depends on.
pub trait ChainSource {
  fn tip(&self) -> Result<ChainTip>;

  fn block(&self, block_id: BlockHash) -> Result<Option<BlockData>>;

  fn header(&self, block_id: BlockHash) -> Result<Option<HeaderInfo>>;

  fn block_id_at_height(&self, height: u32) -> Result<Option<BlockHash>>;

  fn mempool_tx_ids(&self) -> Result<Vec<Txid>>;

  fn transaction(&self, txid: Txid) -> Result<Option<Transaction>>;
}

impl<T: ChainSource> ChainSource for Arc<T> {
  fn tip(&self) -> Result<ChainTip> {
    (**self).tip()
  }

  fn block(&self, block_id: BlockHash) -> Result<Option<BlockData>> {
    (**self).block(block_id)
  }

  fn header(&self, block_id: BlockHash) -> Result<Option<HeaderInfo>> {
    (**self).header(block_id)
  }

  fn block_id_at_height(&self, height: u32) -> Result<Option<BlockHash>> {
    (**self).block_id_at_height(height)
  }

  fn mempool_tx_ids(&self) -> Result<Vec<Txid>> {
    (**self).mempool_tx_ids()
  }

  fn transaction(&self, txid: Txid) -> Result<Option<Transaction>> {
    (**self).transaction(txid)
  }
}

pub struct CoreClient {
  client: Client,
}

impl CoreClient {
  pub fn new(url: &str, auth: Auth) -> Result<Self> {
    Ok(Self {
      client: Client::new(url, auth).context(RpcSnafu)?,
    })
  }
}

/// Core reports missing blocks and transactions with dedicated JSON-RPC
/// error codes rather than empty results.
fn into_option<T>(result: bitcoincore_rpc::Result<T>) -> Result<Option<T>> {
  match result {
    Ok(value) => Ok(Some(value)),
    Err(bitcoincore_rpc::Error::JsonRpc(jsonrpc::Error::Rpc(ref err)))
      if err.code == -5 || err.code == -8 =>
    {
      Ok(None)
    }
    Err(source) => Err(Error::Rpc { source }),
  }
}

impl ChainSource for CoreClient {
  fn tip(&self) -> Result<ChainTip> {
    let block_id = self.client.get_best_block_hash().context(RpcSnafu)?;

    let header = self
      .client
      .get_block_header_info(&block_id)
      .context(RpcSnafu)?;

    Ok(ChainTip {
      block_id,
      height: u32::try_from(header.height).unwrap(),
    })
  }

  fn block(&self, block_id: BlockHash) -> Result<Option<BlockData>> {
    let Some(block) = into_option(self.client.get_block(&block_id))? else {
      return Ok(None);
    };

    let Some(header) = self.header(block_id)? else {
      return Ok(None);
    };

    Ok(Some(BlockData::new(block_id, &header, block)))
  }

  fn header(&self, block_id: BlockHash) -> Result<Option<HeaderInfo>> {
    let Some(info) = into_option(self.client.get_block_header_info(&block_id))? else {
      return Ok(None);
    };

    Ok(Some(HeaderInfo {
      height: u32::try_from(info.height).unwrap(),
      prev: info.previous_block_hash,
      next: info.next_block_hash,
      // Core reports negative confirmations for blocks that are no longer
      // on the active chain.
      on_active_chain: info.confirmations >= 0,
    }))
  }

  fn block_id_at_height(&self, height: u32) -> Result<Option<BlockHash>> {
    into_option(self.client.get_block_hash(height.into()))
  }

  fn mempool_tx_ids(&self) -> Result<Vec<Txid>> {
    self.client.get_raw_mempool().context(RpcSnafu)
  }

  fn transaction(&self, txid: Txid) -> Result<Option<Transaction>> {
    into_option(self.client.get_raw_transaction(&txid, None))
  }
}
