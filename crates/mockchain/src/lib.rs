//! A scriptable in-memory `ChainSource` for tests: push blocks, reorganize
//! the chain, and stage mempool transactions, all without a node. Panics
//! rather than returning errors on misuse, since it only runs under test.

use {
  bitcoin::{
    Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Witness,
    absolute::LockTime,
    hashes::{Hash, sha256},
    transaction::Version,
  },
  lode::{BlockData, BlockHash, ChainSource, ChainTip, HeaderInfo, Result, Txid},
  std::{collections::HashMap, sync::Mutex},
};

struct StoredBlock {
  height: u32,
  prev: BlockHash,
  stripped_size: u32,
  txdata: Vec<Transaction>,
}

#[derive(Default)]
struct State {
  // Active chain by height. Every block ever pushed stays in `blocks`, so
  // reorganized-away blocks remain fetchable by id, as on a real node.
  active: Vec<BlockHash>,
  blocks: HashMap<BlockHash, StoredBlock>,
  mempool: Vec<Txid>,
  transactions: HashMap<Txid, Transaction>,
}

#[derive(Default)]
pub struct MockChain {
  state: Mutex<State>,
}

fn block_id(prev: BlockHash, height: u32, txdata: &[Transaction]) -> BlockHash {
  let mut bytes = Vec::new();
  bytes.extend(prev.to_byte_array());
  bytes.extend(height.to_le_bytes());
  for tx in txdata {
    bytes.extend(tx.compute_txid().to_byte_array());
  }
  BlockHash::from_byte_array(sha256::Hash::hash(&bytes).to_byte_array())
}

impl MockChain {
  pub fn new() -> Self {
    Self::default()
  }

  /// Appends a block to the active chain and returns its id. Transactions
  /// it confirms leave the mock mempool, as they would on a real node.
  pub fn push_block(&self, txdata: Vec<Transaction>) -> BlockHash {
    let mut state = self.state.lock().unwrap();

    let height = u32::try_from(state.active.len()).unwrap();
    let prev = state.active.last().copied().unwrap_or_else(BlockHash::all_zeros);
    let id = block_id(prev, height, &txdata);

    let stripped_size = 80
      + u32::try_from(txdata.iter().map(Transaction::base_size).sum::<usize>()).unwrap();

    for tx in &txdata {
      let txid = tx.compute_txid();
      state.mempool.retain(|entry| *entry != txid);
      state.transactions.remove(&txid);
    }

    state.blocks.insert(
      id,
      StoredBlock {
        height,
        prev,
        stripped_size,
        txdata,
      },
    );
    state.active.push(id);

    id
  }

  /// Abandons the top `depth` blocks of the active chain. The abandoned
  /// blocks stay fetchable by id.
  pub fn reorg(&self, depth: usize) {
    let mut state = self.state.lock().unwrap();
    let remaining = state.active.len().saturating_sub(depth);
    state.active.truncate(remaining);
  }

  pub fn add_mempool_tx(&self, tx: Transaction) -> Txid {
    let mut state = self.state.lock().unwrap();
    let txid = tx.compute_txid();
    state.mempool.push(txid);
    state.transactions.insert(txid, tx);
    txid
  }

  /// Drops a transaction's body while leaving its id announced, simulating
  /// eviction between announcement and fetch.
  pub fn evict_body(&self, txid: Txid) {
    self.state.lock().unwrap().transactions.remove(&txid);
  }

  pub fn tip_id(&self) -> BlockHash {
    *self
      .state
      .lock()
      .unwrap()
      .active
      .last()
      .expect("mock chain has no blocks")
  }

  fn next_of(state: &State, id: BlockHash, height: u32) -> Option<BlockHash> {
    let height = usize::try_from(height).unwrap();

    if state.active.get(height) != Some(&id) {
      return None;
    }

    state.active.get(height + 1).copied()
  }
}

impl ChainSource for MockChain {
  fn tip(&self) -> Result<ChainTip> {
    let state = self.state.lock().unwrap();

    let block_id = *state.active.last().expect("mock chain has no blocks");

    Ok(ChainTip {
      block_id,
      height: u32::try_from(state.active.len() - 1).unwrap(),
    })
  }

  fn block(&self, block_id: BlockHash) -> Result<Option<BlockData>> {
    let state = self.state.lock().unwrap();

    let Some(stored) = state.blocks.get(&block_id) else {
      return Ok(None);
    };

    Ok(Some(BlockData {
      id: block_id,
      height: stored.height,
      prev: stored.prev,
      next: Self::next_of(&state, block_id, stored.height),
      stripped_size: stored.stripped_size,
      txdata: stored
        .txdata
        .iter()
        .cloned()
        .map(|tx| {
          let txid = tx.compute_txid();
          (tx, txid)
        })
        .collect(),
    }))
  }

  fn header(&self, block_id: BlockHash) -> Result<Option<HeaderInfo>> {
    let state = self.state.lock().unwrap();

    let Some(stored) = state.blocks.get(&block_id) else {
      return Ok(None);
    };

    let height = usize::try_from(stored.height).unwrap();

    Ok(Some(HeaderInfo {
      height: stored.height,
      prev: (stored.height > 0).then_some(stored.prev),
      next: Self::next_of(&state, block_id, stored.height),
      on_active_chain: state.active.get(height) == Some(&block_id),
    }))
  }

  fn block_id_at_height(&self, height: u32) -> Result<Option<BlockHash>> {
    Ok(
      self
        .state
        .lock()
        .unwrap()
        .active
        .get(usize::try_from(height).unwrap())
        .copied(),
    )
  }

  fn mempool_tx_ids(&self) -> Result<Vec<Txid>> {
    Ok(self.state.lock().unwrap().mempool.clone())
  }

  fn transaction(&self, txid: Txid) -> Result<Option<Transaction>> {
    Ok(self.state.lock().unwrap().transactions.get(&txid).cloned())
  }
}

/// A coinbase paying `value` to `script_pubkey`. `height` and `tag` go into
/// the script sig so that competing blocks at one height get distinct
/// coinbases, and therefore distinct block ids.
pub fn coinbase(height: u32, tag: u8, value: u64, script_pubkey: ScriptBuf) -> Transaction {
  let mut script_sig = height.to_le_bytes().to_vec();
  script_sig.push(tag);

  Transaction {
    version: Version::ONE,
    lock_time: LockTime::ZERO,
    input: vec![TxIn {
      previous_output: OutPoint::null(),
      script_sig: ScriptBuf::from(script_sig),
      sequence: Sequence::MAX,
      witness: Witness::new(),
    }],
    output: vec![TxOut {
      value: Amount::from_sat(value),
      script_pubkey,
    }],
  }
}

/// A plain spend of `inputs` into `outputs`.
pub fn spend(inputs: &[(Txid, u32)], outputs: &[(u64, ScriptBuf)]) -> Transaction {
  Transaction {
    version: Version::ONE,
    lock_time: LockTime::ZERO,
    input: inputs
      .iter()
      .map(|(txid, vout)| TxIn {
        previous_output: OutPoint {
          txid: *txid,
          vout: *vout,
        },
        script_sig: ScriptBuf::new(),
        sequence: Sequence::MAX,
        witness: Witness::new(),
      })
      .collect(),
    output: outputs
      .iter()
      .map(|(value, script_pubkey)| TxOut {
        value: Amount::from_sat(*value),
        script_pubkey: script_pubkey.clone(),
      })
      .collect(),
  }
}
