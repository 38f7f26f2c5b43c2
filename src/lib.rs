//! Lode maintains a family of secondary indexes over the Bitcoin blockchain
//! in a local ordered key-value store: transaction outputs by script, spends
//! by output, confirmation heights by transaction, and per-block fee-rate
//! distributions. A resynchronization pass reconciles every index with the
//! node's active chain, rolling back stale blocks after reorganizations, and
//! a shadow index over the node's mempool lets queries merge unconfirmed
//! activity with confirmed history.

use {
  crate::{
    index::{
      entry::{Entry, FeeValue},
      indexes::{BlockIndex, Indexes},
      updater::Updater,
    },
    mempool::Mempool,
  },
  bitcoin::{
    Script, ScriptBuf, Transaction, consensus,
    hashes::{Hash, sha256},
  },
  byteorder::{LittleEndian, ReadBytesExt},
  clap::Parser,
  serde::{Deserialize, Serialize},
  snafu::{OptionExt, ResultExt, Snafu, ensure},
  std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt::{self, Display, Formatter},
    fs,
    io::Cursor,
    ops::Range,
    path::{Path, PathBuf},
    process,
    str::FromStr,
    sync::{
      Arc, Mutex,
      atomic::{self, AtomicBool},
      mpsc,
    },
    thread,
    time::{Duration, Instant},
  },
};

use crate::error::*;

pub use {
  crate::{
    error::{Error, Result},
    index::{
      FeeSnapshot, Index, ScriptRange, Status, Txo,
      entry::{FeeBox, Spend, Tip, TxoValue},
      event::Event,
    },
    options::Options,
    script_id::ScriptId,
    source::{BlockData, ChainSource, ChainTip, CoreClient, HeaderInfo},
    store::{Batch, LevelDb, MemoryStore, Store},
  },
  bitcoin::{BlockHash, Txid},
};

pub mod error;
pub mod index;
mod mempool;
pub mod options;
pub mod script_id;
pub mod source;
pub mod store;

static SHUTTING_DOWN: AtomicBool = AtomicBool::new(false);

pub fn request_shutdown() {
  SHUTTING_DOWN.store(true, atomic::Ordering::Relaxed);
}

pub fn shutting_down() -> bool {
  SHUTTING_DOWN.load(atomic::Ordering::Relaxed)
}

pub fn main() {
  env_logger::init();

  let options = Options::parse();

  ctrlc::set_handler(|| {
    if shutting_down() {
      process::exit(1);
    }
    eprintln!("Shutting down gracefully. Press <CTRL-C> again to shutdown immediately.");
    request_shutdown();
  })
  .expect("Error setting <CTRL-C> handler");

  if let Err(err) = run(&options) {
    eprintln!("error: {err}");
    process::exit(1);
  }
}

fn run(options: &Options) -> Result {
  let index = Index::open(options)?;

  if options.status {
    println!(
      "{}",
      serde_json::to_string_pretty(&index.status()?).expect("status serialization failed")
    );
    return Ok(());
  }

  while !shutting_down() {
    if let Err(err) = index.try_resync() {
      log::warn!("resync failed: {err}");
    }

    // Sleep in short slices so a shutdown request interrupts promptly.
    let deadline = Instant::now() + options.poll_interval();
    while !shutting_down() && Instant::now() < deadline {
      thread::sleep(Duration::from_millis(100));
    }
  }

  Ok(())
}
