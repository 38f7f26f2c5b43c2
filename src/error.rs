use super::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
  #[snafu(display("block {block_id} not available from chain source"))]
  BlockUnavailable { block_id: BlockHash },
  #[snafu(display("malformed {what} record"))]
  Corrupt { what: &'static str },
  #[snafu(display("query exceeded row limit of {limit}"))]
  ExceededLimit { limit: usize },
  #[snafu(display("fetched block at height {expected} reports height {actual}"))]
  HeightMismatch { expected: u32, actual: u32 },
  #[snafu(display("chain source has no block at height {height}"))]
  HeightUnavailable { height: u32 },
  #[snafu(display("I/O error: {source}"))]
  Io { source: std::io::Error },
  #[snafu(display("missing txo {txid}:{vout}"))]
  MissingTxo { txid: Txid, vout: u32 },
  #[snafu(display("no index due for block {block_id}; persisted tips disagree with the walk"))]
  NoIndexDue { block_id: BlockHash },
  #[snafu(display("chain source error: {source}"))]
  Rpc { source: bitcoincore_rpc::Error },
  #[snafu(display("store error: {message}"))]
  Store { message: String },
}

pub type Result<T = (), E = Error> = std::result::Result<T, E>;
