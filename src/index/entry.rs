use super::*;

/// Conversion between an index record and the raw bytes the store holds.
/// Loading checks lengths because the bytes come back off disk; everything
/// else about the layouts is fixed.
pub(crate) trait Entry: Sized {
  fn load(bytes: &[u8]) -> Result<Self>;

  fn store(&self) -> Vec<u8>;
}

/// The last block an index has connected. Stored per index, so each index
/// catches up, advances, and rolls back independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Tip {
  pub block_id: BlockHash,
  pub height: u32,
}

impl Entry for Tip {
  fn load(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() == 36, CorruptSnafu { what: "tip" });

    Ok(Self {
      block_id: BlockHash::from_byte_array(bytes[..32].try_into().unwrap()),
      height: u32::from_le_bytes(bytes[32..36].try_into().unwrap()),
    })
  }

  fn store(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(36);
    bytes.extend(self.block_id.to_byte_array());
    bytes.extend(self.height.to_le_bytes());
    bytes
  }
}

/// The transaction and input index that consumed an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Spend {
  pub txid: Txid,
  pub vin: u32,
}

impl Entry for Spend {
  fn load(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() == 36, CorruptSnafu { what: "spend" });

    Ok(Self {
      txid: Txid::from_byte_array(bytes[..32].try_into().unwrap()),
      vin: u32::from_le_bytes(bytes[32..36].try_into().unwrap()),
    })
  }

  fn store(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(36);
    bytes.extend(self.txid.to_byte_array());
    bytes.extend(self.vin.to_le_bytes());
    bytes
  }
}

/// An output's value and script pubkey. The script runs to the end of the
/// record, so it needs no length prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxoValue {
  pub value: u64,
  pub script: ScriptBuf,
}

impl Entry for TxoValue {
  fn load(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() >= 8, CorruptSnafu { what: "txo" });

    Ok(Self {
      value: u64::from_le_bytes(bytes[..8].try_into().unwrap()),
      script: ScriptBuf::from(bytes[8..].to_vec()),
    })
  }

  fn store(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + self.script.len());
    bytes.extend(self.value.to_le_bytes());
    bytes.extend(self.script.as_bytes());
    bytes
  }
}

impl Entry for u32 {
  fn load(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() == 4, CorruptSnafu { what: "height" });
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
  }

  fn store(&self) -> Vec<u8> {
    self.to_le_bytes().to_vec()
  }
}

/// Quartile summary of a block's transaction fee rates, in satoshis per
/// virtual byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBox {
  pub q1: u64,
  pub median: u64,
  pub q3: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FeeValue {
  pub(crate) fees: FeeBox,
  pub(crate) size: u32,
}

impl Entry for FeeValue {
  fn load(bytes: &[u8]) -> Result<Self> {
    ensure!(bytes.len() == 28, CorruptSnafu { what: "fee" });

    let mut cursor = Cursor::new(bytes);

    Ok(Self {
      fees: FeeBox {
        q1: cursor.read_u64::<LittleEndian>().unwrap(),
        median: cursor.read_u64::<LittleEndian>().unwrap(),
        q3: cursor.read_u64::<LittleEndian>().unwrap(),
      },
      size: cursor.read_u32::<LittleEndian>().unwrap(),
    })
  }

  fn store(&self) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(28);
    bytes.extend(self.fees.q1.to_le_bytes());
    bytes.extend(self.fees.median.to_le_bytes());
    bytes.extend(self.fees.q3.to_le_bytes());
    bytes.extend(self.size.to_le_bytes());
    bytes
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tip_entry() {
    let tip = Tip {
      block_id: BlockHash::all_zeros(),
      height: 700_000,
    };

    let bytes = tip.store();
    assert_eq!(bytes.len(), 36);
    assert_eq!(Tip::load(&bytes).unwrap(), tip);

    assert!(matches!(
      Tip::load(&bytes[..35]),
      Err(Error::Corrupt { what: "tip" }),
    ));
  }

  #[test]
  fn txo_value_entry() {
    let value = TxoValue {
      value: 5_000_000_000,
      script: ScriptBuf::from(vec![0x51, 0x52]),
    };

    let bytes = value.store();
    assert_eq!(&bytes[8..], &[0x51, 0x52]);
    assert_eq!(TxoValue::load(&bytes).unwrap(), value);

    // An empty script is valid.
    let empty = TxoValue {
      value: 0,
      script: ScriptBuf::new(),
    };
    assert_eq!(TxoValue::load(&empty.store()).unwrap(), empty);
  }

  #[test]
  fn fee_value_entry() {
    let value = FeeValue {
      fees: FeeBox {
        q1: 1,
        median: 2,
        q3: 3,
      },
      size: 285,
    };

    assert_eq!(FeeValue::load(&value.store()).unwrap(), value);
  }
}
