use super::*;

/// SHA-256 digest of an output's script pubkey. Scripts are indexed and
/// queried by digest rather than by raw script bytes, which keys them at a
/// fixed width and avoids echoing address formats through the engine.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScriptId(sha256::Hash);

impl ScriptId {
  pub fn from_script(script: &Script) -> Self {
    Self(sha256::Hash::hash(script.as_bytes()))
  }

  pub fn from_byte_array(bytes: [u8; 32]) -> Self {
    Self(sha256::Hash::from_byte_array(bytes))
  }

  pub fn to_byte_array(self) -> [u8; 32] {
    self.0.to_byte_array()
  }
}

impl Display for ScriptId {
  fn fmt(&self, f: &mut Formatter) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl FromStr for ScriptId {
  type Err = bitcoin::hashes::hex::HexToArrayError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Ok(Self(s.parse()?))
  }
}
