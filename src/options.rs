use {super::*, bitcoincore_rpc::Auth};

#[derive(Clone, Default, Debug, Parser)]
#[command(version, about = "Maintain secondary indexes over the Bitcoin blockchain")]
pub struct Options {
  #[arg(long, help = "Load Bitcoin Core RPC cookie file from <COOKIE_FILE>.")]
  pub(crate) cookie_file: Option<PathBuf>,
  #[arg(long, alias = "datadir", help = "Store index in <DATA_DIR>.")]
  pub(crate) data_dir: Option<PathBuf>,
  #[arg(long, help = "Limit index to <HEIGHT_LIMIT> blocks.")]
  pub(crate) height_limit: Option<u32>,
  #[arg(
    long,
    value_parser = humantime::parse_duration,
    help = "Resync with the chain source every <POLL_INTERVAL>. [default: 10s]"
  )]
  pub(crate) poll_interval: Option<Duration>,
  #[arg(long, help = "Connect to Bitcoin Core RPC at <RPC_URL>. [default: 127.0.0.1:8332]")]
  pub(crate) rpc_url: Option<String>,
  #[arg(long, help = "Authenticate to Bitcoin Core RPC as <RPC_USERNAME>.")]
  pub(crate) rpc_username: Option<String>,
  #[arg(long, help = "Authenticate to Bitcoin Core RPC with <RPC_PASSWORD>.")]
  pub(crate) rpc_password: Option<String>,
  #[arg(long, help = "Print the chain tip and every index tip as JSON, then exit.")]
  pub(crate) status: bool,
}

impl Options {
  pub fn data_dir(&self) -> PathBuf {
    self
      .data_dir
      .clone()
      .unwrap_or_else(|| dirs::data_dir().unwrap_or_else(|| ".".into()).join("lode"))
  }

  pub fn poll_interval(&self) -> Duration {
    self.poll_interval.unwrap_or(Duration::from_secs(10))
  }

  pub fn rpc_url(&self) -> String {
    self
      .rpc_url
      .clone()
      .unwrap_or_else(|| "127.0.0.1:8332".into())
  }

  pub fn auth(&self) -> Auth {
    if let Some(cookie_file) = &self.cookie_file {
      return Auth::CookieFile(cookie_file.clone());
    }

    match (&self.rpc_username, &self.rpc_password) {
      (Some(username), Some(password)) => Auth::UserPass(username.clone(), password.clone()),
      _ => Auth::None,
    }
  }
}
