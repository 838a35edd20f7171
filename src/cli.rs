use crate::config::{ClientConfig, Flavor};
use crate::error::Result;
use clap::Parser;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chatflow")]
#[command(version)]
#[command(about = "Terminal client for ChatFlow polling chat servers")]
pub struct Args {
    /// TOML config file ([server], [polling], [upload] tables)
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Hostname used for the local-vs-deployed server switch
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// Explicit server base URL; overrides the hostname switch
    #[arg(long)]
    pub base_url: Option<String>,

    /// Server API flavor
    #[arg(long, value_enum)]
    pub flavor: Option<Flavor>,

    /// Log in (token flavor) or pick a guest name (legacy flavor) on start
    #[arg(long, short)]
    pub user: Option<String>,

    /// Password for --user
    #[arg(long, env = "CHATFLOW_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Room to join on start
    #[arg(long, short)]
    pub room: Option<String>,

    /// Disable coloured output
    #[arg(long)]
    pub no_color: bool,

    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    pub log_level: String,

    /// Print shell completions and exit
    #[arg(long, value_enum)]
    pub completions: Option<Shell>,
}

impl Args {
    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load(path)?,
            None => ClientConfig::default(),
        };
        if let Some(flavor) = self.flavor {
            config.server.flavor = flavor;
        }
        config.validate()?;
        Ok(config)
    }

    /// `--base-url` if given, otherwise the hostname switch.
    pub fn resolve_base_url(&self, config: &ClientConfig) -> String {
        match &self.base_url {
            Some(url) => url.clone(),
            None => config.base_url_for_host(&self.host).to_string(),
        }
    }
}
