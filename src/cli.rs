use clap::{Args as ClapArgs, Parser, Subcommand};
use std::time::Duration;

use crate::config::ScrapeConfig;
use crate::metadata::RequestProfile;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(ClapArgs, Debug, Clone, Default)]
pub struct MetaArgs {
    /// Don't fall back to a headless browser
    /// when a page refuses plain requests
    #[clap(long, default_value = "false")]
    pub no_headless: bool,

    /// Maximum number of redirects to follow
    #[clap(long)]
    pub max_redirects: Option<usize>,

    /// Request timeout in seconds
    #[clap(long)]
    pub timeout: Option<u64>,
}

impl MetaArgs {
    pub fn headless_enabled(&self, config: &ScrapeConfig) -> bool {
        config.headless.enabled && !self.no_headless
    }

    pub fn request_profile(&self, config: &ScrapeConfig) -> RequestProfile {
        let mut profile = config.request_profile();
        if let Some(max_redirects) = self.max_redirects {
            profile.max_redirects = max_redirects;
        }
        if let Some(timeout) = self.timeout.filter(|secs| *secs > 0) {
            profile.timeout = Duration::from_secs(timeout);
        }
        profile
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print title, favicon and preview image of a page
    Meta {
        url: String,

        #[clap(flatten)]
        meta_args: MetaArgs,
    },

    /// Start the http server
    Daemon {
        /// Address to listen on, overrides config.yaml
        #[clap(long)]
        listen: Option<String>,

        #[clap(flatten)]
        meta_args: MetaArgs,
    },
}
