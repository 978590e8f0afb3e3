use clap::Parser;
use tracing_subscriber::EnvFilter;

use shelfmark::cli::{self, MetaArgs};
use shelfmark::config::{Config, ScrapeConfig};
use shelfmark::metadata::MetadataExtractor;
use shelfmark::scrape::headless::Renderer;
use shelfmark::web;

fn extractor(config: &ScrapeConfig, meta_args: &MetaArgs) -> MetadataExtractor<Renderer> {
    let renderer = Renderer::new(meta_args.headless_enabled(config), config.chrome_options());
    MetadataExtractor::new(meta_args.request_profile(config), renderer)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("shelfmark=info,tower_http=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();
    let config = Config::load()?;

    match args.command {
        cli::Command::Meta { url, meta_args } => {
            let extractor = extractor(&config.scrape, &meta_args);
            let meta = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(extractor.extract(&url));

            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }

        cli::Command::Daemon { listen, meta_args } => {
            let extractor = extractor(&config.scrape, &meta_args);
            let listen_addr = listen.unwrap_or(config.listen_addr);
            web::start_daemon(&listen_addr, extractor)
        }
    }
}
