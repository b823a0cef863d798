pub mod cache;
pub mod canonical;
pub mod cli;
pub mod confidence;
pub mod connector;
pub mod data;
pub mod error;
pub mod io_utils;
pub mod mapper;
pub mod mappings;
pub mod normalize;
pub mod normalize_cmd;
pub mod quality;
pub mod rules;
pub mod schema_cmd;
pub mod similarity;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cache::DataCache,
    cli::{CacheArgs, CacheCommand, Cli, Commands},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("agri_normalize", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize(args) => normalize_cmd::execute(&args),
        Commands::Fetch(args) => normalize_cmd::fetch(&args),
        Commands::Map(args) => schema_cmd::map(&args),
        Commands::Drift(args) => schema_cmd::drift(&args),
        Commands::Cache(args) => handle_cache(&args),
    }
}

fn handle_cache(args: &CacheArgs) -> Result<()> {
    match &args.command {
        CacheCommand::Stats(location) => {
            let cache = DataCache::with_ttl_hours(&location.cache_dir, cache::DEFAULT_TTL_HOURS)?;
            let stats = cache.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        CacheCommand::Clear(location) => {
            let cache = DataCache::with_ttl_hours(&location.cache_dir, cache::DEFAULT_TTL_HOURS)?;
            let removed = cache.clear()?;
            info!("Removed {removed} cache entries from {:?}", cache.dir());
            println!("removed {removed}");
        }
    }
    Ok(())
}
