use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use kgtk_browser::{Browser, BrowserConfig, Result, SqliteEngine};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Knowledge graph browser backend", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "KGTK_BROWSER_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite graph cache (overrides config file)
    #[arg(long)]
    graph_cache: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("kgtk_browser=info"));
    fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut config = BrowserConfig::load(args.config.as_deref())?;
    if let Some(path) = args.graph_cache {
        config.store.graph_cache = path;
    }
    if let Some(addr) = args.listen {
        config.server.listen_addr = addr;
    }

    let store = &config.store;
    let engine = if store.graph_cache.as_os_str() == ":memory:" {
        SqliteEngine::open_in_memory(config.graph.clone(), store.max_results)?
    } else {
        SqliteEngine::open(&store.graph_cache, config.graph.clone(), store.max_results, store.read_only)?
    };

    let browser = Arc::new(Browser::new(engine, config)?);
    kgtk_browser::server::serve(browser).await
}
