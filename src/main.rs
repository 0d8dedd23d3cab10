use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

use ogcard::{
    CardCache, CardRenderer, ChromeCardRenderer, Engine, EngineConfig, RendererConfig,
    DEFAULT_CACHE_DIR,
};

#[derive(Parser)]
#[command(name = "ogcard", version, about = "Render cached social preview cards")]
struct Cli {
    /// Persistent directory for rendered cards
    #[arg(long, global = true, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Directory containing social-card.html and its partials
    #[arg(long, global = true)]
    partials_dir: Option<PathBuf>,

    /// Give up on a page that has not settled after this many milliseconds
    #[arg(long, global = true, default_value_t = 30000)]
    timeout_ms: u64,

    /// Run Chrome without its sandbox (needed in some containers)
    #[arg(long, global = true)]
    no_sandbox: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a single card
    Render {
        title: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Output PNG path (a temporary file when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Render every card listed in a JSON manifest with one browser session
    Batch { manifest: PathBuf },
    /// Inspect or clear the card cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached cards
    List,
    /// Delete every cached card
    Prune,
}

/// One manifest entry
#[derive(Debug, Deserialize)]
struct ManifestEntry {
    title: String,
    #[serde(default)]
    description: String,
    output: PathBuf,
}

impl Cli {
    fn renderer_config(&self) -> RendererConfig {
        let engine = EngineConfig {
            timeout_ms: self.timeout_ms,
            sandbox: !self.no_sandbox,
            ..Default::default()
        };
        let config = RendererConfig::default()
            .with_cache_dir(&self.cache_dir)
            .with_engine(engine);
        match &self.partials_dir {
            Some(dir) => config.with_partials_dir(dir),
            None => config,
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn outcome(fresh: bool) -> &'static str {
    if fresh {
        "rendered"
    } else {
        "cached"
    }
}

fn render_one<E: Engine>(
    cli: &Cli,
    title: &str,
    description: &str,
    output: Option<&Path>,
) -> Result<()> {
    let mut renderer = CardRenderer::<E>::new(cli.renderer_config())?;
    let generated = renderer.generate(title, description, output);
    let closed = renderer.close();
    let (path, fresh) = generated.with_context(|| format!("Failed to render card {:?}", title))?;
    closed.context("Failed to close browser")?;
    println!("{} ({})", path.display(), outcome(fresh));
    Ok(())
}

fn render_batch(cli: &Cli, manifest: &Path) -> Result<()> {
    let data = fs::read_to_string(manifest)
        .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
    let cards: Vec<ManifestEntry> = serde_json::from_str(&data)
        .with_context(|| format!("Invalid manifest {}", manifest.display()))?;

    let mut renderer = ChromeCardRenderer::new(cli.renderer_config())?;
    for card in &cards {
        let (path, fresh) = renderer
            .generate(&card.title, &card.description, Some(card.output.as_path()))
            .with_context(|| format!("Failed to render card {:?}", card.title))?;
        println!("{} ({})", path.display(), outcome(fresh));
    }
    renderer.close().context("Failed to close browser")?;
    Ok(())
}

fn run_cache(cli: &Cli, action: &CacheAction) -> Result<()> {
    let cache = CardCache::new(&cli.cache_dir);
    match action {
        CacheAction::List => {
            for entry in cache.entries()? {
                println!("{} {}", entry.fingerprint, entry.size);
            }
        }
        CacheAction::Prune => {
            let removed = cache.prune()?;
            println!("removed {} cached card(s) from {}", removed, cache.dir().display());
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Render {
            title,
            description,
            output,
        } => render_one::<ogcard::cdp::CdpEngine>(&cli, title, description, output.as_deref()),
        Command::Batch { manifest } => render_batch(&cli, manifest),
        Command::Cache { action } => run_cache(&cli, action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ogcard::Error;

    /// Fails both the screenshot and the shutdown.
    struct FailingEngine;

    impl Engine for FailingEngine {
        fn new(_config: &EngineConfig) -> ogcard::Result<Self> {
            Ok(Self)
        }

        fn load_url(&mut self, _url: &str) -> ogcard::Result<()> {
            Ok(())
        }

        fn wait_for_network_idle(&mut self) -> ogcard::Result<()> {
            Ok(())
        }

        fn render_png(&self) -> ogcard::Result<Vec<u8>> {
            Err(Error::RenderError("screenshot refused".into()))
        }

        fn close(&mut self) -> ogcard::Result<()> {
            Err(Error::Other("browser hung".into()))
        }
    }

    #[test]
    fn render_error_is_reported_before_close_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache_dir = dir.path().join("cache");
        let cli = Cli::parse_from([
            "ogcard",
            "--cache-dir",
            cache_dir.to_str().unwrap(),
            "render",
            "Broken",
        ]);
        let output = dir.path().join("broken.png");

        let err = render_one::<FailingEngine>(&cli, "Broken", "", Some(output.as_path())).unwrap_err();
        assert_eq!(err.to_string(), "Failed to render card \"Broken\"");
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::RenderError(_))));
    }
}
