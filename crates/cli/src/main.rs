use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use console::style;
use outliner_dom::{AnchorRegistry, PageSnapshot};
use outliner_engine::{EngineConfig, PageInstance, DEFAULT_BATCH_SIZE};
use outliner_labeler::HeuristicBackend;
use outliner_panel::Panel;
use outliner_protocol::{InstanceId, StatusPhase, PENDING_LABEL};
use outliner_segmenter::{Segmenter, SegmenterConfig};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Labeling runs locally and settles fast; waiting longer than this for
/// the next push is a hang.
const LABEL_DEADLINE: Duration = Duration::from_secs(30);

const PREVIEW_CHARS: usize = 72;

#[derive(Parser)]
#[command(name = "outliner")]
#[command(about = "Segment a saved web page and label its outline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build and label the outline of a saved HTML page
    Outline(OutlineArgs),

    /// Show the raw segmentation without labeling
    Chunks(ChunksArgs),
}

#[derive(Args)]
struct OutlineArgs {
    /// Path to the HTML file
    file: PathBuf,

    /// Host the page was saved from; drives strategy selection
    #[arg(long, default_value = "localhost")]
    host: String,

    /// TOML file with segmenter overrides (partial keys allowed)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chunks labeled per pass
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,
}

#[derive(Args)]
struct ChunksArgs {
    /// Path to the HTML file
    file: PathBuf,

    /// Host the page was saved from; drives strategy selection
    #[arg(long, default_value = "localhost")]
    host: String,

    /// TOML file with segmenter overrides (partial keys allowed)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print full chunk texts instead of one-line previews
    #[arg(long)]
    full: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match cli.command {
        Commands::Outline(args) => run_outline(args).await,
        Commands::Chunks(args) => run_chunks(args),
    }
}

/// Segments the page, labels every chunk through the local heuristic
/// backend, and prints the settled outline.
async fn run_outline(args: OutlineArgs) -> Result<()> {
    let html = read_page(&args.file)?;
    let segmenter = build_segmenter(args.config.as_deref())?;
    let config = EngineConfig {
        batch_size: args.batch_size,
        ..EngineConfig::default()
    };

    let instance = PageInstance::start(
        InstanceId(1),
        &html,
        &args.host,
        segmenter,
        Arc::new(HeuristicBackend::default()),
        config,
    )
    .context("Cannot start the outline producer")?;

    // One batch is labeled per fetch, so a long page settles only because
    // every OutlineChanged push makes the panel re-fetch, and the re-fetch
    // queues the next batch.
    let mut pushes = instance.subscribe_pushes();
    let mut panel = Panel::new();
    let mut rows = panel.activate(&instance).await?;
    while rows.iter().any(|row| row.label == PENDING_LABEL) {
        let push = tokio::time::timeout(LABEL_DEADLINE, pushes.recv())
            .await
            .context("Labeling did not settle in time")?
            .context("The outline producer stopped before settling")?;
        panel.handle_push(&instance, push).await?;
        rows = panel.render(instance.id());
    }

    let settled = instance.status();
    let status_note = match settled {
        StatusPhase::Finished => style(settled.to_string()).green(),
        _ => style(settled.to_string()).red(),
    };
    eprintln!(
        "{} chunks via {} ({status_note})",
        rows.len(),
        style(instance.strategy().to_string()).cyan(),
    );
    for (index, row) in rows.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            index + 1,
            style(&row.label).bold(),
            style(format!("[{}]", row.anchor_id)).dim(),
        );
    }
    Ok(())
}

/// Prints the raw segmentation: strategy, anchors, sizes, and text.
fn run_chunks(args: ChunksArgs) -> Result<()> {
    let html = read_page(&args.file)?;
    let segmenter = build_segmenter(args.config.as_deref())?;

    let page = PageSnapshot::parse(&html, &args.host);
    let mut anchors = AnchorRegistry::new();
    let segmentation = segmenter.segment(&page, &mut anchors);

    eprintln!(
        "{} chunks via {}",
        segmentation.chunks.len(),
        style(segmentation.strategy.to_string()).cyan(),
    );
    for (index, chunk) in segmentation.chunks.iter().enumerate() {
        println!(
            "{:>3}. {} {}",
            index + 1,
            style(format!("[{}]", chunk.anchor_id)).dim(),
            style(format!("{} chars", chunk.text.chars().count())).dim(),
        );
        if args.full {
            println!("{}", chunk.text);
            println!();
        } else {
            println!("     {}", preview(&chunk.text, PREVIEW_CHARS));
        }
    }
    Ok(())
}

fn read_page(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))
}

fn build_segmenter(config: Option<&Path>) -> Result<Segmenter> {
    let config = load_segmenter_config(config)?;
    Segmenter::new(config).context("Invalid segmenter config")
}

fn load_segmenter_config(path: Option<&Path>) -> Result<SegmenterConfig> {
    let Some(path) = path else {
        return Ok(SegmenterConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Cannot read segmenter config {}", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("Invalid segmenter config in {}", path.display()))
}

/// Collapses whitespace and cuts to `budget` characters for one-line rows.
fn preview(text: &str, budget: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= budget {
        return flat;
    }
    let cut: String = flat.chars().take(budget).collect();
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn preview_flattens_whitespace_and_truncates() {
        assert_eq!(preview("one\n two   three", 72), "one two three");

        let long = "word ".repeat(40);
        let cut = preview(&long, 10);
        assert!(cut.ends_with('…'));
        assert!(cut.chars().count() <= 11);
    }

    #[test]
    fn partial_config_overrides_keep_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("segmenter.toml");
        fs::write(&path, "min_chunk_chars = 10\n").expect("write config");

        let config = load_segmenter_config(Some(&path)).expect("load");
        assert_eq!(config.min_chunk_chars, 10);
        assert_eq!(
            config.max_chunk_chars,
            SegmenterConfig::default().max_chunk_chars
        );
    }

    #[test]
    fn missing_config_file_is_reported_with_its_path() {
        let err = load_segmenter_config(Some(Path::new("/nonexistent/seg.toml")))
            .expect_err("must fail");
        assert!(format!("{err:#}").contains("/nonexistent/seg.toml"));
    }
}
