use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;

use depsweep::discovery::collect_files;
use depsweep::engine::{load_project, Analyzer};
use depsweep::export::{export, ExportFormat};
use depsweep::logging;

#[derive(Parser)]
#[command(name = "depsweep")]
#[command(author = "Zachary Woods <143150513+zach-fau@users.noreply.github.com>")]
#[command(version)]
#[command(about = "Find declared npm dependencies that nothing in the project uses", long_about = None)]
struct Cli {
    /// Project directory containing package.json
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Never report this dependency as unused (repeatable)
    #[arg(long = "safe", value_name = "NAME")]
    safe: Vec<String>,

    /// Also propose peer, optional and protected dependencies
    #[arg(long)]
    aggressive: bool,

    /// Output format: text, json, markdown
    #[arg(short, long, default_value_t = ExportFormat::Text)]
    format: ExportFormat,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_json);

    let root = cli
        .path
        .canonicalize()
        .with_context(|| format!("Cannot open project directory {}", cli.path.display()))?;

    let (_, options) = load_project(&root)?;
    let options = options.with_overrides(&cli.safe, cli.aggressive);

    let files = collect_files(&root, &options.ignore_dirs);
    debug!(files = files.len(), root = %root.display(), "corpus collected");

    let show_progress = cli.verbose > 0;
    let analyzer = Analyzer::new(options);
    let report = analyzer
        .analyze_with_progress(&root, &files, |p| {
            if show_progress && p.processed == p.total {
                eprintln!("checked {} ({} files)", p.dependency, p.total);
            }
        })
        .await
        .context("Analysis failed")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    export(cli.format, &report, &mut out).context("Failed to write report")?;
    out.flush()?;

    Ok(if report.has_unused() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
