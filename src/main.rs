//! nixtract - extract the graph of derivations reachable from a Nix flake.
//!
//! A finder subprocess lists the flake's top-level derivations to its
//! stderr pipe while evaluation is still running; each discovery is handed
//! to a pool of workers that call a describer subprocess per derivation,
//! emit the resulting record, and queue any dependencies that have not
//! been seen yet. The output is JSONL on stdout or a file; everything else
//! (logs, progress) goes to stderr.

mod cli;
mod error;
mod extract;
mod logging;
mod model;
mod version;

use std::fs::File;
use std::io::{IsTerminal, Write};
use std::sync::mpsc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use cli::Cli;
use extract::{ExtractionOpts, StatusEvent, StatusSender};

fn main() {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }
    logging::init(cli.log_config());

    if let Err(e) = run(&cli) {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        for cause in e.chain().skip(1) {
            eprintln!(
                "  {}: {}",
                "caused by".if_supports_color(Stderr, |text| text.yellow()),
                cause
            );
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let writer: Box<dyn Write + Send> = match cli.output_path.as_deref() {
        None => Box::new(std::io::stdout()),
        Some(path) if path.as_os_str() == "-" => Box::new(std::io::stdout()),
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create output file {}", path.display()))?;
            Box::new(file)
        }
    };

    let opts = ExtractionOpts {
        flake_ref: cli.flake_ref.clone(),
        system: cli.system.clone(),
        attribute_path: cli.attribute_path.clone(),
        runtime_only: cli.runtime_only,
        offline: cli.offline,
        n_workers: cli.n_workers,
        exclude: cli.exclude.clone(),
        nix_bin: cli.nix_bin.clone(),
    };

    // Progress is only rendered on an interactive stderr so piped runs
    // stay clean.
    let (status, progress) = if !cli.quiet && std::io::stderr().is_terminal() {
        let (tx, rx) = mpsc::channel();
        (StatusSender::new(tx), Some(spawn_progress(rx)))
    } else {
        (StatusSender::disabled(), None)
    };

    let summary = extract::extract(&opts, writer, cli.pretty, status)
        .context("extraction failed")?;

    if let Some(handle) = progress {
        let _ = handle.join();
    }

    tracing::info!(
        described = summary.described,
        failed = summary.failed,
        written = summary.written,
        "done"
    );
    if summary.failed > 0 && !cli.quiet {
        eprintln!(
            "{} of {} derivations failed description; partial graph written",
            summary.failed,
            summary.failed + summary.described
        );
    }

    Ok(())
}

fn spawn_progress(rx: mpsc::Receiver<StatusEvent>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let bar = indicatif::ProgressBar::new_spinner();
        bar.set_style(indicatif::ProgressStyle::with_template("{spinner} {msg}").unwrap());
        bar.enable_steady_tick(Duration::from_millis(120));

        let (mut queued, mut described, mut failed) = (0u64, 0u64, 0u64);
        let mut current = String::new();
        for event in rx {
            match event {
                StatusEvent::Queued { .. } => queued += 1,
                StatusEvent::Started { attribute_path } => current = attribute_path,
                StatusEvent::Described { .. } => described += 1,
                StatusEvent::Failed {
                    attribute_path,
                    kind,
                } => {
                    failed += 1;
                    bar.println(format!("{attribute_path}: {kind} failure"));
                }
                StatusEvent::FinderDone => {}
                StatusEvent::Drained => break,
            }
            bar.set_message(format!(
                "{described}/{queued} described, {failed} failed ({current})"
            ));
        }
        bar.finish_and_clear();
    })
}
