//! Parallel extraction of the derivation graph of a flake.
//!
//! Discovery starts with the finder program, which lists the flake's
//! top-level derivations to its stderr pipe while evaluation is still in
//! progress. Each discovered attribute path is claimed through the
//! [`VisitedSet`] and handed to a pool of description workers. Describing
//! a derivation surfaces its dependency edges, which are claimed and
//! queued the same way, so the crawl reaches the entire depth of the
//! graph. Work is spawned into the worker a description runs on and idle
//! workers steal from their peers; the run is over exactly when the finder
//! stream has ended and no queued description remains.
//!
//! Records flow through a bounded channel to a single writer thread; the
//! visited set is the only state shared between workers.

mod describer;
mod finder;
mod programs;
mod sink;
mod status;
mod visited;

pub use finder::FinderProcess;
pub use programs::EvalPrograms;
pub use sink::OutputSink;
pub use status::{StatusEvent, StatusSender};
pub use visited::VisitedSet;

use std::io::Write;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::SyncSender;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{NixtractError, Result};
use crate::model::DerivationRecord;

/// Inputs of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOpts {
    /// Flake reference to extract, e.g. "nixpkgs".
    pub flake_ref: String,
    /// Target system; None means the host system.
    pub system: Option<String>,
    /// Extraction root; None or empty means every derivation the flake
    /// exposes, discovered through the finder.
    pub attribute_path: Option<String>,
    /// Follow only runtime dependencies.
    pub runtime_only: bool,
    /// Forward --offline to nix.
    pub offline: bool,
    /// Description worker count; None means the number of CPUs.
    pub n_workers: Option<usize>,
    /// Attribute path prefixes that are never enqueued.
    pub exclude: Vec<String>,
    /// The nix binary to invoke.
    pub nix_bin: PathBuf,
}

impl Default for ExtractionOpts {
    fn default() -> Self {
        Self {
            flake_ref: "nixpkgs".to_string(),
            system: None,
            attribute_path: None,
            runtime_only: false,
            offline: false,
            n_workers: None,
            exclude: Vec::new(),
            nix_bin: PathBuf::from("nix"),
        }
    }
}

/// Outcome counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Derivations described successfully.
    pub described: usize,
    /// Derivations whose description failed; no record was emitted.
    pub failed: usize,
    /// Records the sink actually wrote.
    pub written: usize,
}

/// Extract the graph reachable from `opts.flake_ref` and write it to
/// `writer` as JSONL.
///
/// Per-node failures are contained and counted; the run only fails on
/// startup errors (spawn, configuration), a finder evaluation failure, or
/// a sink write error. Records emitted before such a failure remain valid.
pub fn extract(
    opts: &ExtractionOpts,
    writer: Box<dyn Write + Send>,
    pretty: bool,
    status: StatusSender,
) -> Result<ExtractionSummary> {
    let programs = EvalPrograms::materialize()?;

    let n_workers = match opts.n_workers {
        Some(0) => {
            return Err(NixtractError::Config(
                "--n-workers must be at least 1".to_string(),
            ));
        }
        Some(n) => n,
        None => default_workers(),
    };

    info!(
        flake_ref = %opts.flake_ref,
        system = opts.system.as_deref().unwrap_or("<host>"),
        attribute_path = opts.attribute_path.as_deref().unwrap_or_default(),
        n_workers,
        runtime_only = opts.runtime_only,
        "starting extraction"
    );

    // One extra thread: the finder reader occupies a slot while the
    // discovery stream drains.
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers + 1)
        .thread_name(|i| format!("describer-{i}"))
        .build()
        .map_err(|e| NixtractError::Config(format!("failed to build worker pool: {e}")))?;

    let (records, sink) = OutputSink::spawn(writer, pretty);
    let crawler = Crawler {
        opts,
        programs: &programs,
        visited: VisitedSet::new(),
        records,
        status: status.clone(),
        described: AtomicUsize::new(0),
        failed: AtomicUsize::new(0),
    };

    let outcome = pool.scope(|scope| crawler.run(scope));

    let described = crawler.described.load(Ordering::Relaxed);
    let failed = crawler.failed.load(Ordering::Relaxed);
    // Dropping the crawler drops the last record sender, letting the sink
    // drain and flush.
    drop(crawler);
    let sink_result = sink.finish();
    status.emit(StatusEvent::Drained);

    outcome?;
    let written = sink_result?;

    info!(described, failed, written, "extraction drained");
    Ok(ExtractionSummary {
        described,
        failed,
        written,
    })
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Shared context of one crawl; borrowed by every pool task.
struct Crawler<'a> {
    opts: &'a ExtractionOpts,
    programs: &'a EvalPrograms,
    visited: VisitedSet,
    records: SyncSender<DerivationRecord>,
    status: StatusSender,
    described: AtomicUsize,
    failed: AtomicUsize,
}

impl Crawler<'_> {
    /// Seed the pool and drain the discovery stream. Runs as the scope
    /// body; by the time the scope returns every queued description has
    /// completed.
    fn run<'s>(&'s self, scope: &rayon::Scope<'s>) -> Result<()> {
        match self.opts.attribute_path.as_deref() {
            // With an explicit root the finder is skipped entirely; the
            // describer exposes the rest of the graph through its edges.
            Some(root) if !root.is_empty() => {
                self.submit(scope, root.to_owned());
                Ok(())
            }
            _ => self.run_finder(scope),
        }
    }

    fn run_finder<'s>(&'s self, scope: &rayon::Scope<'s>) -> Result<()> {
        let mut finder = FinderProcess::spawn(self.opts, self.programs)?;
        while let Some(found) = finder.next_found() {
            self.submit(scope, found.attribute_path);
        }
        let result = finder.finish();
        debug!(discovered = self.visited.len(), "finder stream ended");
        self.status.emit(StatusEvent::FinderDone);
        result
    }

    /// Queue `attribute_path` unless it is excluded or already claimed.
    fn submit<'s>(&'s self, scope: &rayon::Scope<'s>, attribute_path: String) {
        if self.is_excluded(&attribute_path) {
            debug!(attribute_path = %attribute_path, "skipping excluded attribute path");
            return;
        }
        if !self.visited.try_insert(&attribute_path) {
            return;
        }
        self.status.emit(StatusEvent::Queued {
            attribute_path: attribute_path.clone(),
        });
        scope.spawn(move |scope| self.process(scope, attribute_path));
    }

    /// Describe one work unit and feed newly discovered edges back into
    /// the pool. Failures are contained: one bad node must not poison the
    /// crawl.
    fn process<'s>(&'s self, scope: &rayon::Scope<'s>, attribute_path: String) {
        self.status.emit(StatusEvent::Started {
            attribute_path: attribute_path.clone(),
        });
        let started = Instant::now();

        match describer::describe(self.opts, self.programs, &attribute_path) {
            Ok(record) => {
                // Edges are submitted before the record is emitted, so a
                // streaming consumer never sees a node whose dependencies
                // are not at least queued.
                for input in &record.build_inputs {
                    if let Some(target) = input.attribute_path.as_deref()
                        && !target.is_empty()
                    {
                        self.submit(scope, target.to_owned());
                    }
                }

                debug!(
                    attribute_path = %record.attribute_path,
                    build_inputs = record.build_inputs.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "described derivation"
                );
                self.described.fetch_add(1, Ordering::Relaxed);
                self.status.emit(StatusEvent::Described {
                    attribute_path: attribute_path.clone(),
                });
                if self.records.send(record).is_err() {
                    // The sink is gone; its error surfaces when the run
                    // finishes.
                    debug!(attribute_path = %attribute_path, "output sink closed, dropping record");
                }
            }
            Err(e) => {
                warn!(attribute_path = %attribute_path, error = %e, "failed to describe derivation");
                self.failed.fetch_add(1, Ordering::Relaxed);
                self.status.emit(StatusEvent::Failed {
                    attribute_path,
                    kind: e.kind(),
                });
            }
        }
    }

    fn is_excluded(&self, attribute_path: &str) -> bool {
        self.opts.exclude.iter().any(|prefix| {
            attribute_path == prefix
                || (attribute_path.len() > prefix.len()
                    && attribute_path.starts_with(prefix.as_str())
                    && attribute_path.as_bytes()[prefix.len()] == b'.')
        })
    }
}
