//! Streaming consumption of the finder program.
//!
//! The finder reports discoveries as `trace:` lines on stderr while the
//! evaluation is still running; stdout carries no information and is
//! discarded. Lines that do not parse as a discovery batch are skipped, so
//! unrelated nixpkgs traces cannot derail the stream.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Lines};
use std::process::{Child, ChildStderr, Command, Stdio};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{NixtractError, Result};
use crate::extract::ExtractionOpts;
use crate::extract::programs::EvalPrograms;

/// One batch of discoveries, as traced by the finder.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundDrvs {
    pub found_drvs: Vec<FoundDrv>,
}

/// A top-level derivation reported by the finder.
///
/// `derivation_path` and `output_path` are best-effort: the finder yields
/// null for anything that fails to evaluate.
#[allow(dead_code)] // The store paths are part of the trace contract; the crawler keys on the attribute path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoundDrv {
    pub attribute_path: String,
    #[serde(default)]
    pub derivation_path: Option<String>,
    #[serde(default)]
    pub output_path: Option<String>,
}

/// Trailing stderr lines kept for the error report on a non-zero exit.
const STDERR_TAIL_LINES: usize = 20;

/// A running finder subprocess and its discovery stream.
pub struct FinderProcess {
    child: Child,
    lines: Lines<BufReader<ChildStderr>>,
    buffered: VecDeque<FoundDrv>,
    tail: VecDeque<String>,
}

impl FinderProcess {
    /// Spawn the finder for the configured flake.
    pub fn spawn(opts: &ExtractionOpts, programs: &EvalPrograms) -> Result<Self> {
        let mut command = Command::new(&opts.nix_bin);
        command
            .arg("eval")
            .args(["--json", "--impure", "--file"])
            .arg(programs.finder())
            .arg("-I")
            .arg(programs.lib_include())
            .args(["--extra-experimental-features", "nix-command flakes"])
            .env("TARGET_FLAKE_REF", &opts.flake_ref)
            .env("NIXPKGS_ALLOW_UNFREE", "1")
            .env("NIXPKGS_ALLOW_INSECURE", "1")
            .env("NIXPKGS_ALLOW_BROKEN", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        if let Some(system) = &opts.system {
            command.env("TARGET_SYSTEM", system);
        }
        if opts.offline {
            command.arg("--offline");
        }

        let child = command.spawn().map_err(NixtractError::Spawn)?;
        Self::from_child(child)
    }

    /// Wrap an already spawned child whose stderr is piped.
    pub(crate) fn from_child(mut child: Child) -> Result<Self> {
        let stderr = child.stderr.take().ok_or_else(|| {
            NixtractError::Spawn(std::io::Error::other("finder stderr was not captured"))
        })?;
        Ok(Self {
            child,
            lines: BufReader::new(stderr).lines(),
            buffered: VecDeque::new(),
            tail: VecDeque::new(),
        })
    }

    /// Next discovered derivation, in stream order. Returns None when the
    /// finder's stderr is exhausted; the exit status is checked separately
    /// by [`finish`](Self::finish).
    pub fn next_found(&mut self) -> Option<FoundDrv> {
        loop {
            if let Some(found) = self.buffered.pop_front() {
                return Some(found);
            }

            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    warn!(error = %e, "failed to read finder stderr");
                    return None;
                }
            };
            self.push_tail(&line);

            let Some(payload) = line.strip_prefix("trace: ") else {
                // Ordinary evaluator chatter (warnings, fetch progress).
                debug!(target: "nixtract::finder", "{}", line);
                continue;
            };
            match serde_json::from_str::<FoundDrvs>(payload) {
                Ok(batch) => self.buffered.extend(batch.found_drvs),
                Err(e) => {
                    warn!(error = %e, line = %line, "skipping unparseable finder trace line");
                }
            }
        }
    }

    /// Wait for the finder to exit. A non-zero status is an evaluation
    /// failure carrying the retained stderr tail.
    pub fn finish(mut self) -> Result<()> {
        let status = self.child.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(NixtractError::Eval {
                attribute_path: None,
                code: status.code(),
                stderr: self.tail.iter().cloned().collect::<Vec<_>>().join("\n"),
            })
        }
    }

    fn push_tail(&mut self, line: &str) {
        if self.tail.len() == STDERR_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_owned());
    }
}
