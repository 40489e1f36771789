//! Runs parsed trace commands against a simulated engine.

use anyhow::{Context, Result};
use pw_mmu::{
    BumpFrameAllocator, MmuError, PageTableEngine, Ppn, Pte, SimConfig, SimMemory, Vpn, WalkStep,
};
use serde::Serialize;
use std::fmt;
use std::io::Write;

use crate::trace::{Command, parse_trace};

type Engine = PageTableEngine<SimMemory, BumpFrameAllocator>;

/// One level of a `walk` report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub level: usize,
    pub table: u64,
    pub index: usize,
    /// `invalid`, `next` or `leaf`
    pub kind: &'static str,
    pub target: Option<u64>,
}

impl From<&WalkStep> for StepReport {
    fn from(step: &WalkStep) -> Self {
        let kind = match step.entry {
            Pte::Invalid => "invalid",
            Pte::NextLevel(_) => "next",
            Pte::Leaf(_) => "leaf",
        };
        Self {
            level: step.level,
            table: step.table.raw(),
            index: step.index,
            kind,
            target: step.entry.target().map(Ppn::raw),
        }
    }
}

/// Result of one command. `ppn: None` means no mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Outcome {
    Update { vpn: u64, ppn: Option<u64> },
    Map { vpn: u64, ppn: u64 },
    Unmap { vpn: u64 },
    Query { vpn: u64, ppn: Option<u64> },
    Walk { vpn: u64, steps: Vec<StepReport> },
    Stats { frames_allocated: u64, frames_materialized: usize },
}

fn ppn_text(ppn: Option<u64>) -> String {
    ppn.map_or_else(|| "none".to_string(), |p| format!("{p:#x}"))
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update { vpn, ppn } => write!(f, "update {vpn:#x} -> {}", ppn_text(*ppn)),
            Self::Map { vpn, ppn } => write!(f, "map {vpn:#x} -> {ppn:#x}"),
            Self::Unmap { vpn } => write!(f, "unmap {vpn:#x}"),
            Self::Query { vpn, ppn } => write!(f, "query {vpn:#x} = {}", ppn_text(*ppn)),
            Self::Walk { vpn, steps } => {
                write!(f, "walk {vpn:#x}:")?;
                for step in steps {
                    write!(
                        f,
                        " L{}[{:#x}@{}]={}",
                        step.level,
                        step.table,
                        step.index,
                        step.kind
                    )?;
                    if let Some(target) = step.target {
                        write!(f, ":{target:#x}")?;
                    }
                }
                Ok(())
            }
            Self::Stats {
                frames_allocated,
                frames_materialized,
            } => write!(
                f,
                "stats frames_allocated={frames_allocated} frames_materialized={frames_materialized}"
            ),
        }
    }
}

/// An engine plus the one root every command in a trace works on.
pub struct Session {
    engine: Engine,
    root: Ppn,
}

impl Session {
    /// Use `root` if given (treated as a zeroed table), else allocate one.
    pub fn new(config: SimConfig, root: Option<Ppn>) -> Result<Self> {
        let mut engine = Engine::simulated(config);
        let root = match root {
            Some(root) => root,
            None => engine.new_root().context("allocating root table")?,
        };
        Ok(Self { engine, root })
    }

    pub fn root(&self) -> Ppn {
        self.root
    }

    pub fn run(&mut self, command: Command) -> Result<Outcome, MmuError> {
        let root = self.root;
        let outcome = match command {
            Command::Update { vpn, ppn } => {
                self.engine.update(root, vpn, ppn)?;
                Outcome::Update {
                    vpn: vpn.raw(),
                    ppn: ppn.mapping().map(Ppn::raw),
                }
            }
            Command::Map { vpn, ppn } => {
                self.engine.map(root, vpn, ppn)?;
                Outcome::Map {
                    vpn: vpn.raw(),
                    ppn: ppn.raw(),
                }
            }
            Command::Unmap { vpn } => {
                self.engine.unmap(root, vpn)?;
                Outcome::Unmap { vpn: vpn.raw() }
            }
            Command::Query { vpn } => Outcome::Query {
                vpn: vpn.raw(),
                ppn: self.engine.translate(root, vpn).map(Ppn::raw),
            },
            Command::Walk { vpn } => Outcome::Walk {
                vpn: vpn.raw(),
                steps: self.walk_report(vpn),
            },
            Command::Stats => Outcome::Stats {
                frames_allocated: self.engine.frames().allocated(),
                frames_materialized: self.engine.memory().materialized(),
            },
        };
        Ok(outcome)
    }

    fn walk_report(&self, vpn: Vpn) -> Vec<StepReport> {
        self.engine
            .walk(self.root, vpn)
            .steps()
            .map(StepReport::from)
            .collect()
    }
}

/// Parse `text` and run every command, writing one line per outcome.
/// Stops at the first engine error.
pub fn run_trace<W: Write>(session: &mut Session, text: &str, out: &mut W, json: bool) -> Result<()> {
    for (lineno, command) in parse_trace(text)? {
        let outcome = session
            .run(command)
            .with_context(|| format!("line {lineno}: {command}"))?;
        if json {
            serde_json::to_writer(&mut *out, &outcome)?;
            writeln!(out)?;
        } else {
            writeln!(out, "{outcome}")?;
        }
    }
    out.flush()?;
    Ok(())
}
