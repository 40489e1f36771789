//! Trace file parsing.
//!
//! One command per line. `#` starts a comment, blank lines are skipped.

use anyhow::{Context, Result, anyhow, bail};
use pw_mmu::{NO_MAPPING, Ppn, Vpn};
use pw_utils::num::parse_u64;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// `update <vpn> <ppn|none>`
    Update { vpn: Vpn, ppn: Ppn },
    /// `map <vpn> <ppn>`
    Map { vpn: Vpn, ppn: Ppn },
    /// `unmap <vpn>`
    Unmap { vpn: Vpn },
    /// `query <vpn>`
    Query { vpn: Vpn },
    /// `walk <vpn>`
    Walk { vpn: Vpn },
    /// `stats`
    Stats,
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update { vpn, ppn } => write!(f, "update {vpn} {ppn}"),
            Self::Map { vpn, ppn } => write!(f, "map {vpn} {ppn}"),
            Self::Unmap { vpn } => write!(f, "unmap {vpn}"),
            Self::Query { vpn } => write!(f, "query {vpn}"),
            Self::Walk { vpn } => write!(f, "walk {vpn}"),
            Self::Stats => f.write_str("stats"),
        }
    }
}

fn number(word: Option<&str>, what: &str) -> Result<u64> {
    let word = word.ok_or_else(|| anyhow!("missing {what}"))?;
    parse_u64(word).ok_or_else(|| anyhow!("bad {what} `{word}`"))
}

fn ppn_or_none(word: Option<&str>) -> Result<Ppn> {
    match word {
        Some("none") => Ok(NO_MAPPING),
        other => number(other, "ppn").map(Ppn::new),
    }
}

/// Parse one line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.split('#').next().unwrap_or_default().trim();
    let mut words = line.split_whitespace();
    let Some(op) = words.next() else {
        return Ok(None);
    };

    let command = match op {
        "update" => Command::Update {
            vpn: Vpn::new(number(words.next(), "vpn")?),
            ppn: ppn_or_none(words.next())?,
        },
        "map" => Command::Map {
            vpn: Vpn::new(number(words.next(), "vpn")?),
            ppn: Ppn::new(number(words.next(), "ppn")?),
        },
        "unmap" => Command::Unmap {
            vpn: Vpn::new(number(words.next(), "vpn")?),
        },
        "query" => Command::Query {
            vpn: Vpn::new(number(words.next(), "vpn")?),
        },
        "walk" => Command::Walk {
            vpn: Vpn::new(number(words.next(), "vpn")?),
        },
        "stats" => Command::Stats,
        other => bail!("unknown command `{other}`"),
    };

    if let Some(extra) = words.next() {
        bail!("unexpected `{extra}` after {op}");
    }
    Ok(Some(command))
}

/// Parse a whole trace into `(line number, command)` pairs, 1-based.
pub fn parse_trace(text: &str) -> Result<Vec<(usize, Command)>> {
    let mut commands = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let lineno = n + 1;
        if let Some(command) = parse_line(line).with_context(|| format!("line {lineno}"))? {
            commands.push((lineno, command));
        }
    }
    Ok(commands)
}
