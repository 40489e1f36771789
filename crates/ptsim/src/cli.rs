use anyhow::{Result, bail};
use clap::{Parser, ValueEnum};
use log::LevelFilter;
use pw_mmu::{Ppn, SimConfig};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn filter(self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "ptsim")]
#[command(about = "Replay page table update/query traces against simulated physical memory")]
pub struct Cli {
    /// Trace file, one command per line. Reads stdin when omitted or `-`.
    ///
    /// Commands: update <vpn> <ppn|none>, map <vpn> <ppn>, unmap <vpn>,
    /// query <vpn>, walk <vpn>, stats. Numbers are decimal or 0x hex.
    pub trace: Option<PathBuf>,

    /// Maximum number of frames the simulated allocator hands out
    /// (the root counts when it is allocated).
    #[arg(long)]
    pub frames: Option<u64>,

    /// Frame to use as the (zeroed) root table. Table frames are then
    /// allocated above it. A fresh root is allocated when omitted.
    #[arg(long, value_parser = parse_number)]
    pub root: Option<u64>,

    /// Print one JSON object per command instead of text.
    #[arg(long)]
    pub json: bool,

    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    pub log_level: LogLevel,
}

impl Cli {
    pub fn root_frame(&self) -> Option<Ppn> {
        self.root.map(Ppn::new)
    }

    /// Allocator configuration. With an explicit root, frames start right
    /// after it so the allocator never hands the root out again.
    pub fn sim_config(&self) -> Result<SimConfig> {
        let mut config = SimConfig::new();
        if let Some(root) = self.root_frame() {
            if !root.fits_entry() {
                bail!("root frame {root:#x} does not fit a page table entry");
            }
            config = config.with_first_frame((root.raw() + 1).max(config.first_frame));
        }
        if let Some(limit) = self.frames {
            config = config.with_frame_limit(limit);
        }
        Ok(config)
    }
}

fn parse_number(text: &str) -> Result<u64, String> {
    pw_utils::num::parse_u64(text).ok_or_else(|| format!("not a number: {text}"))
}
