use anyhow::{Context, Result};
use clap::Parser;
use std::io::Read;

mod cli;
mod logger;
mod replay;
mod trace;

fn main() -> Result<()> {
    let cli = crate::cli::Cli::parse();
    crate::logger::init(cli.log_level.filter())?;

    let text = match cli.trace.as_deref() {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("reading trace {}", path.display()))?,
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("reading trace from stdin")?;
            text
        }
    };

    let mut session = crate::replay::Session::new(cli.sim_config()?, cli.root_frame())?;
    log::info!("replaying against root {:#x}", session.root());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    crate::replay::run_trace(&mut session, &text, &mut out, cli.json)
}
