use anyhow::Context;
use pipesh::config::{Args, Config};
use pipesh::reader::StreamReader;
use pipesh::{Session, Shell};
use std::io::{self, IsTerminal};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "PIPESH_LOG";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();
    let config = Config::from_args(args, io::stdin().is_terminal());
    let session = Session::from_env().context("read current directory")?;

    let mut shell = Shell::new(config, session);
    shell
        .repl(&mut StreamReader::stdin())
        .context("read loop failed")?;

    Ok(())
}
