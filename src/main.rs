//! mcp-git - Git MCP server with SSE transport

use anyhow::Result;
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;

/// Git MCP server with SSE transport
#[derive(Parser, Debug)]
#[command(name = "mcp-git")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a Git repository to validate and bind handlers to
    #[arg(long)]
    repository: Option<PathBuf>,

    /// TCP port for the SSE listener
    #[arg(long, default_value_t = 3001)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();

    // An operator interrupt is the one recovered condition: the serve loop
    // unwinds and the process exits without reporting an error.
    mcp_git::serve_sse(args.repository, args.port, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}
