use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use native_bridge::{MemoryClipboard, NativeHost};
use tracing::info;

use super::context::CliContext;

#[derive(Args, Clone, Debug)]
pub struct NativeHostArgs {
    /// Extra directory `fs.readText` may read from (repeatable)
    #[arg(long = "root", value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Initial clipboard contents
    #[arg(long)]
    pub clipboard: Option<String>,
}

/// Serve the companion over stdin/stdout until the browser side closes it.
pub async fn cmd_native_host(args: NativeHostArgs, ctx: &CliContext) -> Result<()> {
    let mut config = ctx.config().native.clone();
    for root in args.roots {
        config = config.with_root(root);
    }
    let clipboard = match args.clipboard {
        Some(text) => MemoryClipboard::with_text(text),
        None => MemoryClipboard::new(),
    };
    let host = NativeHost::new(&config, Arc::new(clipboard));
    info!(
        roots = host.fs_policy().roots().len(),
        max_file_bytes = config.max_file_bytes,
        "Native host listening on stdio"
    );

    let served = host
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("Native host session failed")?;
    info!(served, "Native host finished");
    Ok(())
}
