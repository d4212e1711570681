use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tabpilot_cli::cli::app::run().await
}
