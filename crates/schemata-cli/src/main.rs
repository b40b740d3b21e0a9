use anyhow::Context;
use clap::Parser;
use schemata_cli::{CliArgs, SchemataCli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let cli = SchemataCli::from_args("schemata", &args).context("failed to load configuration")?;
    cli.run(args).await?;
    Ok(())
}
