use clap::Parser;
use training::{init_logging, process_run_config, run_prepare, run_stamp, RunConfig};

fn main() -> anyhow::Result<()> {
    init_logging()?;
    let cfg = process_run_config(RunConfig::parse(), &run_stamp())?;
    let report = run_prepare(&cfg)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
