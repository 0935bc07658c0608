//! WQI CLI - Command line tool for water quality index computation.

use clap::Parser;

#[derive(Parser)]
#[command(
    name = "wqi-cli",
    version,
    about = "Water quality index toolkit (HPI, MI, WQI)"
)]
struct Cli {
    #[command(flatten)]
    global: wqi_cmd::GlobalArgs,

    #[command(subcommand)]
    command: wqi_cmd::Command,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    log::debug!("[WQI] cli: starting");
    wqi_cmd::run(cli.command, &cli.global)
}
