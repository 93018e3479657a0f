mod cli;

use clap::Parser;
use cli::DemoOptions;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let options = DemoOptions::parse();
    cli::run(&options)
}
