use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::{Cli, Command};

/// `-v` count to log filter; alerts are warnings, so they show by default
fn log_filter(verbose: u8) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

// One thread: inbound events, buffer updates and redraws never overlap.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log_filter(cli.verbose))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let code = match cli.command {
        Command::Watch(args) => commands::watch::execute(args).await,
        Command::Render(args) => commands::render::execute(args),
        Command::Health(args) => commands::health::execute(args).await,
    };
    std::process::exit(code);
}
