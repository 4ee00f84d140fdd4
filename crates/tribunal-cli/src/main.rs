use clap::Parser;

mod cli;
pub mod exit_codes;
mod logging;

use cli::args::{Cli, Command};
use cli::commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();
    let verbose = matches!(&cli.cmd, Command::Run(args) if args.verbose);
    logging::init_tracing(cli.log_json, verbose);
    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("fatal: {e:#}");
            exit_codes::CONFIG_ERROR
        }
    };
    std::process::exit(code);
}
