mod artifact;
mod chain;
mod command_line;
mod contracts;
mod deploy;
mod record;
mod utils;
mod verify;

use std::process::ExitCode;

use clap::Parser;
use command_line::CommandLine;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();
    let cmd = CommandLine::parse();
    match cmd.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Deployment failed: {err:?}");
            ExitCode::FAILURE
        }
    }
}
