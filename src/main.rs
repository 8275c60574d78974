// src/main.rs

use std::process::ExitCode;

use sdaflow::errors::exit_status;
use sdaflow::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("sdaflow: {err:#}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("sdaflow error: {err:?}");
            ExitCode::from(exit_status(&err))
        }
    }
}
