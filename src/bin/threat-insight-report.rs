mod cli;
mod executor;

use std::process::ExitCode;

use clap::Parser;
use env_logger::Builder;
use log::{error, info, trace};
use tokio::task;

use threat_insight_report::{
    config::Credentials,
    input::StdinPrompt,
    resolver::{HttpTransport, Resolver, ThreadPause},
};

use cli::Cli;
use executor::Executor;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    Builder::new().filter_level(cli.loglevel.into()).init();

    let Some(credentials) = Credentials::from_values(cli.api_key.clone(), cli.context.clone())
    else {
        error!("API_KEY or CONTEXT is not set in the environment.");
        return ExitCode::FAILURE;
    };

    // Requests, backoff and the operator prompt all block, keep them off the runtime threads
    trace!("Starting worker thread");
    let r = task::spawn_blocking(move || run_job(&cli, &credentials)).await;
    match r {
        Ok(Ok(())) => ExitCode::SUCCESS,
        Ok(Err(())) => {
            error!("Run completed with errors");
            ExitCode::FAILURE
        }
        Err(_) => {
            error!("Task panicked, aborting...");
            ExitCode::FAILURE
        }
    }
}

fn run_job(cli: &Cli, credentials: &Credentials) -> Result<(), ()> {
    let config = cli.resolver_config();
    let transport = match HttpTransport::try_new(&config, credentials) {
        Ok(t) => t,
        Err(e) => {
            error!("Unable to create HTTP client: {}", e);
            return Err(());
        }
    };
    if !config.verify_tls {
        info!("TLS certificate verification is disabled");
    }

    let pause = ThreadPause;
    let resolver = Resolver::new(&transport, &pause, config);
    let executor = Executor::new(
        &StdinPrompt,
        resolver,
        cli.input.to_owned(),
        cli.output.to_owned(),
    );

    match executor.run() {
        Ok(r) => {
            info!(
                "Completed: {} rows written to {}, {} invalid entries skipped, {} of {} batches failed",
                r.rows,
                cli.output.display(),
                r.invalid.len(),
                r.summary.failed,
                r.summary.batches
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(())
        }
    }
}
