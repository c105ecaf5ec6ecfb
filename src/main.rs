use clap::{CommandFactory, FromArgMatches};
use env_logger::Env;
use log::error;

use arcsift::cli::Cli;
use arcsift::config::JobConfig;
use arcsift::platform::{signal_exit_code, termination_signal, ExitCode, SignalHandler};
use arcsift::runner::run_job;
use arcsift::CancelToken;

fn main() {
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let default_level = if cli.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_level)).init();

    let cancel = CancelToken::new();
    let _signal_handler = match SignalHandler::install(cancel.clone()) {
        Ok(handler) => handler,
        Err(err) => {
            error!("cannot install signal handler: {:#}", err);
            ExitCode::GeneralError.exit();
        }
    };

    let stages = match cli.ordered_stages(&matches) {
        Ok(stages) => stages,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::InvalidUsage.exit();
        }
    };

    let config = match JobConfig::from_cli(&cli, stages) {
        Ok(config) => config,
        Err(err) => {
            error!("{:#}", err);
            ExitCode::InvalidUsage.exit();
        }
    };

    match run_job(&config, cancel) {
        Ok(report) => {
            if cli.stats {
                eprintln!("{}", report.stats.format_report());
            }
            if let Some(signal) = termination_signal() {
                signal_exit_code(signal).exit();
            }
            if report.completed {
                ExitCode::Success.exit();
            }
            ExitCode::GeneralError.exit();
        }
        Err(err) => {
            error!("{:#}", err);
            if let Some(signal) = termination_signal() {
                signal_exit_code(signal).exit();
            }
            ExitCode::GeneralError.exit();
        }
    }
}
