use std::process::ExitCode;

use anyhow::Result;
use clap::Parser as ClapParser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;

use cli::StrictFailure;
use cli::command::{Cli, Commands, LogFormat};
use cli::info::cmd_info;
use cli::select::cmd_select;

mod cli;
mod input;

/// Exit status of a run stopped by `--strict`.
const EXIT_STRICT_FAILURE: u8 = 3;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let multi = MultiProgress::new();

    if let Err(e) = init_logger(&cli, &multi) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    let pb = cli.progress.then_some(&multi);
    let result = match cli.command {
        Commands::Info(ref args) => cmd_info(args, &cli, pb),
        Commands::Select(ref args) => cmd_select(args, &cli, pb),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e:#}");
            ExitCode::from(exit_status(&e))
        }
    }
}

fn init_logger(cli: &Cli, multi: &MultiProgress) -> Result<()> {
    let mut env_builder = env_logger::Builder::from_default_env();
    env_builder.filter_level(cli.loglevel.to_level_filter());
    match cli.log_format {
        LogFormat::Plain => {
            env_builder.format_timestamp_secs();
        }
        LogFormat::Json => {
            env_builder.format(|buf, record| {
                use std::io::Write;
                writeln!(
                    buf,
                    "{{\"ts\":{},\"lvl\":\"{}\",\"msg\":{:?}}}",
                    buf.timestamp(),
                    record.level(),
                    record.args().to_string()
                )
            });
        }
    }

    // progress bars and log lines share the terminal
    if cli.progress {
        let logger = env_builder.build();
        LogWrapper::new(multi.clone(), logger).try_init()?;
    } else {
        env_builder.try_init()?;
    }

    Ok(())
}

fn exit_status(error: &anyhow::Error) -> u8 {
    if error.downcast_ref::<StrictFailure>().is_some() {
        EXIT_STRICT_FAILURE
    } else {
        1
    }
}
