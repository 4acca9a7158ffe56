mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod resource;
mod ui;

use anyhow::{Context as AnyhowContext, Result};
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConnectionArgs};
use declarative::{PollOptions, Report};
use dsclient::Client;
use resource::Session;
use resource::host::{self, HostAdapter};
use resource::host_group::{self, HostGroupAdapter};
use resource::volume::{self, VolumeAdapter};
use resource::volume_set::{self, VolumeSetAdapter};
use serde::Serialize;
use serde_json::{Value, json};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::process::ExitCode;
use std::time::Duration;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    pub poll: PollOptions,
}

/// Environment variable naming a file that receives debug logs.
const ENV_LOGFILE: &str = "LOGFILE";

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let quiet = cli.quiet;
    let pretty = cli.pretty;

    match run(cli) {
        Ok(None) => ExitCode::SUCCESS,
        Ok(Some(report)) => {
            if !quiet && !report.msg.is_empty() {
                if report.changed {
                    ui::success(&report.msg);
                } else {
                    ui::info(&report.msg);
                }
            }
            match print_json(&report, pretty) {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    ui::error(&format!("{:#}", e));
                    ExitCode::FAILURE
                }
            }
        }
        Err(err) => {
            let failure = failure_report(&err);
            if !quiet {
                ui::error(failure["msg"].as_str().unwrap_or_default());
            }
            log::debug!("{:?}", err);
            if let Err(e) = print_json(&failure, pretty) {
                log::error!("Could not write failure report: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

/// `{"failed": true, "changed": false, "msg": "<error>; <cause>…"}`
fn failure_report(err: &anyhow::Error) -> Value {
    let msg = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    json!({"failed": true, "changed": false, "msg": msg})
}

fn run(cli: Cli) -> Result<Option<Report>> {
    let ctx = Context {
        quiet: cli.quiet,
        poll: poll_options(cli.poll_interval, cli.poll_attempts),
    };

    let report = match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "greenlake", &mut io::stdout());
            return Ok(None);
        }
        Command::Host(args) => {
            let desired = commands::apply::desired_state(&args.target, &host::SCHEMA)?;
            let session = connect(&cli.connection)?;
            let adapter = HostAdapter::new(&session);
            commands::apply::run(&ctx, &session, &adapter, &desired, args.state.into())?
        }
        Command::HostGroup(args) => {
            let desired = commands::apply::desired_state(&args.target, &host_group::SCHEMA)?;
            let session = connect(&cli.connection)?;
            let adapter = HostGroupAdapter::new(&session);
            commands::apply::run(&ctx, &session, &adapter, &desired, args.state.into())?
        }
        Command::Volume(args) => {
            let resource = args.resource;
            let desired = commands::apply::desired_state(&resource.target, &volume::SCHEMA)?;
            let session = connect(&cli.connection)?;
            let adapter = VolumeAdapter::new(&session, args.system_id);
            commands::apply::run(&ctx, &session, &adapter, &desired, resource.state.into())?
        }
        Command::VolumeSet(args) => {
            volume_set::check_device_type(args.device_type)?;
            let desired = commands::apply::desired_state(&args.target, &volume_set::SCHEMA)?;
            let session = connect(&cli.connection)?;
            let adapter = VolumeSetAdapter::new(&session, args.system_id, args.device_type)?;
            commands::apply::run(&ctx, &session, &adapter, &desired, args.state.into())?
        }
        Command::Facts(args) => {
            let session = connect(&cli.connection)?;
            commands::facts::run(&session, &args)?
        }
    };

    Ok(Some(report))
}

/// Initialize logging based on verbosity, or to `$LOGFILE` when set.
fn init_logging(verbose: u8, quiet: bool) {
    let log_level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();

    if let Some(file) = std::env::var_os(ENV_LOGFILE)
        .and_then(|path| OpenOptions::new().create(true).append(true).open(path).ok())
    {
        builder
            .filter_level(log_level.max(log::LevelFilter::Debug))
            .format_timestamp_secs()
            .target(env_logger::Target::Pipe(Box::new(file)));
    } else {
        builder
            .filter_level(if quiet {
                log::LevelFilter::Error
            } else {
                log_level
            })
            .format_timestamp(None);
    }

    builder.init();
}

fn poll_options(interval: Option<u64>, attempts: Option<u32>) -> PollOptions {
    let mut options = PollOptions::new();
    if let Some(secs) = interval {
        options = options.interval(Duration::from_secs(secs));
    }
    if let Some(attempts) = attempts {
        options = options.max_attempts(attempts);
    }
    options
}

fn connect(args: &ConnectionArgs) -> Result<Session> {
    let conn = config::resolve_connection(args)?;
    log::debug!("Resolved {:?}", conn.credentials);
    let client = Client::connect(&conn.credentials, &conn.options)
        .with_context(|| format!("Could not connect to {}", conn.credentials.host))?;
    Ok(Session::new(client))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    write_json(&mut io::stdout().lock(), value, pretty)
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut *out, value)
    } else {
        serde_json::to_writer(&mut *out, value)
    }
    .context("Could not write JSON report")?;
    writeln!(out).context("Could not write JSON report")?;
    out.flush().context("Could not flush stdout")
}
