use clap::{ArgAction, Args, Parser, Subcommand};
use error_stack::Report;
use hiro_system_kit::{self, slog};
use launchpad_core::types::errors::EnvironmentInfo;
use launchpad_core::types::DEFAULT_CONFIG_FILE;
use launchpad_core::Context;
use std::process;

#[macro_use]
mod errors;
mod config;
mod env;
mod network;

use errors::CliError;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(flatten)]
    globals: GlobalOpts,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, PartialEq, Clone, Debug)]
pub struct GlobalOpts {
    /// Path to the launchpad config file (.json, .yml or .yaml)
    #[arg(long = "config-file", short = 'c', global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config_file: String,
    /// Worker identity used to derive non-conflicting ports (overrides LAUNCHPAD_WORKER_ID)
    #[arg(long = "worker-id", global = true)]
    pub worker_id: Option<u16>,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Launch an environment's network and keep it running until Ctrl-C
    #[clap(name = "run", bin_name = "run")]
    Run(RunEnvironment),
    /// Run an environment's test suites against its network
    #[clap(name = "test", bin_name = "test")]
    Test(TestEnvironment),
    /// List the environments defined in the config file
    #[clap(name = "list", bin_name = "list")]
    List(ListEnvironments),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct RunEnvironment {
    /// Name of the environment as defined in the config file
    pub environment: String,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct TestEnvironment {
    /// Name of the environment as defined in the config file
    pub environment: String,
    /// Only run tests whose name matches this pattern
    pub grep: Option<String>,
    /// Run test files one at a time even when the environment allows threads
    #[arg(long = "single-thread", action = ArgAction::SetTrue)]
    pub single_thread: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ListEnvironments;

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context { logger: Some(logger), tracer: false };

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    match hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        Ok(exit_code) => process::exit(exit_code),
        Err(report) => {
            report_error(&report, &ctx);
            std::thread::sleep(std::time::Duration::from_millis(500));
            process::exit(1);
        }
    }
}

fn report_error(report: &Report<CliError>, ctx: &Context) {
    ctx.try_log(|logger| slog::error!(logger, "{:?}", report));
    eprintln!("{}", format_err!(report.current_context().to_string()));
    if let Some(info) = report.downcast_ref::<EnvironmentInfo>() {
        eprintln!("{}", format_note!(info.to_string()));
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<i32, Report<CliError>> {
    match &opts.command {
        Command::Run(cmd) => network::handle_run_command(cmd, &opts.globals, ctx).await,
        Command::Test(cmd) => network::handle_test_command(cmd, &opts.globals, ctx).await,
        Command::List(cmd) => network::handle_list_command(cmd, &opts.globals, ctx),
    }
}
