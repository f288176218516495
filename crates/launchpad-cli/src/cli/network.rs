use std::future::Future;

use error_stack::{Report, ResultExt};
use hiro_system_kit::slog;
use launchpad_core::runner::{run_environment_tests, CommandTestRunner, TestRequest};
use launchpad_core::types::GlobalConfig;
use launchpad_core::{Context, Dispatcher, NetworkContext, ServicePort};

use super::config::load_config;
use super::env::LaunchpadEnv;
use super::errors::{CliError, IntoCliError};
use super::{GlobalOpts, ListEnvironments, RunEnvironment, TestEnvironment};

pub const POLKADOT_APPS_URL: &str = "https://polkadot.js.org/apps/?rpc=";

fn dispatcher_for(config: GlobalConfig, env: &LaunchpadEnv, ctx: &Context) -> Dispatcher {
    Dispatcher::new(config, ctx)
        .with_worker_id(Some(env.worker_id))
        .with_wss_url(env.wss_url.clone())
}

pub async fn handle_run_command(
    cmd: &RunEnvironment,
    globals: &GlobalOpts,
    ctx: &Context,
) -> Result<i32, Report<CliError>> {
    let config = load_config(&globals.config_file)?;
    let env = LaunchpadEnv::load().with_worker_id_override(globals.worker_id);
    let mut dispatcher = dispatcher_for(config, &env, ctx);

    let (interrupt_tx, mut interrupt_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        if let Err(_e) = interrupt_tx.send(()) {
            std::process::exit(1);
        }
    })
    .change_context(CliError::LaunchError)
    .attach_printable("unable to install the Ctrl-C handler")?;

    println!("{} environment {}", purple!("Launching"), cmd.environment);
    let interrupted = async {
        let _ = interrupt_rx.recv().await;
    };
    if !launch_or_interrupt(&mut dispatcher, &cmd.environment, interrupted, ctx).await? {
        println!("{}", format_warn!("interrupted during launch, network torn down"));
        return Ok(1);
    }

    let context = dispatcher.context().into_cli_error()?;
    let ports = context.service_ports();
    println!(
        "{} {} ready on worker {}, {} exposed",
        green!("✓"),
        context.environment_name(),
        context.worker_id().unwrap_or_default(),
        pluralize!(ports.len(), "port")
    );
    for name in unreachable_providers(context) {
        println!(
            "{}",
            format_warn!(format!("provider '{}' unreachable, continuing without it", name))
        );
    }
    print_service_ports(&ports);

    println!("{}", black!("Press Ctrl-C to stop the network"));
    let _ = interrupt_rx.recv().await;

    ctx.try_log(|logger| slog::info!(logger, "interrupted, tearing down '{}'", cmd.environment));
    dispatcher.destroy().await;
    println!("{} Goodbye!", green!("✓"));
    Ok(0)
}

/// Launches `environment` unless `interrupted` resolves first, in which case whatever was
/// already spawned is torn down. Returns whether the network is up.
async fn launch_or_interrupt(
    dispatcher: &mut Dispatcher,
    environment: &str,
    interrupted: impl Future<Output = ()>,
    ctx: &Context,
) -> Result<bool, Report<CliError>> {
    let launched = tokio::select! {
        biased;
        result = dispatcher.create_context(environment) => Some(result.map(|_| ())),
        _ = interrupted => None,
    };
    match launched {
        Some(result) => result.into_cli_error().map(|_| true),
        None => {
            ctx.try_log(|logger| {
                slog::warn!(logger, "interrupted while launching '{}', tearing down", environment)
            });
            dispatcher.destroy().await;
            Ok(false)
        }
    }
}

/// Declared providers a read-only network came up without.
fn unreachable_providers(context: &NetworkContext) -> Vec<String> {
    context
        .environment()
        .connections
        .iter()
        .filter(|declaration| context.provider(&declaration.name).is_none())
        .map(|declaration| declaration.name.clone())
        .collect()
}

pub fn print_service_ports(ports: &[ServicePort]) {
    for port in ports.iter() {
        let endpoint = format!("ws://127.0.0.1:{}", port.port);
        println!("{:<35}\t{}", port.name, blue!("{}", endpoint));
        println!("{:<35}\t{}", "", black!("{}{}", POLKADOT_APPS_URL, endpoint));
    }
}

pub async fn handle_test_command(
    cmd: &TestEnvironment,
    globals: &GlobalOpts,
    ctx: &Context,
) -> Result<i32, Report<CliError>> {
    let config = load_config(&globals.config_file)?;
    let env = LaunchpadEnv::load().with_worker_id_override(globals.worker_id);
    let runner = CommandTestRunner::new(config.test_runner.clone());
    let mut dispatcher = dispatcher_for(config, &env, ctx);

    let request = TestRequest {
        environment: &cmd.environment,
        worker_id: env.worker_id,
        single_thread: cmd.single_thread || env.single_thread,
        grep: cmd.grep.as_deref(),
    };
    let exit_code =
        run_environment_tests(&mut dispatcher, &runner, request, ctx).await.into_cli_error()?;

    if exit_code == 0 {
        println!("{} {} passed", green!("✓"), cmd.environment);
    } else {
        println!("{} {} failed", red!("x"), cmd.environment);
    }
    Ok(exit_code)
}

pub fn handle_list_command(
    _cmd: &ListEnvironments,
    globals: &GlobalOpts,
    _ctx: &Context,
) -> Result<i32, Report<CliError>> {
    let config = load_config(&globals.config_file)?;
    println!("{} ({})", config.label, pluralize!(config.environments.len(), "environment"));
    for line in environment_table(&config) {
        println!("{}", line);
    }
    Ok(0)
}

fn environment_table(config: &GlobalConfig) -> Vec<String> {
    config
        .environments
        .iter()
        .map(|environment| {
            format!(
                "{:<35}\t{:<20}\t{}",
                environment.name,
                environment.foundation.kind().to_string(),
                environment.description.as_deref().unwrap_or("")
            )
        })
        .collect()
}
