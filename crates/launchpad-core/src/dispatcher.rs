//! Foundation dispatcher: the single writer of the network context.
//!
//! `create_context` walks `idle -> launching -> providers-connecting -> ready`, and `destroy`
//! walks `ready -> destroying -> destroyed`. A launch that fails at any step runs the same
//! cleanup as `destroy` before the error is returned, so no process outlives a failed launch.

use std::time::Duration;

use error_stack::Report;
use futures::future::join_all;
use hiro_system_kit::slog;

use crate::context::{LifecycleState, NetworkContext};
use crate::foundations::{self, plan_launch};
use crate::providers::{self, populate};
use crate::supervisor::Supervisor;
use crate::types::{
    Environment, FoundationKind, GlobalConfig, LaunchpadError, LaunchpadErrorExt, LaunchpadResult,
};
use crate::utils::Context;

pub struct Dispatcher {
    config: GlobalConfig,
    worker_id: Option<u16>,
    wss_url: Option<String>,
    supervisor: Supervisor,
    context: Option<NetworkContext>,
    state: LifecycleState,
    ctx: Context,
}

impl Dispatcher {
    pub fn new(config: GlobalConfig, ctx: &Context) -> Self {
        Dispatcher {
            config,
            worker_id: None,
            wss_url: None,
            supervisor: Supervisor::new(),
            context: None,
            state: LifecycleState::Idle,
            ctx: ctx.clone(),
        }
    }

    pub fn with_worker_id(mut self, worker_id: Option<u16>) -> Self {
        self.worker_id = worker_id;
        self
    }

    /// Endpoint used by providers declared with the `ENV_VAR` placeholder.
    pub fn with_wss_url(mut self, wss_url: Option<String>) -> Self {
        self.wss_url = wss_url;
        self
    }

    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn live_node_count(&self) -> usize {
        self.supervisor.live_count()
    }

    /// The running network. Querying it before `create_context` completes is a defect.
    pub fn context(&self) -> LaunchpadResult<&NetworkContext> {
        match (&self.context, self.state) {
            (Some(context), LifecycleState::Ready) => Ok(context),
            _ => Err(launchpad_error!(
                LaunchpadError::ConfigDefect,
                "network context queried before it was created"
            ))
            .with_lifecycle_info(self.state),
        }
    }

    pub async fn create_context(&mut self, environment_name: &str) -> LaunchpadResult<&NetworkContext> {
        if self.state.is_active() {
            return Err(launchpad_error!(
                LaunchpadError::ConfigDefect,
                "a network context already exists, destroy it before creating '{}'",
                environment_name
            ))
            .with_lifecycle_info(self.state);
        }
        let environment = self.config.environment(environment_name)?.clone();

        self.state = LifecycleState::Launching;
        self.context = Some(NetworkContext::new(environment.clone(), self.worker_id));
        if let Err(report) = self.launch(&environment).await {
            self.ctx.try_log(|logger| {
                slog::warn!(logger, "aborting launch of '{}', tearing down", environment.name)
            });
            self.destroy().await;
            return Err(report);
        }
        self.state = LifecycleState::Ready;
        self.ctx.try_log(|logger| slog::info!(logger, "environment '{}' ready", environment.name));
        self.context()
    }

    async fn launch(&mut self, environment: &Environment) -> LaunchpadResult<()> {
        let launch_timeout = Duration::from_millis(self.config.launch_timeout);
        for plan in plan_launch(&environment.foundation, self.worker_id) {
            self.ctx.try_log(|logger| slog::debug!(logger, "launching {}: {}", plan.name, plan.command));
            let mut node = self.supervisor.start(&plan, &self.ctx)?;
            let readiness = self
                .supervisor
                .await_readiness(&mut node, &plan.readiness, launch_timeout, &self.ctx)
                .await;
            self.context_mut()?.push_node(node);
            readiness?;
        }

        self.state = LifecycleState::ProvidersConnecting;
        let declarations = if environment.connections.is_empty() {
            foundations::default_connections(&environment.foundation, self.worker_id)
        } else {
            environment.connections.clone()
        };
        let tolerate_unreachable = environment.foundation.kind() == FoundationKind::ReadOnly;

        let mut prepared = vec![];
        for declaration in declarations.iter() {
            match providers::prepare(declaration, self.wss_url.as_deref()) {
                Ok(provider) => {
                    self.ctx.try_log(|logger| {
                        slog::debug!(logger, "prepared provider {} at {}", provider.name, provider.endpoint)
                    });
                    prepared.push(provider);
                }
                Err(report) if tolerate_unreachable => self.tolerate(report),
                Err(report) => return Err(report),
            }
        }

        let connect_timeout = Duration::from_millis(self.config.connect_timeout);
        let ctx = self.ctx.clone();
        let connections =
            join_all(prepared.into_iter().map(|provider| populate(provider, connect_timeout, &ctx)))
                .await;

        let mut first_failure: Option<Report<LaunchpadError>> = None;
        for connection in connections {
            match connection {
                Ok(handle) => self.context_mut()?.push_provider(handle),
                Err(report) if tolerate_unreachable => self.tolerate(report),
                Err(report) => {
                    if first_failure.is_none() {
                        first_failure = Some(report);
                    }
                }
            }
        }
        match first_failure {
            Some(report) => Err(report),
            None => Ok(()),
        }
    }

    fn tolerate(&self, report: Report<LaunchpadError>) {
        self.ctx.try_log(|logger| {
            slog::warn!(logger, "continuing without provider: {:?}", report)
        });
    }

    /// Disconnects every provider then stops every node. Never fails and may be called repeatedly.
    pub async fn destroy(&mut self) {
        if self.context.is_none() && self.supervisor.live_count() == 0 {
            if self.state != LifecycleState::Idle {
                self.state = LifecycleState::Destroyed;
            }
            return;
        }
        self.state = LifecycleState::Destroying;
        if let Some(context) = self.context.as_mut() {
            for provider in context.providers_mut().iter_mut() {
                provider.disconnect(&self.ctx);
            }
        }
        self.supervisor.stop_all(&self.ctx).await;
        self.supervisor = Supervisor::new();
        if let Some(context) = self.context.take() {
            self.ctx.try_log(|logger| {
                slog::info!(logger, "environment '{}' destroyed", context.environment_name())
            });
        }
        self.state = LifecycleState::Destroyed;
    }

    fn context_mut(&mut self) -> LaunchpadResult<&mut NetworkContext> {
        let state = self.state;
        match self.context.as_mut() {
            Some(context) => Ok(context),
            None => Err(launchpad_error!(
                LaunchpadError::ConfigDefect,
                "no network context under construction"
            ))
            .with_lifecycle_info(state),
        }
    }
}
