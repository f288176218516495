//! Process supervision for launched network nodes.
//!
//! The [`Supervisor`] is the only owner of spawned [`Child`] processes. Callers receive a
//! [`NodeView`], a read-only description of the node that can subscribe to its output but
//! cannot terminate it.

use std::fmt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use error_stack::Report;
use hiro_system_kit::slog;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::foundations::topology::discover_endpoint;
use crate::foundations::{EndpointWatch, LaunchCommand, LaunchPlan, Readiness};
use crate::types::{LaunchpadError, LaunchpadErrorExt, LaunchpadResult};
use crate::utils::Context;

pub const STOP_GRACE_PERIOD: Duration = Duration::from_secs(5);
const LOG_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub node: String,
    pub stream: LogStream,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEndpoint {
    pub chain: String,
    pub url: String,
}

/// Read-only description of a supervised node.
#[derive(Debug, Clone)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub command: LaunchCommand,
    pub pid: Option<u32>,
    /// Sub-node endpoints discovered for topology launches.
    pub endpoints: Vec<ChainEndpoint>,
    logs: broadcast::Sender<LogLine>,
}

impl NodeView {
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogLine> {
        self.logs.subscribe()
    }
}

impl fmt::Display for NodeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{} (pid {})", self.name, pid),
            None => write!(f, "{}", self.name),
        }
    }
}

struct SupervisedProcess {
    name: String,
    command: LaunchCommand,
    pid: Option<u32>,
    child: Option<Child>,
    readiness_rx: Option<broadcast::Receiver<LogLine>>,
    forwarders: Vec<JoinHandle<()>>,
}

/// Tracks output lines until a [`Readiness`] condition holds.
pub struct ReadinessTracker {
    markers: Vec<String>,
    occurrences: usize,
    seen: usize,
    watches: Vec<EndpointWatch>,
}

impl ReadinessTracker {
    pub fn new(readiness: &Readiness) -> Self {
        match readiness {
            Readiness::Marker { markers, occurrences } => ReadinessTracker {
                markers: markers.clone(),
                occurrences: *occurrences,
                seen: 0,
                watches: vec![],
            },
            Readiness::Endpoints { chains } => ReadinessTracker {
                markers: vec![],
                occurrences: 0,
                seen: 0,
                watches: chains.clone(),
            },
        }
    }

    pub fn observe(&mut self, line: &str) -> bool {
        if self.markers.iter().any(|marker| line.contains(marker.as_str())) {
            self.seen += 1;
        }
        for watch in self.watches.iter_mut().filter(|watch| watch.known.is_none()) {
            watch.known = discover_endpoint(line, &watch.chain);
        }
        self.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.seen >= self.occurrences && self.watches.iter().all(|watch| watch.known.is_some())
    }

    pub fn endpoints(&self) -> Vec<ChainEndpoint> {
        self.watches
            .iter()
            .filter_map(|watch| {
                watch
                    .known
                    .as_ref()
                    .map(|url| ChainEndpoint { chain: watch.chain.clone(), url: url.clone() })
            })
            .collect()
    }
}

enum EarlyExit {
    Exited(ExitStatus),
    WaitFailed(std::io::Error),
}

#[derive(Default)]
pub struct Supervisor {
    processes: Vec<SupervisedProcess>,
}

impl Supervisor {
    pub fn new() -> Self {
        Supervisor { processes: vec![] }
    }

    /// Number of processes that have been started and not yet stopped.
    pub fn live_count(&self) -> usize {
        self.processes.iter().filter(|process| process.child.is_some()).count()
    }

    pub fn start(&mut self, plan: &LaunchPlan, ctx: &Context) -> LaunchpadResult<NodeView> {
        let LaunchCommand { command, args } = &plan.command;
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                launchpad_error!(LaunchpadError::LaunchFailed, "unable to spawn {}: {}", plan.name, e)
            })
            .with_process_info(command.as_str(), args, None)?;

        let pid = child.id();
        let (logs, readiness_rx) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        let mut forwarders = vec![];
        if let Some(stdout) = child.stdout.take() {
            forwarders.push(forward_lines(stdout, &plan.name, LogStream::Stdout, logs.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            forwarders.push(forward_lines(stderr, &plan.name, LogStream::Stderr, logs.clone()));
        }

        ctx.try_log(|logger| {
            slog::info!(logger, "spawned {} with pid {:?}: {}", plan.name, pid, plan.command)
        });

        let id = NodeId(self.processes.len());
        self.processes.push(SupervisedProcess {
            name: plan.name.clone(),
            command: plan.command.clone(),
            pid,
            child: Some(child),
            readiness_rx: Some(readiness_rx),
            forwarders,
        });

        Ok(NodeView {
            id,
            name: plan.name.clone(),
            command: plan.command.clone(),
            pid,
            endpoints: vec![],
            logs,
        })
    }

    /// Waits until the node output satisfies `readiness`, the process exits, or `limit` elapses.
    pub async fn await_readiness(
        &mut self,
        node: &mut NodeView,
        readiness: &Readiness,
        limit: Duration,
        ctx: &Context,
    ) -> LaunchpadResult<()> {
        let process = self.process_mut(node.id)?;
        let mut tracker = ReadinessTracker::new(readiness);
        let (Some(child), Some(mut rx)) = (process.child.as_mut(), process.readiness_rx.take())
        else {
            return Err(launchpad_error!(
                LaunchpadError::LaunchFailed,
                "{} is not running",
                process.name
            ));
        };

        if !tracker.is_ready() {
            let wait = async {
                loop {
                    tokio::select! {
                        biased;
                        received = rx.recv() => match received {
                            Ok(entry) => {
                                if tracker.observe(&entry.line) {
                                    return Ok(());
                                }
                            }
                            Err(RecvError::Lagged(_)) => continue,
                            Err(RecvError::Closed) => return Ok(()),
                        },
                        status = child.wait() => {
                            return Err(match status {
                                Ok(status) => EarlyExit::Exited(status),
                                Err(e) => EarlyExit::WaitFailed(e),
                            });
                        }
                    }
                }
            };
            let outcome = tokio::time::timeout(limit, wait).await;
            let failure = match outcome {
                Ok(Ok(())) if tracker.is_ready() => None,
                Ok(Ok(())) => Some(launchpad_error!(
                    LaunchpadError::LaunchFailed,
                    "{} closed its output before readiness",
                    process.name
                )),
                Ok(Err(EarlyExit::Exited(status))) => Some(launchpad_error!(
                    LaunchpadError::LaunchFailed,
                    "{} exited before readiness ({})",
                    process.name,
                    status
                )),
                Ok(Err(EarlyExit::WaitFailed(e))) => Some(launchpad_error!(
                    LaunchpadError::LaunchFailed,
                    "unable to observe {}: {}",
                    process.name,
                    e
                )),
                Err(_) => Some(launchpad_error!(
                    LaunchpadError::ReadinessTimeout,
                    "{} not ready after {} ms",
                    process.name,
                    limit.as_millis()
                )),
            };
            if let Some(report) = failure {
                return Err::<(), Report<LaunchpadError>>(report).with_process_info(
                    process.command.command.as_str(),
                    &process.command.args,
                    process.pid,
                );
            }
        }

        node.endpoints = tracker.endpoints();
        ctx.try_log(|logger| slog::info!(logger, "{} is ready", process.name));
        Ok(())
    }

    /// Terminates a node, escalating to a kill after [`STOP_GRACE_PERIOD`]. Stopping twice is a no-op.
    pub async fn stop(&mut self, id: NodeId, ctx: &Context) -> LaunchpadResult<()> {
        let process = self.process_mut(id)?;
        let Some(mut child) = process.child.take() else {
            return Ok(());
        };
        process.readiness_rx = None;

        let result = terminate(&mut child, STOP_GRACE_PERIOD).await;
        for forwarder in process.forwarders.drain(..) {
            forwarder.abort();
        }
        match result {
            Ok(status) => {
                ctx.try_log(|logger| slog::info!(logger, "{} stopped ({})", process.name, status));
                Ok(())
            }
            Err(e) => Err(launchpad_error!(
                LaunchpadError::Teardown,
                "unable to stop {}: {}",
                process.name,
                e
            ))
            .with_process_info(process.command.command.as_str(), &process.command.args, process.pid),
        }
    }

    /// Stops every live node in reverse start order, logging failures.
    pub async fn stop_all(&mut self, ctx: &Context) {
        for index in (0..self.processes.len()).rev() {
            if let Err(e) = self.stop(NodeId(index), ctx).await {
                ctx.try_log(|logger| slog::warn!(logger, "{:?}", e));
            }
        }
    }

    fn process_mut(&mut self, id: NodeId) -> LaunchpadResult<&mut SupervisedProcess> {
        self.processes.get_mut(id.0).ok_or_else(|| {
            launchpad_error!(LaunchpadError::ConfigDefect, "unknown node {:?}", id)
        })
    }
}

fn forward_lines<R>(
    reader: R,
    node: &str,
    stream: LogStream,
    logs: broadcast::Sender<LogLine>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let node = node.to_string();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let _ = logs.send(LogLine { node: node.clone(), stream, line });
        }
    })
}

async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;
        if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
            if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
                return status;
            }
        }
    }
    #[cfg(not(unix))]
    let _ = grace;
    child.kill().await?;
    child.wait().await
}
