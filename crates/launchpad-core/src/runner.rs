//! Test-runner collaborator: run options, invocation, and exit-code translation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::time::Duration;

use error_stack::ResultExt;
use hiro_system_kit::slog;
use serde_json::Value;
use tokio::process::Command;

use crate::dispatcher::Dispatcher;
use crate::env::RuntimeEnv;
use crate::types::{
    Environment, FoundationKind, GlobalConfig, LaunchpadError, LaunchpadResult, TestRunnerConfig,
};
use crate::utils::Context;

pub const HOOK_TIMEOUT_MS: u64 = 500_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunOptions {
    pub watch: bool,
    pub threads: bool,
    pub include: Vec<String>,
    pub test_timeout: u64,
    pub hook_timeout: u64,
    pub reporters: Vec<String>,
    pub test_name_pattern: Option<String>,
}

impl TestRunOptions {
    pub fn for_environment(
        environment: &Environment,
        config: &GlobalConfig,
        single_thread: bool,
        grep: Option<&str>,
    ) -> Self {
        let mut reporters = vec!["verbose".to_string()];
        if environment.html {
            reporters.push("html".to_string());
        }
        TestRunOptions {
            watch: false,
            threads: environment.multi_threads && !single_thread,
            include: environment.include_patterns(),
            test_timeout: environment.timeout.unwrap_or(config.default_test_timeout),
            hook_timeout: HOOK_TIMEOUT_MS,
            reporters,
            test_name_pattern: grep.map(str::to_string),
        }
    }

    /// The options as `LAUNCHPAD_*` variables for the runner process.
    pub fn to_env_vars(&self) -> Vec<(String, String)> {
        let mut vars = vec![
            ("LAUNCHPAD_WATCH".to_string(), self.watch.to_string()),
            ("LAUNCHPAD_THREADS".to_string(), self.threads.to_string()),
            ("LAUNCHPAD_INCLUDE".to_string(), self.include.join(",")),
            ("LAUNCHPAD_TEST_TIMEOUT".to_string(), self.test_timeout.to_string()),
            ("LAUNCHPAD_HOOK_TIMEOUT".to_string(), self.hook_timeout.to_string()),
            ("LAUNCHPAD_REPORTERS".to_string(), self.reporters.join(",")),
        ];
        if let Some(pattern) = &self.test_name_pattern {
            vars.push(("LAUNCHPAD_TEST_NAME_PATTERN".to_string(), pattern.clone()));
        }
        vars
    }
}

/// Wraps each folder in slashes so the runner matches it as a path segment.
pub fn normalize_test_folders(folders: &[String]) -> Vec<String> {
    folders
        .iter()
        .map(|folder| format!("/{}/", folder.trim_matches('/')))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRunSummary {
    pub results_cache: PathBuf,
}

pub type TestRunFuture<'a> =
    Pin<Box<dyn Future<Output = LaunchpadResult<TestRunSummary>> + Send + 'a>>;

pub trait TestRunner {
    fn run<'a>(
        &'a self,
        folders: &'a [String],
        options: &'a TestRunOptions,
        runtime_env: &'a RuntimeEnv,
    ) -> TestRunFuture<'a>;
}

/// Runs the configured command with the folders as positional arguments.
pub struct CommandTestRunner {
    config: TestRunnerConfig,
}

impl CommandTestRunner {
    pub fn new(config: TestRunnerConfig) -> Self {
        CommandTestRunner { config }
    }
}

impl TestRunner for CommandTestRunner {
    fn run<'a>(
        &'a self,
        folders: &'a [String],
        options: &'a TestRunOptions,
        runtime_env: &'a RuntimeEnv,
    ) -> TestRunFuture<'a> {
        Box::pin(async move {
            let results_cache = PathBuf::from(&self.config.results_cache);
            // A cache left by an earlier run must not stand in for this one.
            std::fs::remove_file(&results_cache)
                .or_else(|e| if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) })
                .change_context(LaunchpadError::TestExecution)
                .attach_printable_lazy(|| {
                    format!("unable to clear results cache {}", results_cache.display())
                })?;

            let mut command = Command::new(&self.config.command);
            command
                .args(&self.config.args)
                .args(folders)
                .stdin(Stdio::null())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .kill_on_drop(true);
            for (key, value) in options.to_env_vars() {
                command.env(key, value);
            }
            for (key, value) in runtime_env.iter() {
                command.env(key, value);
            }
            let status = command
                .status()
                .await
                .change_context(LaunchpadError::TestExecution)
                .attach_printable_lazy(|| format!("unable to run `{}`", self.config.command))?;
            if !results_cache.exists() {
                return Err(launchpad_error!(
                    LaunchpadError::TestExecution,
                    "`{}` exited with {} without writing {}",
                    self.config.command,
                    status,
                    results_cache.display()
                ));
            }
            Ok(TestRunSummary { results_cache })
        })
    }
}

/// 1 when any entry of the results cache is marked failed, 0 otherwise.
pub fn exit_code_from_results(path: &Path) -> LaunchpadResult<i32> {
    let contents = std::fs::read_to_string(path)
        .change_context(LaunchpadError::TestExecution)
        .attach_printable_lazy(|| format!("unable to read results cache {}", path.display()))?;
    let cache: Value = serde_json::from_str(&contents)
        .change_context(LaunchpadError::TestExecution)
        .attach_printable_lazy(|| format!("malformed results cache {}", path.display()))?;
    let Some(results) = cache.get("results").and_then(Value::as_array) else {
        return Err(launchpad_error!(
            LaunchpadError::TestExecution,
            "results cache {} has no results array",
            path.display()
        ));
    };
    let failed = results.iter().any(|entry| {
        entry.get(1).and_then(|outcome| outcome.get("failed")).and_then(Value::as_bool) == Some(true)
    });
    Ok(if failed { 1 } else { 0 })
}

pub struct TestRequest<'a> {
    pub environment: &'a str,
    pub worker_id: u16,
    pub single_thread: bool,
    pub grep: Option<&'a str>,
}

/// Runs an environment's tests against its network and translates the outcome to an exit code.
pub async fn run_environment_tests(
    dispatcher: &mut Dispatcher,
    runner: &dyn TestRunner,
    request: TestRequest<'_>,
    ctx: &Context,
) -> LaunchpadResult<i32> {
    let environment = dispatcher.config().environment(request.environment)?.clone();
    let options = TestRunOptions::for_environment(
        &environment,
        dispatcher.config(),
        request.single_thread,
        request.grep,
    );
    let folders = normalize_test_folders(&environment.test_file_dir);
    let mut runtime_env = RuntimeEnv::for_environment(&environment.name, request.worker_id);

    let summary = if environment.foundation.kind() == FoundationKind::ReadOnly {
        probe_chain_identity(dispatcher, &environment.name, &mut runtime_env, ctx).await;
        runner.run(&folders, &options, &runtime_env).await?
    } else {
        dispatcher.create_context(&environment.name).await?;
        let outcome = runner.run(&folders, &options, &runtime_env).await;
        dispatcher.destroy().await;
        outcome?
    };
    exit_code_from_results(&summary.results_cache)
}

/// Records the first chain identity of a read-only environment. Failures leave it unset.
///
/// Each greeting is bounded by the connect timeout.
pub async fn probe_chain_identity(
    dispatcher: &mut Dispatcher,
    environment_name: &str,
    runtime_env: &mut RuntimeEnv,
    ctx: &Context,
) {
    let limit = Duration::from_millis(dispatcher.config().connect_timeout);
    match dispatcher.create_context(environment_name).await {
        Ok(context) => {
            for provider in context.providers().iter().filter(|p| p.kind.exposes_chain_identity()) {
                match tokio::time::timeout(limit, provider.greet(ctx)).await {
                    Ok(Ok(Some(identity))) => {
                        runtime_env.record_chain_identity(&identity);
                        break;
                    }
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => ctx.try_log(|logger| {
                        slog::warn!(logger, "chain identity probe failed: {:?}", e)
                    }),
                    Err(_) => ctx.try_log(|logger| {
                        slog::warn!(
                            logger,
                            "{} did not answer the chain identity probe within {} ms",
                            provider.name,
                            limit.as_millis()
                        )
                    }),
                }
            }
        }
        Err(e) => ctx.try_log(|logger| slog::warn!(logger, "chain identity probe skipped: {:?}", e)),
    }
    dispatcher.destroy().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LifecycleState;
    use crate::env::{RTNAME_KEY, RTVERSION_KEY, TEST_ENV_KEY};
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use std::io::Write;
    use std::sync::Mutex;
    use test_case::test_case;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    /// Records the runtime environment it was handed, then reports `results_cache` or fails.
    struct RecordingRunner {
        results_cache: PathBuf,
        crash: bool,
        seen: Mutex<Vec<RuntimeEnv>>,
    }

    impl RecordingRunner {
        fn new(results_cache: &Path, crash: bool) -> Self {
            RecordingRunner { results_cache: results_cache.to_path_buf(), crash, seen: Mutex::new(vec![]) }
        }

        fn seen(&self) -> Vec<RuntimeEnv> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl TestRunner for RecordingRunner {
        fn run<'a>(
            &'a self,
            _folders: &'a [String],
            _options: &'a TestRunOptions,
            runtime_env: &'a RuntimeEnv,
        ) -> TestRunFuture<'a> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(runtime_env.clone());
                if self.crash {
                    return Err(launchpad_error!(LaunchpadError::TestExecution, "runner crashed"));
                }
                Ok(TestRunSummary { results_cache: self.results_cache.clone() })
            })
        }
    }

    /// A chain that answers `state_getRuntimeVersion`, or accepts requests and never replies.
    async fn spawn_chain(answers: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    while let Some(Ok(Message::Text(text))) = ws.next().await {
                        if !answers {
                            continue;
                        }
                        let request: Value = serde_json::from_str(&text).unwrap();
                        let result = json!({ "specName": "moonriver", "specVersion": 2900 });
                        let response = json!({ "jsonrpc": "2.0", "id": request["id"], "result": result });
                        if ws.send(Message::Text(response.to_string())).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        format!("ws://{}", addr)
    }

    fn read_only_config(endpoint: &str) -> GlobalConfig {
        serde_json::from_value(json!({
            "label": "unit",
            "connectTimeout": 300,
            "environments": [{
                "name": "live",
                "foundation": { "type": "read_only" },
                "testFileDir": ["suites/live"],
                "connections": [{ "name": "chain", "type": "generic", "endpoints": [endpoint] }]
            }]
        }))
        .unwrap()
    }

    fn write_results(dir: &Path, contents: &str) -> PathBuf {
        let path = dir.join("results.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn request(environment: &str) -> TestRequest<'_> {
        TestRequest { environment, worker_id: 2, single_thread: false, grep: None }
    }

    fn environment(multi_threads: bool, html: bool, timeout: Option<u64>) -> Environment {
        serde_json::from_value(serde_json::json!({
            "name": "dev_local",
            "foundation": { "type": "read_only" },
            "testFileDir": ["suites/dev"],
            "multiThreads": multi_threads,
            "html": html,
            "timeout": timeout,
        }))
        .unwrap()
    }

    fn config() -> GlobalConfig {
        serde_json::from_value(serde_json::json!({ "label": "unit", "environments": [] })).unwrap()
    }

    #[test_case(true, false, true)]
    #[test_case(true, true, false)]
    #[test_case(false, false, false)]
    fn test_threads(multi_threads: bool, single_thread: bool, expected: bool) {
        let options =
            TestRunOptions::for_environment(&environment(multi_threads, false, None), &config(), single_thread, None);
        assert_eq!(options.threads, expected);
        assert!(!options.watch);
    }

    #[test]
    fn test_options_defaults_and_overrides() {
        let options = TestRunOptions::for_environment(&environment(false, false, None), &config(), false, None);
        assert_eq!(options.test_timeout, 10_000);
        assert_eq!(options.hook_timeout, HOOK_TIMEOUT_MS);
        assert_eq!(options.reporters, vec!["verbose"]);
        assert_eq!(options.test_name_pattern, None);

        let options = TestRunOptions::for_environment(
            &environment(false, true, Some(60_000)),
            &config(),
            false,
            Some("transfer"),
        );
        assert_eq!(options.test_timeout, 60_000);
        assert_eq!(options.reporters, vec!["verbose", "html"]);
        assert!(options
            .to_env_vars()
            .contains(&("LAUNCHPAD_TEST_NAME_PATTERN".to_string(), "transfer".to_string())));
    }

    #[test]
    fn test_normalize_test_folders() {
        let folders = vec!["suites/dev".to_string(), "/suites/fork/".to_string()];
        assert_eq!(normalize_test_folders(&folders), vec!["/suites/dev/", "/suites/fork/"]);
    }

    #[test_case(r#"{"results":[["/a.ts",{"duration":1,"failed":false}],["/b.ts",{"failed":false}]]}"#, 0)]
    #[test_case(r#"{"results":[["/a.ts",{"failed":false}],["/b.ts",{"failed":true}]]}"#, 1)]
    #[test_case(r#"{"results":[]}"#, 0)]
    fn test_exit_code_from_results(contents: &str, expected: i32) {
        let mut cache = tempfile::NamedTempFile::new().unwrap();
        write!(cache, "{}", contents).unwrap();
        assert_eq!(exit_code_from_results(cache.path()).unwrap(), expected);
    }

    #[test]
    fn test_exit_code_from_missing_results() {
        let error = exit_code_from_results(Path::new("does/not/exist.json")).unwrap_err();
        assert_eq!(*error.current_context(), LaunchpadError::TestExecution);

        let mut cache = tempfile::NamedTempFile::new().unwrap();
        write!(cache, "{{}}").unwrap();
        let error = exit_code_from_results(cache.path()).unwrap_err();
        assert_eq!(*error.current_context(), LaunchpadError::TestExecution);
    }

    #[tokio::test]
    async fn test_probe_records_chain_identity() {
        let endpoint = spawn_chain(true).await;
        let mut dispatcher = Dispatcher::new(read_only_config(&endpoint), &Context::empty());
        let mut runtime_env = RuntimeEnv::for_environment("live", 2);
        probe_chain_identity(&mut dispatcher, "live", &mut runtime_env, &Context::empty()).await;
        assert_eq!(runtime_env.get(RTNAME_KEY), Some("moonriver"));
        assert_eq!(runtime_env.get(RTVERSION_KEY), Some("2900"));
        assert_eq!(dispatcher.state(), LifecycleState::Destroyed);
    }

    #[tokio::test]
    async fn test_probe_gives_up_on_a_silent_chain() {
        let endpoint = spawn_chain(false).await;
        let mut dispatcher = Dispatcher::new(read_only_config(&endpoint), &Context::empty());
        let mut runtime_env = RuntimeEnv::for_environment("live", 2);
        let ctx = Context::empty();
        let probe = probe_chain_identity(&mut dispatcher, "live", &mut runtime_env, &ctx);
        tokio::time::timeout(Duration::from_secs(5), probe)
            .await
            .expect("the probe is bounded by the connect timeout");
        assert_eq!(runtime_env.get(RTNAME_KEY), None);
        assert_eq!(runtime_env.get(RTVERSION_KEY), None);
        assert_eq!(dispatcher.state(), LifecycleState::Destroyed);
    }

    #[tokio::test]
    async fn test_read_only_runs_without_reachable_provider() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_results(dir.path(), r#"{"results":[["/suites/live/a.ts",{"failed":false}]]}"#);
        let runner = RecordingRunner::new(&results, false);
        let mut dispatcher = Dispatcher::new(read_only_config("ws://127.0.0.1:1"), &Context::empty());

        let exit_code =
            run_environment_tests(&mut dispatcher, &runner, request("live"), &Context::empty())
                .await
                .unwrap();
        assert_eq!(exit_code, 0);

        let seen = runner.seen();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get(TEST_ENV_KEY), Some("live"));
        assert_eq!(seen[0].get(RTNAME_KEY), None);
        assert_eq!(seen[0].get(RTVERSION_KEY), None);
        assert_eq!(dispatcher.live_node_count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_launched_network_is_destroyed_after_a_crashed_runner() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let node = dir.path().join("node.sh");
        std::fs::write(&node, "#!/bin/sh\necho 'Development Service Ready'\nexec sleep 60\n").unwrap();
        std::fs::set_permissions(&node, std::fs::Permissions::from_mode(0o755)).unwrap();
        let endpoint = spawn_chain(true).await;
        let config: GlobalConfig = serde_json::from_value(json!({
            "label": "unit",
            "environments": [{
                "name": "dev_local",
                "foundation": { "type": "dev", "binPath": node.display().to_string() },
                "testFileDir": ["suites/dev"],
                "connections": [{ "name": "para", "type": "native", "endpoints": [endpoint] }]
            }]
        }))
        .unwrap();

        let runner = RecordingRunner::new(&dir.path().join("results.json"), true);
        let mut dispatcher = Dispatcher::new(config, &Context::empty()).with_worker_id(Some(5));
        let error = run_environment_tests(&mut dispatcher, &runner, request("dev_local"), &Context::empty())
            .await
            .unwrap_err();
        assert_eq!(*error.current_context(), LaunchpadError::TestExecution);
        assert_eq!(runner.seen().len(), 1);
        assert_eq!(dispatcher.live_node_count(), 0);
        assert_eq!(dispatcher.state(), LifecycleState::Destroyed);
    }

    #[tokio::test]
    async fn test_command_runner_ignores_a_stale_results_cache() {
        let dir = tempfile::tempdir().unwrap();
        let results = write_results(dir.path(), r#"{"results":[["/a.ts",{"failed":false}]]}"#);
        let runner = CommandTestRunner::new(TestRunnerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), "exit 2".into()],
            results_cache: results.display().to_string(),
        });
        let options = TestRunOptions::for_environment(&environment(false, false, None), &config(), false, None);

        let error = runner
            .run(&["/suites/dev/".to_string()], &options, &RuntimeEnv::default())
            .await
            .unwrap_err();
        assert_eq!(*error.current_context(), LaunchpadError::TestExecution);
        assert!(!results.exists());
    }

    #[tokio::test]
    async fn test_command_runner_reports_failed_results() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results.json");
        let script = format!(
            "[ \"$LAUNCHPAD_TEST_ENV\" = live ] && echo '{{\"results\":[[\"/a.ts\",{{\"failed\":true}}]]}}' > {}",
            results.display()
        );
        let mut config = read_only_config("ws://127.0.0.1:1");
        config.test_runner = TestRunnerConfig {
            command: "sh".into(),
            args: vec!["-c".into(), script],
            results_cache: results.display().to_string(),
        };
        let runner = CommandTestRunner::new(config.test_runner.clone());
        let mut dispatcher = Dispatcher::new(config, &Context::empty());

        let exit_code =
            run_environment_tests(&mut dispatcher, &runner, request("live"), &Context::empty())
                .await
                .unwrap();
        assert_eq!(exit_code, 1);
    }
}
