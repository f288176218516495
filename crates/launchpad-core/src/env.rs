use indexmap::IndexMap;

use crate::providers::ChainIdentity;

pub const RUN_SCRIPTS_KEY: &str = "LAUNCHPAD_RUN_SCRIPTS";
pub const TEST_ENV_KEY: &str = "LAUNCHPAD_TEST_ENV";
pub const WORKER_ID_KEY: &str = "LAUNCHPAD_WORKER_ID";
pub const SINGLE_THREAD_KEY: &str = "LAUNCHPAD_SINGLE_THREAD";
pub const RTNAME_KEY: &str = "LAUNCHPAD_RTNAME";
pub const RTVERSION_KEY: &str = "LAUNCHPAD_RTVERSION";
pub const WSS_URL_KEY: &str = "WSS_URL";

pub fn is_truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|value| value.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

/// Variables handed to the test runner process rather than set on the orchestrator itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    vars: IndexMap<String, String>,
}

impl RuntimeEnv {
    pub fn for_environment(environment_name: &str, worker_id: u16) -> Self {
        let mut env = RuntimeEnv::default();
        env.set(RUN_SCRIPTS_KEY, "true");
        env.set(TEST_ENV_KEY, environment_name);
        env.set(WORKER_ID_KEY, worker_id.to_string());
        env
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.vars.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn record_chain_identity(&mut self, identity: &ChainIdentity) {
        self.set(RTNAME_KEY, identity.name.clone());
        self.set(RTVERSION_KEY, identity.version.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }
}
