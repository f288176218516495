use dotenvy::dotenv;
use launchpad_core::env::{is_truthy, SINGLE_THREAD_KEY, WORKER_ID_KEY, WSS_URL_KEY};
use launchpad_core::ports::{parse_worker_id, DEFAULT_WORKER_ID, MAX_WORKER_ID};

pub fn get_env_var<T: ToString>(key: &str, default: T) -> String {
    dotenv().ok();
    std::env::var(key).unwrap_or(default.to_string())
}

pub fn get_optional_env_var(key: &str) -> Option<String> {
    dotenv().ok();
    std::env::var(key).ok().filter(|value| !value.is_empty())
}

#[derive(Debug, Clone)]
pub struct LaunchpadEnv {
    pub worker_id: u16,
    pub single_thread: bool,
    pub wss_url: Option<String>,
}

impl LaunchpadEnv {
    pub fn load() -> Self {
        let worker_id = get_env_var(WORKER_ID_KEY, DEFAULT_WORKER_ID);
        let single_thread = get_optional_env_var(SINGLE_THREAD_KEY);
        let wss_url = get_optional_env_var(WSS_URL_KEY);

        Self {
            worker_id: parse_worker_id(Some(&worker_id)),
            single_thread: is_truthy(single_thread.as_deref()),
            wss_url,
        }
    }

    /// `--worker-id` wins over the environment.
    pub fn with_worker_id_override(mut self, worker_id: Option<u16>) -> Self {
        if let Some(worker_id) = worker_id {
            self.worker_id = if worker_id <= MAX_WORKER_ID { worker_id } else { DEFAULT_WORKER_ID };
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        std::env::remove_var(WORKER_ID_KEY);
        std::env::remove_var(SINGLE_THREAD_KEY);
        std::env::remove_var(WSS_URL_KEY);
    }

    #[test]
    #[serial]
    fn test_load_defaults() {
        clear();
        let env = LaunchpadEnv::load();
        assert_eq!(env.worker_id, DEFAULT_WORKER_ID);
        assert!(!env.single_thread);
        assert_eq!(env.wss_url, None);
    }

    #[test]
    #[serial]
    fn test_load_from_process_environment() {
        clear();
        std::env::set_var(WORKER_ID_KEY, "7");
        std::env::set_var(SINGLE_THREAD_KEY, "true");
        std::env::set_var(WSS_URL_KEY, "wss://rpc.example.org");
        let env = LaunchpadEnv::load();
        assert_eq!(env.worker_id, 7);
        assert!(env.single_thread);
        assert_eq!(env.wss_url.as_deref(), Some("wss://rpc.example.org"));

        let env = env.with_worker_id_override(Some(12));
        assert_eq!(env.worker_id, 12);
        assert_eq!(env.with_worker_id_override(Some(9000)).worker_id, DEFAULT_WORKER_ID);
        clear();
    }

    #[test]
    #[serial]
    fn test_malformed_worker_id_falls_back() {
        clear();
        std::env::set_var(WORKER_ID_KEY, "not-a-number");
        assert_eq!(LaunchpadEnv::load().worker_id, DEFAULT_WORKER_ID);
        clear();
    }
}
