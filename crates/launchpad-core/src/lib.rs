#[macro_use]
pub mod types;

pub mod context;
pub mod dispatcher;
pub mod env;
pub mod foundations;
pub mod ports;
pub mod providers;
pub mod runner;
pub mod supervisor;
pub mod utils;

pub use context::{LifecycleState, NetworkContext, ServicePort};
pub use dispatcher::Dispatcher;
pub use utils::Context;

pub use error_stack;
pub use indexmap;
