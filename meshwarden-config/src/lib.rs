pub mod agent;
pub mod error;
pub mod level;
pub mod loader;
pub mod server;
pub mod validation;
pub mod watcher;

pub use agent::AgentConfig;
pub use error::{ConfigLoadError, GuardRailError};
pub use level::LogLevel;
pub use loader::{
    load_agent_config, load_server_config, ConfigLoaderOptions, LoadedAgentConfig,
    LoadedServerConfig,
};
pub use server::ServerConfig;
pub use validation::ConfigWarnings;
pub use watcher::{merge_whitelisted, ConfigWatcher, ReloadError};
