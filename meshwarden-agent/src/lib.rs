pub mod auto_heal;
pub mod http_session;
pub mod ip_discovery;
pub mod menu;
pub mod process_controller;
pub mod run;

pub use http_session::HttpSessionManager;
pub use run::run_client;
