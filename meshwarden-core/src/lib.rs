pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod probe;
pub mod registry;
pub mod scheduler;
pub mod shutdown;
pub mod time;
pub mod worker_pool;

pub use metrics::Metrics;
pub use persistence::{load_snapshot, Persister};
pub use probe::{probe, ProbeResult};
pub use registry::ClientRegistry;
pub use scheduler::{PingScheduler, SchedulerStats};
pub use shutdown::ShutdownHandle;
pub use worker_pool::WorkerPool;
