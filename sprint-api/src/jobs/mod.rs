//! Background Jobs
//!
//! - `file_sweep`: reclaims `Temporary` files that no owner claimed in time
//!
//! Jobs are spawned at startup and stop when the shutdown watch flips:
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! tokio::spawn(file_sweep_task(services.files.clone(), FileSweepConfig::from_env(), shutdown_rx));
//! // On shutdown
//! let _ = shutdown_tx.send(true);
//! ```

pub mod file_sweep;

pub use file_sweep::{
    file_sweep_task, run_sweep_once, FileSweepConfig, FileSweepMetrics, FileSweepSnapshot,
};
