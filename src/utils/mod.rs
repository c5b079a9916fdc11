//! Reporting helpers.
//!
//! ```no_run
//! use ssh_copy::transfer::TaskOutcome;
//! use ssh_copy::utils::summary::{write_run_summary, RunInfo};
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let info = RunInfo::start("deploy@files.example.com:22", "dist", "/srv/app");
//! let outcome = TaskOutcome::success(12, "Copied 12 files to the remote host");
//! write_run_summary(Path::new("copy-summary.json"), &info, &outcome)?;
//! # Ok(())
//! # }
//! ```

/// JSON summary of a copy run
pub mod summary;
