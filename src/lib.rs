//! # periodic_backup
//!
//! A periodic backup orchestrator: selects files from a live application's
//! data directory, packages them into timestamped archives, and ships the
//! archives plus a restore manifest to one or more storage locations.
//!
//! ## Features
//!
//! - **Pluggable selection**: full-tree walks with include/exclude glob
//!   filtering and symlink policy, or config-only selection (root XML files,
//!   per-job file trees, per-user config files)
//! - **Deterministic archives**: sorted, path-deduplicated file sets packed
//!   into `tar` archives, optionally XZ-compressed
//! - **Restore manifests**: every backup run ships a YAML manifest that is
//!   sufficient on its own to drive a later restore (archiver variant,
//!   restore policy, archive names)
//! - **Multiple destinations**: local directories and HTTP object stores,
//!   with per-location failure isolation
//!
//! ## Quick Start
//!
//! ```no_run
//! use periodic_backup::backup::executor::BackupConfig;
//! use validator::Validate;
//!
//! // Load configuration from YAML file
//! let config: BackupConfig = serde_yml::from_reader(std::fs::File::open("config.yml")?)?;
//! config.validate()?;
//!
//! // Run one backup cycle
//! let report = config.run_backup()?;
//! println!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
