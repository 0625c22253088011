//! Bootstrap tool for technical-analysis environments.
//!
//! This crate builds and installs the TA-Lib C library from a version-pinned
//! source archive and then installs Python dependencies from a requirements
//! manifest. It replaces the usual five-line shell bootstrap with a fail-fast
//! pipeline:
//!
//! - **Preflight checks** - Host toolchain, pip resolution, prefix permissions
//! - **Fetcher** - Checksum-verified archive download with cache reuse
//! - **Builder** - Extract, `./configure --prefix=…`, parallel `make`, install
//! - **Cleaner** - Transient artifact removal, on success only
//! - **Dependency installer** - pip upgrade plus manifest installation
//!
//! # Architecture
//!
//! ```text
//! talib-bootstrap (bin)
//!     │
//!     └── pipeline ──▶ preflight ──▶ fetch ──▶ build ──▶ cleanup ──▶ deps
//!              │                      │          │
//!              │                      │          ├── extract (tar.gz → tree)
//!              │                      │          └── native (configure/make)
//!              │                      └── downloads/<archive> under work dir
//!              └── run lock + JSON receipt in the work dir
//! ```
//!
//! Every stage returns `anyhow::Result`; the first failure aborts the run and
//! surfaces as a non-zero process exit. A failed build keeps its archive and
//! source tree on disk for debugging.
//!
//! # Example
//!
//! ```rust,ignore
//! use talib_bootstrap::config::BootstrapConfig;
//!
//! let config = BootstrapConfig::load(None)?;
//! talib_bootstrap::pipeline::install(&config)?;
//! ```

pub mod build;
pub mod cleanup;
pub mod config;
pub mod deps;
pub mod fetch;
pub mod pipeline;
pub mod preflight;
pub mod process;

pub use build::native::BuildOutcome;
pub use config::BootstrapConfig;
