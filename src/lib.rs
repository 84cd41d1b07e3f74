#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![warn(clippy::all)]

//! dbrx-api-tool - Databricks Workspace API client
//!
//! This library wraps the Workspace REST API (`/api/2.0/workspace`) in a typed,
//! retrying, rate-limited async client and builds a small sync pipeline on top
//! of it that pushes a local tree of notebook sources into a workspace folder.
//!
//! ## Features
//! - List, inspect, create, move and delete workspace objects
//! - Import and export notebooks in every supported format
//! - Read and update object permissions
//! - Sync local notebook sources with [`DataProcessor`]
//!
//! ## Usage
//! ```rust,ignore
//! use dbrx_api_tool::{Config, DataProcessor, WorkspaceApi, WorkspaceClient};
//! use std::{path::Path, sync::Arc};
//!
//! async fn example() -> dbrx_api_tool::Result<()> {
//!     let config = Config::load(None)?;
//!     let client = Arc::new(WorkspaceClient::from_config(&config)?);
//!     for object in client.list_contents("/Shared").await? {
//!         println!("{} {}", object.object_type, object.path);
//!     }
//!
//!     let mut processor = DataProcessor::new(client, "/Shared/etl")?;
//!     processor.ingest_data(Path::new("./notebooks"))?;
//!     processor.process_data()?;
//!     processor.store_results().await?;
//!     Ok(())
//! }
//! ```

/// Time-bounded in-memory caching
pub mod cache;
/// Command line definitions and output helpers
pub mod cli;
/// Configuration module for the application
pub mod config;
/// Error handling types and utilities
pub mod error;
/// Logging configuration and utilities
pub mod logging;
/// Bounded concurrent task execution
pub mod parallel;
/// Local notebook sources to workspace sync pipeline
pub mod processor;
/// Rate limiting functionality to respect API limits
pub mod rate_limiter;
/// In-memory workspace backend
pub mod testing;
/// Utilities (path normalization, retry helpers)
pub mod utils;
/// Workspace API client and types
pub mod workspace;

pub use config::Config;
pub use error::{Result, WorkspaceError};
pub use processor::{DataProcessor, StoreSummary};
pub use workspace::{WorkspaceApi, WorkspaceClient};
