use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};
use colored::*;

use crate::config::{Config, Credentials, HOST_ENV, TOKEN_ENV};
use crate::workspace::{AccessControlRequest, ExportFormat, Language, ObjectInfo, PermissionLevel};

/// Command line of the `dbrx` binary
#[derive(Parser, Debug)]
#[command(
    name = "dbrx",
    author,
    version,
    about = "Databricks Workspace API tool",
    long_about = "List, import, export, move and secure objects in a Databricks workspace"
)]
pub struct Cli {
    /// Workspace host
    #[arg(long, global = true, env = HOST_ENV)]
    pub host: Option<String>,

    /// Personal access token
    #[arg(long, global = true, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Loads the config file and applies `--host` / `--token` on top of it
    pub fn resolve_config(&self) -> crate::Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.apply_credentials(Credentials {
            host: self.host.clone(),
            token: self.token.clone(),
        });
        Ok(config)
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List a directory
    Ls {
        /// Workspace path
        path: String,
        /// Walk subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show metadata of an object
    Status {
        /// Workspace path
        path: String,
    },

    /// Delete an object
    Rm {
        /// Workspace path
        path: String,
        /// Delete non-empty directories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Create a directory and its parents
    Mkdirs {
        /// Workspace path
        path: String,
    },

    /// Import a local file as a notebook
    Import(ImportArgs),

    /// Export a notebook
    Export(ExportArgs),

    /// Read or change permissions
    Perms {
        /// Permission operation
        #[command(subcommand)]
        command: PermsCommands,
    },

    /// Move or rename an object
    Mv {
        /// Current workspace path
        source: String,
        /// New workspace path
        destination: String,
    },

    /// Push a local tree of notebook sources into a workspace folder
    Sync(SyncArgs),
}

/// Arguments of `dbrx import`
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Local file to import
    pub local: PathBuf,
    /// Destination workspace path
    pub path: String,
    /// Notebook language; derived from the file extension when omitted
    #[arg(short, long)]
    pub language: Option<Language>,
    /// Payload format
    #[arg(short, long, default_value = "SOURCE")]
    pub format: ExportFormat,
    /// Replace an existing notebook
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments of `dbrx export`
#[derive(Args, Debug)]
pub struct ExportArgs {
    /// Workspace path
    pub path: String,
    /// Payload format
    #[arg(short, long, default_value = "SOURCE")]
    pub format: ExportFormat,
    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Arguments of `dbrx sync`
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Local file or directory
    pub local: PathBuf,
    /// Destination workspace folder
    pub target: String,
    /// Keep notebooks that already exist
    #[arg(long)]
    pub no_overwrite: bool,
    /// Concurrent imports; defaults to the configured value
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,
}

/// Permission subcommands
#[derive(Subcommand, Debug)]
pub enum PermsCommands {
    /// Show the access control list
    Get {
        /// Workspace path
        path: String,
    },
    /// Grant a permission level to one principal
    Set(PermsSetArgs),
}

/// Arguments of `dbrx perms set`
#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("principal").required(true).args(["user", "group", "service_principal"])))]
pub struct PermsSetArgs {
    /// Workspace path
    pub path: String,
    /// User name
    #[arg(long)]
    pub user: Option<String>,
    /// Group name
    #[arg(long)]
    pub group: Option<String>,
    /// Service principal application id
    #[arg(long)]
    pub service_principal: Option<String>,
    /// Permission level (CAN_READ, CAN_RUN, CAN_EDIT, CAN_MANAGE)
    #[arg(short, long)]
    pub level: PermissionLevel,
}

impl PermsSetArgs {
    /// The access control entry described by the flags
    pub fn to_request(&self) -> AccessControlRequest {
        if let Some(user) = &self.user {
            AccessControlRequest::for_user(user, self.level)
        } else if let Some(group) = &self.group {
            AccessControlRequest::for_group(group, self.level)
        } else {
            AccessControlRequest::for_service_principal(
                self.service_principal.clone().unwrap_or_default(),
                self.level,
            )
        }
    }
}

/// Renders objects as an aligned table
pub fn format_objects(objects: &[ObjectInfo]) -> String {
    let mut out = String::new();
    for object in objects {
        let kind = object.object_type.to_string();
        let language = object.language.map(|l| l.to_string()).unwrap_or_default();
        let modified = object
            .modified()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        out.push_str(&format!("{:<10} {:<7} {:<16} {}\n", kind, language, modified, object.path));
    }
    out
}

/// Prints an informational message
pub fn print_info(message: &str) {
    println!("{}", message.green());
}

/// Prints a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "[WARNING]".yellow(), message.yellow());
}

/// Prints an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".bright_red(), message.bright_red());
}
