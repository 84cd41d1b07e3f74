use std::process;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use dbrx_api_tool::cli::{self, Cli, Commands, ExportArgs, ImportArgs, PermsCommands, SyncArgs};
use dbrx_api_tool::error::{Result, WorkspaceError};
use dbrx_api_tool::utils::normalize_user_input_path;
use dbrx_api_tool::workspace::{ImportRequest, Language, ObjectPermissions, WorkspaceApi, WorkspaceClient};
use dbrx_api_tool::{logging, Config, DataProcessor};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_level) {
        cli::print_warning(&e.to_string());
    }

    if let Err(e) = run(cli).await {
        cli::print_error(&e.to_string());
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.resolve_config()?;
    let client = Arc::new(WorkspaceClient::from_config(&config)?);
    debug!("Using {}", client.base_url());

    match &cli.command {
        Commands::Ls { path, recursive } => {
            let objects = if *recursive {
                client.list_recursive(path).await?
            } else {
                client.list_contents(path).await?
            };
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&objects)?);
            } else {
                print!("{}", cli::format_objects(&objects));
            }
        }
        Commands::Status { path } => {
            let info = client.get_status(path).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print!("{}", cli::format_objects(std::slice::from_ref(&info)));
            }
        }
        Commands::Rm { path, recursive } => {
            client.delete(path, *recursive).await?;
            cli::print_info(&format!("Deleted {}", path));
        }
        Commands::Mkdirs { path } => {
            client.create_directory(path).await?;
            cli::print_info(&format!("Created {}", path));
        }
        Commands::Import(args) => import(&client, args).await?,
        Commands::Export(args) => export(&client, args).await?,
        Commands::Perms { command } => {
            let permissions = match command {
                PermsCommands::Get { path } => client.get_permissions(path).await?,
                PermsCommands::Set(args) => {
                    client.update_permissions(&args.path, &[args.to_request()]).await?
                }
            };
            print_permissions(&permissions, cli.json)?;
        }
        Commands::Mv { source, destination } => {
            client.move_object(source, destination).await?;
            cli::print_info(&format!("Moved {} to {}", source, destination));
        }
        Commands::Sync(args) => sync(Arc::clone(&client), &config, args).await?,
    }

    debug!("{} requests in the current rate limit window", client.requests_in_window().await);

    Ok(())
}

async fn import(client: &WorkspaceClient, args: &ImportArgs) -> Result<()> {
    let local = normalize_user_input_path(&args.local.to_string_lossy());
    let language = match args.language {
        Some(language) => Some(language),
        None => local
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Language::from_extension),
    };

    let content = tokio::fs::read(&local).await?;
    let request = ImportRequest {
        path: args.path.clone(),
        language,
        content,
        format: args.format,
        overwrite: args.overwrite,
    };
    client.import(request).await?;
    cli::print_info(&format!("Imported {} to {}", local.display(), args.path));
    Ok(())
}

async fn export(client: &WorkspaceClient, args: &ExportArgs) -> Result<()> {
    let bytes = client.export_bytes(&args.path, args.format).await?;
    match &args.output {
        Some(output) => {
            let output = normalize_user_input_path(&output.to_string_lossy());
            tokio::fs::write(&output, &bytes).await?;
            cli::print_info(&format!("Exported {} to {}", args.path, output.display()));
        }
        None => {
            let text = String::from_utf8(bytes)?;
            print!("{}", text);
        }
    }
    Ok(())
}

async fn sync(client: Arc<WorkspaceClient>, config: &Config, args: &SyncArgs) -> Result<()> {
    let local = normalize_user_input_path(&args.local.to_string_lossy());
    let mut processor = DataProcessor::new(client, &args.target)?
        .with_overwrite(!args.no_overwrite)
        .with_max_concurrent(args.jobs.unwrap_or(config.max_concurrent_imports));

    let ingested = processor.ingest_data(&local)?;
    if ingested == 0 {
        return Err(WorkspaceError::Validation(format!(
            "No notebook sources found in {}",
            local.display()
        )));
    }
    let planned = processor.process_data()?.len();

    let pb = create_progress_bar();
    pb.set_message(format!("Storing {} notebooks under {}", planned, processor.target_root()));
    let summary = processor.store_results().await;
    pb.finish_and_clear();
    let summary = summary?;

    cli::print_info(&format!(
        "Synced {} of {} notebooks into {}",
        summary.imported.len(),
        planned,
        processor.target_root()
    ));
    for (path, error) in &summary.failed {
        cli::print_warning(&format!("{}: {}", path, error));
    }

    if summary.is_complete() {
        Ok(())
    } else {
        Err(WorkspaceError::Processing(format!(
            "{} notebooks failed to import",
            summary.failed.len()
        )))
    }
}

fn print_permissions(permissions: &ObjectPermissions, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(permissions)?);
        return Ok(());
    }

    if let Some(object_id) = &permissions.object_id {
        println!("{}", object_id.bright_white().bold());
    }
    for entry in &permissions.access_control_list {
        let levels: Vec<String> = entry
            .all_permissions
            .iter()
            .map(|p| {
                if p.inherited {
                    format!("{} (inherited)", p.permission_level)
                } else {
                    p.permission_level.clone()
                }
            })
            .collect();
        println!(
            "  {:<40} {}",
            entry.principal().unwrap_or("-").bright_cyan(),
            levels.join(", ")
        );
    }
    Ok(())
}

fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        pb.set_style(style.tick_strings(&["-", "\\", "|", "/", "-", "\\", "|", "/"]));
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
