//! Local notebook sources to workspace folder pipeline.
//!
//! ```rust,ignore
//! let mut processor = DataProcessor::new(Arc::new(client), "/Shared/etl")?;
//! processor.ingest_data(Path::new("./notebooks"))?;
//! processor.process_data()?;
//! let summary = processor.store_results().await?;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use log::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::error::{Result, WorkspaceError};
use crate::parallel::ParallelProcessor;
use crate::utils::path::{join_workspace_path, normalize_workspace_path, to_workspace_relative, workspace_parent};
use crate::workspace::{ExportFormat, ImportRequest, Language, WorkspaceApi};

/// A local file picked up by [`DataProcessor::ingest_data`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestedFile {
    /// Path relative to the ingested source
    pub relative_path: PathBuf,
    /// Notebook language derived from the extension
    pub language: Option<Language>,
    /// Import format derived from the extension
    pub format: ExportFormat,
    /// File content
    pub content: Vec<u8>,
}

/// Outcome of [`DataProcessor::store_results`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreSummary {
    /// Directories ensured with `mkdirs`
    pub directories_created: usize,
    /// Workspace paths imported successfully
    pub imported: Vec<String>,
    /// Workspace paths that failed, with the error message
    pub failed: Vec<(String, String)>,
}

impl StoreSummary {
    /// Whether every planned import succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Syncs a local tree of notebook sources into a workspace folder
pub struct DataProcessor {
    api: Arc<dyn WorkspaceApi>,
    target_root: String,
    overwrite: bool,
    max_concurrent: usize,
    ingested: Vec<IngestedFile>,
    plan: Option<Vec<ImportRequest>>,
}

impl DataProcessor {
    /// Creates a processor that stores into `target_root`
    pub fn new(api: Arc<dyn WorkspaceApi>, target_root: &str) -> Result<Self> {
        Ok(Self {
            api,
            target_root: normalize_workspace_path(target_root)?,
            overwrite: true,
            max_concurrent: 4,
            ingested: Vec::new(),
            plan: None,
        })
    }

    /// Whether existing notebooks are replaced (default `true`)
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Upper bound on concurrent imports (default 4)
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Workspace folder the results are stored in
    pub fn target_root(&self) -> &str {
        &self.target_root
    }

    /// Files ingested so far
    pub fn ingested(&self) -> &[IngestedFile] {
        &self.ingested
    }

    /// Import plan built by the last [`process_data`](Self::process_data)
    pub fn plan(&self) -> Option<&[ImportRequest]> {
        self.plan.as_deref()
    }

    /// Reads notebook sources from a file or directory
    ///
    /// Hidden files and directories are skipped, as are files whose extension
    /// does not map to a notebook and symlinks whose target is gone. Returns
    /// the number of files ingested by this call; repeated calls accumulate.
    ///
    /// A failing call leaves the ingested files and the current plan as they
    /// were.
    pub fn ingest_data(&mut self, source: &Path) -> Result<usize> {
        if !source.exists() {
            return Err(WorkspaceError::Validation(format!(
                "Source does not exist: {}",
                source.display()
            )));
        }

        let files = if source.is_file() {
            vec![read_single(source)?]
        } else {
            read_tree(source)?
        };

        let added = files.len();
        self.ingested.extend(files);
        self.plan = None;
        info!("Ingested {} notebook sources from {}", added, source.display());
        Ok(added)
    }

    /// Builds the import plan for everything ingested so far
    ///
    /// Each file lands at `target_root/<relative path without extension>`.
    /// Two files that would land on the same workspace path are rejected.
    pub fn process_data(&mut self) -> Result<&[ImportRequest]> {
        if self.ingested.is_empty() {
            return Err(WorkspaceError::Processing("No data ingested".into()));
        }

        let mut seen: HashMap<String, &Path> = HashMap::new();
        let mut plan = Vec::with_capacity(self.ingested.len());

        for file in &self.ingested {
            let relative = to_workspace_relative(&file.relative_path);
            let path = join_workspace_path(&self.target_root, &relative)?;

            if let Some(previous) = seen.insert(path.clone(), &file.relative_path) {
                return Err(WorkspaceError::Validation(format!(
                    "{} and {} both map to {}",
                    previous.display(),
                    file.relative_path.display(),
                    path
                )));
            }

            plan.push(ImportRequest {
                path,
                language: file.language,
                content: file.content.clone(),
                format: file.format,
                overwrite: self.overwrite,
            });
        }

        plan.sort_by(|a, b| a.path.cmp(&b.path));
        debug!("Planned {} imports under {}", plan.len(), self.target_root);
        Ok(self.plan.insert(plan).as_slice())
    }

    /// Creates the needed folders and imports every planned notebook
    ///
    /// A failing folder aborts the run; failing imports are collected in the
    /// summary and the remaining imports still run.
    pub async fn store_results(&self) -> Result<StoreSummary> {
        let plan = self.plan.as_ref().ok_or_else(|| {
            WorkspaceError::Processing("process_data must run before store_results".into())
        })?;

        let mut directories = BTreeSet::new();
        directories.insert(self.target_root.clone());
        for request in plan {
            if let Some(parent) = workspace_parent(&request.path) {
                directories.insert(parent.to_string());
            }
        }

        for dir in &directories {
            self.api.create_directory(dir).await?;
        }

        let tasks: Vec<_> = plan
            .iter()
            .cloned()
            .map(|request| {
                let api = Arc::clone(&self.api);
                async move { api.import(request).await }
            })
            .collect();
        let results = ParallelProcessor::new(self.max_concurrent).process(tasks).await;

        let mut summary = StoreSummary {
            directories_created: directories.len(),
            ..StoreSummary::default()
        };
        for (request, result) in plan.iter().zip(results) {
            match result {
                Ok(_) => summary.imported.push(request.path.clone()),
                Err(e) => {
                    warn!("Import of {} failed: {}", request.path, e);
                    summary.failed.push((request.path.clone(), e.to_string()));
                }
            }
        }

        info!(
            "Stored {} notebooks under {} ({} failed)",
            summary.imported.len(),
            self.target_root,
            summary.failed.len()
        );
        Ok(summary)
    }
}

fn classify(path: &Path) -> Option<(Option<Language>, ExportFormat)> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("ipynb") {
        return Some((None, ExportFormat::Jupyter));
    }
    Language::from_extension(ext).map(|language| (Some(language), ExportFormat::Source))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map_or(false, |name| name.starts_with('.'))
}

fn read_single(source: &Path) -> Result<IngestedFile> {
    let (language, format) = classify(source).ok_or_else(|| {
        WorkspaceError::Validation(format!("Not a notebook source file: {}", source.display()))
    })?;
    let name = source
        .file_name()
        .map(PathBuf::from)
        .ok_or_else(|| WorkspaceError::Validation(format!("Invalid file name: {}", source.display())))?;
    Ok(IngestedFile {
        relative_path: name,
        language,
        format,
        content: fs::read(source)?,
    })
}

fn read_tree(source: &Path) -> Result<Vec<IngestedFile>> {
    let walker = WalkDir::new(source)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                if let Some(path) = e.path().filter(|p| is_dangling_link(p)) {
                    warn!("Skipping dangling link {}", path.display());
                    continue;
                }
                return Err(io::Error::from(e).into());
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some((language, format)) = classify(entry.path()) else {
            debug!("Skipping {}", entry.path().display());
            continue;
        };
        let relative_path = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| WorkspaceError::Processing(e.to_string()))?
            .to_path_buf();

        files.push(IngestedFile {
            relative_path,
            language,
            format,
            content: fs::read(entry.path())?,
        });
    }
    Ok(files)
}

fn is_dangling_link(path: &Path) -> bool {
    let is_link = path
        .symlink_metadata()
        .map_or(false, |m| m.file_type().is_symlink());
    is_link && fs::metadata(path).is_err()
}
