use async_trait::async_trait;
use crate::error::{Result, WorkspaceError};

/// HTTP client for the Workspace REST API
pub mod client;
/// Request and response types of the Workspace API
pub mod types;

pub use client::WorkspaceClient;
pub use types::{
    AccessControlRequest, AccessControlResponse, ExportFormat, ImportRequest, Language,
    ObjectInfo, ObjectPermissions, ObjectType, Permission, PermissionLevel,
};

/// Operations on a Databricks workspace tree
///
/// Implemented by [`WorkspaceClient`] over HTTP; the pipeline only depends on
/// this trait so it can run against any backend.
#[async_trait]
pub trait WorkspaceApi: Send + Sync {
    /// Lists the direct children of a directory
    async fn list_contents(&self, path: &str) -> Result<Vec<ObjectInfo>>;

    /// Returns metadata of a single object
    async fn get_status(&self, path: &str) -> Result<ObjectInfo>;

    /// Deletes an object; non-empty directories need `recursive`
    async fn delete(&self, path: &str, recursive: bool) -> Result<bool>;

    /// Creates a directory and any missing parents
    async fn create_directory(&self, path: &str) -> Result<bool>;

    /// Imports an object
    async fn import(&self, request: ImportRequest) -> Result<bool>;

    /// Exports an object and returns the decoded payload
    async fn export_bytes(&self, path: &str, format: ExportFormat) -> Result<Vec<u8>>;

    /// Reads the access control list of an object
    async fn get_permissions(&self, path: &str) -> Result<ObjectPermissions>;

    /// Adds or changes entries of the access control list of an object
    async fn update_permissions(
        &self,
        path: &str,
        access_control_list: &[AccessControlRequest],
    ) -> Result<ObjectPermissions>;

    /// Moves or renames an object
    async fn move_object(&self, source_path: &str, destination_path: &str) -> Result<bool>;

    /// Imports notebook source text
    async fn import_notebook(
        &self,
        path: &str,
        language: Language,
        content: &str,
        format: ExportFormat,
    ) -> Result<bool> {
        let request = ImportRequest::notebook(path, language, content.as_bytes()).with_format(format);
        self.import(request).await
    }

    /// Exports a notebook as UTF-8 text
    async fn export_notebook(&self, path: &str, format: ExportFormat) -> Result<String> {
        let bytes = self.export_bytes(path, format).await?;
        Ok(String::from_utf8(bytes)?)
    }

    /// Whether an object exists at `path`
    async fn exists(&self, path: &str) -> Result<bool> {
        match self.get_status(path).await {
            Ok(_) => Ok(true),
            Err(WorkspaceError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Lists everything below `path`, depth first, directories included
    async fn list_recursive(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let mut found = Vec::new();
        let mut pending = vec![path.to_string()];

        while let Some(dir) = pending.pop() {
            let mut children = self.list_contents(&dir).await?;
            children.sort_by(|a, b| b.path.cmp(&a.path));
            for child in children {
                if child.is_container() {
                    pending.push(child.path.clone());
                }
                found.push(child);
            }
        }

        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }
}
