use std::fmt;
use std::str::FromStr;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use crate::error::{Result, WorkspaceError};

/// Kind of object stored in the workspace tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ObjectType {
    /// Notebook
    Notebook,
    /// Folder
    Directory,
    /// Library
    Library,
    /// Workspace file
    File,
    /// Git folder
    Repo,
    /// Lakeview dashboard
    Dashboard,
    /// Anything this client does not know about
    #[default]
    Unknown,
}

impl ObjectType {
    /// Wire name of the object type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Notebook => "NOTEBOOK",
            Self::Directory => "DIRECTORY",
            Self::Library => "LIBRARY",
            Self::File => "FILE",
            Self::Repo => "REPO",
            Self::Dashboard => "DASHBOARD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for ObjectType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "NOTEBOOK" => Self::Notebook,
            "DIRECTORY" => Self::Directory,
            "LIBRARY" => Self::Library,
            "FILE" => Self::File,
            "REPO" => Self::Repo,
            "DASHBOARD" => Self::Dashboard,
            _ => Self::Unknown,
        }
    }
}

impl From<ObjectType> for String {
    fn from(value: ObjectType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notebook language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Language {
    /// Python
    Python,
    /// Scala
    Scala,
    /// SQL
    Sql,
    /// R
    R,
}

impl Language {
    /// Wire name of the language
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Python => "PYTHON",
            Self::Scala => "SCALA",
            Self::Sql => "SQL",
            Self::R => "R",
        }
    }

    /// Maps a source file extension to a notebook language
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "py" => Some(Self::Python),
            "scala" => Some(Self::Scala),
            "sql" => Some(Self::Sql),
            "r" => Some(Self::R),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Language {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PYTHON" | "PY" => Ok(Self::Python),
            "SCALA" => Ok(Self::Scala),
            "SQL" => Ok(Self::Sql),
            "R" => Ok(Self::R),
            other => Err(WorkspaceError::Validation(format!("Unknown language: {}", other))),
        }
    }
}

/// Format used for import and export payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExportFormat {
    /// Plain source code
    #[default]
    Source,
    /// HTML rendering
    Html,
    /// Jupyter `.ipynb`
    Jupyter,
    /// Databricks archive
    Dbc,
    /// R Markdown
    RMarkdown,
    /// Let the server pick
    Auto,
}

impl ExportFormat {
    /// Wire name of the format
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "SOURCE",
            Self::Html => "HTML",
            Self::Jupyter => "JUPYTER",
            Self::Dbc => "DBC",
            Self::RMarkdown => "R_MARKDOWN",
            Self::Auto => "AUTO",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "SOURCE" => Ok(Self::Source),
            "HTML" => Ok(Self::Html),
            "JUPYTER" | "IPYNB" => Ok(Self::Jupyter),
            "DBC" => Ok(Self::Dbc),
            "R_MARKDOWN" | "RMD" => Ok(Self::RMarkdown),
            "AUTO" => Ok(Self::Auto),
            other => Err(WorkspaceError::Validation(format!("Unknown format: {}", other))),
        }
    }
}

/// Metadata of a single workspace object as returned by `list` and `get-status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Object kind
    #[serde(default)]
    pub object_type: ObjectType,
    /// Absolute workspace path
    pub path: String,
    /// Notebook language, only set for notebooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Unique identifier of the object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    /// Creation time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    /// Last modification time in epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<i64>,
    /// Size in bytes, only set for files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Identifier used by the permissions API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<String>,
}

impl ObjectInfo {
    /// Last path segment
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Whether the object can contain other objects
    pub fn is_container(&self) -> bool {
        matches!(self.object_type, ObjectType::Directory | ObjectType::Repo)
    }

    /// Modification time as a timestamp
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified_at.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListResponse {
    #[serde(default)]
    pub objects: Vec<ObjectInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportResponse {
    #[serde(default)]
    pub content: Option<String>,
}

/// A single object to import into the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Destination workspace path
    pub path: String,
    /// Notebook language; required for `SOURCE` imports
    pub language: Option<Language>,
    /// Raw content, base64-encoded on the wire
    pub content: Vec<u8>,
    /// Payload format
    pub format: ExportFormat,
    /// Replace an existing object at `path`
    pub overwrite: bool,
}

impl ImportRequest {
    /// Source notebook import without overwrite
    pub fn notebook(path: impl Into<String>, language: Language, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            language: Some(language),
            content: content.into(),
            format: ExportFormat::Source,
            overwrite: false,
        }
    }

    /// Sets the payload format
    pub fn with_format(mut self, format: ExportFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets the overwrite flag
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.format == ExportFormat::Source && self.language.is_none() {
            return Err(WorkspaceError::Validation(format!(
                "A language is required to import {} in SOURCE format",
                self.path
            )));
        }
        Ok(())
    }
}

/// Permission level that can be granted on a workspace object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionLevel {
    /// Read only
    CanRead,
    /// Run notebooks
    CanRun,
    /// Edit content
    CanEdit,
    /// Full control
    CanManage,
}

impl FromStr for PermissionLevel {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "CAN_READ" | "READ" => Ok(Self::CanRead),
            "CAN_RUN" | "RUN" => Ok(Self::CanRun),
            "CAN_EDIT" | "EDIT" => Ok(Self::CanEdit),
            "CAN_MANAGE" | "MANAGE" => Ok(Self::CanManage),
            other => Err(WorkspaceError::Validation(format!("Unknown permission level: {}", other))),
        }
    }
}

/// One entry of an access control list update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlRequest {
    /// User principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Group principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// Service principal application id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
    /// Level being granted
    pub permission_level: PermissionLevel,
}

impl AccessControlRequest {
    /// Grants `level` to a user
    pub fn for_user(name: impl Into<String>, level: PermissionLevel) -> Self {
        Self { user_name: Some(name.into()), group_name: None, service_principal_name: None, permission_level: level }
    }

    /// Grants `level` to a group
    pub fn for_group(name: impl Into<String>, level: PermissionLevel) -> Self {
        Self { user_name: None, group_name: Some(name.into()), service_principal_name: None, permission_level: level }
    }

    /// Grants `level` to a service principal
    pub fn for_service_principal(name: impl Into<String>, level: PermissionLevel) -> Self {
        Self { user_name: None, group_name: None, service_principal_name: Some(name.into()), permission_level: level }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let principals = [&self.user_name, &self.group_name, &self.service_principal_name]
            .iter()
            .filter(|p| p.as_deref().map_or(false, |name| !name.trim().is_empty()))
            .count();
        if principals != 1 {
            return Err(WorkspaceError::Validation(
                "Each access control entry needs exactly one principal".into(),
            ));
        }
        Ok(())
    }
}

/// Permission held by a principal, possibly inherited from a parent folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Level name, e.g. `CAN_MANAGE`
    pub permission_level: String,
    /// Whether the permission comes from a parent object
    #[serde(default)]
    pub inherited: bool,
    /// Objects the permission is inherited from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inherited_from_object: Vec<String>,
}

/// Permissions of one principal on an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlResponse {
    /// User principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Group principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
    /// Service principal application id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_principal_name: Option<String>,
    /// Display name of the principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Effective permissions
    #[serde(default)]
    pub all_permissions: Vec<Permission>,
}

impl AccessControlResponse {
    /// Name of whichever principal this entry describes
    pub fn principal(&self) -> Option<&str> {
        self.user_name
            .as_deref()
            .or(self.group_name.as_deref())
            .or(self.service_principal_name.as_deref())
    }
}

/// Access control list of a workspace object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPermissions {
    /// Identifier of the object, e.g. `/notebooks/1234`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    /// Object kind, e.g. `notebook`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    /// Per-principal entries
    #[serde(default)]
    pub access_control_list: Vec<AccessControlResponse>,
}
