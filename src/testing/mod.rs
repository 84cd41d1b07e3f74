use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use async_trait::async_trait;

use crate::error::{Result, WorkspaceError};
use crate::utils::path::{normalize_workspace_path, workspace_parent};
use crate::workspace::{
    AccessControlRequest, AccessControlResponse, ExportFormat, ImportRequest, ObjectInfo,
    ObjectPermissions, ObjectType, Permission, WorkspaceApi,
};

#[derive(Debug, Clone)]
struct Node {
    info: ObjectInfo,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    permissions: HashMap<String, Vec<AccessControlResponse>>,
    failing_imports: HashSet<String>,
    next_id: i64,
    calls: Vec<String>,
}

/// In-memory workspace tree implementing [`WorkspaceApi`]
///
/// Mirrors the error behaviour of the real service closely enough to exercise
/// callers without a network: missing parents, existing targets and non-empty
/// directories are rejected the same way.
pub struct InMemoryWorkspace {
    state: Mutex<State>,
}

impl Default for InMemoryWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryWorkspace {
    /// Creates a workspace containing only the root directory
    pub fn new() -> Self {
        let mut state = State::default();
        let root = state.new_info("/", ObjectType::Directory, None);
        state.nodes.insert("/".into(), Node { info: root, content: Vec::new() });
        Self { state: Mutex::new(state) }
    }

    /// Makes every import to `path` fail with a server error
    pub fn fail_imports_to(&self, path: &str) {
        self.lock().failing_imports.insert(path.to_string());
    }

    /// Stored content of an object
    pub fn content(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().nodes.get(path).map(|n| n.content.clone())
    }

    /// Every stored path, sorted
    pub fn paths(&self) -> Vec<String> {
        self.lock().nodes.keys().cloned().collect()
    }

    /// Operations received so far, as `operation path`
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl State {
    fn new_info(&mut self, path: &str, object_type: ObjectType, language: Option<crate::workspace::Language>) -> ObjectInfo {
        self.next_id += 1;
        ObjectInfo {
            object_type,
            path: path.to_string(),
            language,
            object_id: Some(self.next_id),
            created_at: Some(chrono::Utc::now().timestamp_millis()),
            modified_at: Some(chrono::Utc::now().timestamp_millis()),
            size: None,
            resource_id: Some(self.next_id.to_string()),
        }
    }

    fn record(&mut self, op: &str, path: &str) {
        self.calls.push(format!("{} {}", op, path));
    }

    fn get(&self, path: &str) -> Result<&Node> {
        self.nodes
            .get(path)
            .ok_or_else(|| WorkspaceError::NotFound(format!("Path ({}) doesn't exist.", path)))
    }

    fn require_directory(&self, path: &str) -> Result<()> {
        let node = self.get(path)?;
        if !node.info.is_container() {
            return Err(bad_request(format!("{} is not a directory", path)));
        }
        Ok(())
    }

    fn descendants(&self, path: &str) -> Vec<String> {
        let prefix = if path == "/" { "/".to_string() } else { format!("{}/", path) };
        self.nodes
            .keys()
            .filter(|k| k.as_str() != "/" && k.starts_with(&prefix))
            .cloned()
            .collect()
    }
}

fn bad_request(message: String) -> WorkspaceError {
    WorkspaceError::Api {
        status: 400,
        error_code: "INVALID_PARAMETER_VALUE".into(),
        message,
    }
}

#[async_trait]
impl WorkspaceApi for InMemoryWorkspace {
    async fn list_contents(&self, path: &str) -> Result<Vec<ObjectInfo>> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("list", &path);
        state.require_directory(&path)?;

        Ok(state
            .nodes
            .values()
            .filter(|n| n.info.path != "/" && workspace_parent(&n.info.path) == Some(path.as_str()))
            .map(|n| n.info.clone())
            .collect())
    }

    async fn get_status(&self, path: &str) -> Result<ObjectInfo> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("get-status", &path);
        Ok(state.get(&path)?.info.clone())
    }

    async fn delete(&self, path: &str, recursive: bool) -> Result<bool> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("delete", &path);
        state.get(&path)?;
        if path == "/" {
            return Err(bad_request("Cannot delete the workspace root".into()));
        }

        let children = state.descendants(&path);
        if !children.is_empty() && !recursive {
            return Err(WorkspaceError::Api {
                status: 400,
                error_code: "DIRECTORY_NOT_EMPTY".into(),
                message: format!("Folder ({}) is not empty", path),
            });
        }
        for child in children {
            state.nodes.remove(&child);
        }
        state.nodes.remove(&path);
        state.permissions.remove(&path);
        Ok(true)
    }

    async fn create_directory(&self, path: &str) -> Result<bool> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("mkdirs", &path);

        let mut missing = Vec::new();
        let mut current = Some(path.as_str());
        while let Some(p) = current {
            match state.nodes.get(p) {
                Some(node) if node.info.is_container() => break,
                Some(_) => {
                    return Err(WorkspaceError::AlreadyExists(format!(
                        "A non-directory object exists at {}",
                        p
                    )))
                }
                None => missing.push(p.to_string()),
            }
            current = workspace_parent(p);
        }

        for dir in missing.into_iter().rev() {
            let info = state.new_info(&dir, ObjectType::Directory, None);
            state.nodes.insert(dir, Node { info, content: Vec::new() });
        }
        Ok(true)
    }

    async fn import(&self, request: ImportRequest) -> Result<bool> {
        request.validate()?;
        let path = normalize_workspace_path(&request.path)?;
        let mut state = self.lock();
        state.record("import", &path);

        if state.failing_imports.contains(&path) {
            return Err(WorkspaceError::Api {
                status: 500,
                error_code: "INTERNAL_ERROR".into(),
                message: format!("Import of {} failed", path),
            });
        }
        let parent = workspace_parent(&path).unwrap_or("/").to_string();
        state.require_directory(&parent)?;
        if let Some(existing) = state.nodes.get(&path) {
            if !request.overwrite || existing.info.is_container() {
                return Err(WorkspaceError::AlreadyExists(format!(
                    "Path ({}) already exists.",
                    path
                )));
            }
        }

        let mut info = state.new_info(&path, ObjectType::Notebook, request.language);
        info.size = Some(request.content.len() as u64);
        state.nodes.insert(path, Node { info, content: request.content });
        Ok(true)
    }

    async fn export_bytes(&self, path: &str, _format: ExportFormat) -> Result<Vec<u8>> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("export", &path);
        let node = state.get(&path)?;
        if node.info.is_container() {
            return Err(bad_request(format!("{} is a directory", path)));
        }
        Ok(node.content.clone())
    }

    async fn get_permissions(&self, path: &str) -> Result<ObjectPermissions> {
        let path = normalize_workspace_path(path)?;
        let mut state = self.lock();
        state.record("get-permissions", &path);
        let info = state.get(&path)?.info.clone();

        Ok(ObjectPermissions {
            object_id: info.object_id.map(|id| format!("/{}s/{}", info.object_type.as_str().to_lowercase(), id)),
            object_type: Some(info.object_type.as_str().to_lowercase()),
            access_control_list: state.permissions.get(&path).cloned().unwrap_or_default(),
        })
    }

    async fn update_permissions(
        &self,
        path: &str,
        access_control_list: &[AccessControlRequest],
    ) -> Result<ObjectPermissions> {
        let normalized = normalize_workspace_path(path)?;
        if access_control_list.is_empty() {
            return Err(WorkspaceError::Validation("Access control list is empty".into()));
        }
        {
            let mut state = self.lock();
            state.record("update-permissions", &normalized);
            state.get(&normalized)?;
            for entry in access_control_list {
                entry.validate()?;
            }

            let acl = state.permissions.entry(normalized.clone()).or_default();
            for entry in access_control_list {
                let level = serde_json::to_value(entry.permission_level)?
                    .as_str()
                    .unwrap_or_default()
                    .to_string();
                let response = AccessControlResponse {
                    user_name: entry.user_name.clone(),
                    group_name: entry.group_name.clone(),
                    service_principal_name: entry.service_principal_name.clone(),
                    display_name: None,
                    all_permissions: vec![Permission {
                        permission_level: level,
                        inherited: false,
                        inherited_from_object: Vec::new(),
                    }],
                };
                acl.retain(|existing| {
                    existing.user_name != response.user_name
                        || existing.group_name != response.group_name
                        || existing.service_principal_name != response.service_principal_name
                });
                acl.push(response);
            }
        }
        self.get_permissions(&normalized).await
    }

    async fn move_object(&self, source_path: &str, destination_path: &str) -> Result<bool> {
        let source = normalize_workspace_path(source_path)?;
        let destination = normalize_workspace_path(destination_path)?;
        let mut state = self.lock();
        state.record("move", &source);

        state.get(&source)?;
        if state.nodes.contains_key(&destination) {
            return Err(WorkspaceError::AlreadyExists(format!(
                "Path ({}) already exists.",
                destination
            )));
        }
        let parent = workspace_parent(&destination).unwrap_or("/").to_string();
        state.require_directory(&parent)?;

        let mut moved = state.descendants(&source);
        moved.push(source.clone());
        for old in moved {
            if let Some(mut node) = state.nodes.remove(&old) {
                let new_path = format!("{}{}", destination, &old[source.len()..]);
                node.info.path = new_path.clone();
                state.nodes.insert(new_path, node);
            }
        }
        Ok(true)
    }
}
