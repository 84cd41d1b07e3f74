/// Workspace and local path handling
pub mod path;
/// Retry with backoff for transient failures
pub mod retry;

pub use path::{normalize_user_input_path, normalize_workspace_path};
pub use retry::with_retry;
