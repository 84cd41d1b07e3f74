/// Environment variable holding the workspace host
pub const HOST_ENV: &str = "DATABRICKS_HOST";
/// Environment variable holding the personal access token
pub const TOKEN_ENV: &str = "DATABRICKS_TOKEN";

/// Workspace credentials gathered from the environment or the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Workspace host
    pub host: Option<String>,
    /// Personal access token
    pub token: Option<String>,
}

impl Credentials {
    /// Reads `DATABRICKS_HOST` and `DATABRICKS_TOKEN`, ignoring empty values
    pub fn from_env() -> Self {
        Self {
            host: get_env_value(HOST_ENV),
            token: get_env_value(TOKEN_ENV),
        }
    }
}

/// Returns the value of `key`, treating an empty variable as unset
pub fn get_env_value(key: &str) -> Option<String> {
    let value = std::env::var(key).ok()?;
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
