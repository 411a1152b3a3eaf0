pub mod http;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::classroom::{Identity, JoinRequest, Role};
use crate::config::DirectoryConfig;
use crate::error::{ClassroomError, Result};

pub use http::HttpUserDirectory;

/// Resolves the identity a connection claims when joining.
#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    async fn resolve_user(&self, request: &JoinRequest) -> Result<Identity>;
}

/// Build the directory selected by configuration.
pub fn from_config(config: &DirectoryConfig) -> Result<Arc<dyn UserDirectory>> {
    match config {
        DirectoryConfig::Open => {
            tracing::warn!("No user directory configured, trusting roles claimed at join");
            Ok(Arc::new(OpenUserDirectory))
        }
        DirectoryConfig::File(path) => Ok(Arc::new(StaticUserDirectory::from_file(path)?)),
        DirectoryConfig::Http {
            base_url,
            timeout_secs,
        } => Ok(Arc::new(HttpUserDirectory::new(base_url, *timeout_secs)?)),
    }
}

fn required_username(request: &JoinRequest) -> Result<&str> {
    let username = request.username.trim();
    if username.is_empty() {
        return Err(ClassroomError::UsernameRequired);
    }
    Ok(username)
}

/// Accepts every username and takes the claimed role at face value.
#[derive(Debug, Default, Clone)]
pub struct OpenUserDirectory;

#[async_trait]
impl UserDirectory for OpenUserDirectory {
    async fn resolve_user(&self, request: &JoinRequest) -> Result<Identity> {
        let username = required_username(request)?;
        let display_name = request
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(username);

        Ok(Identity {
            username: username.to_string(),
            display_name: display_name.to_string(),
            role: request.role.unwrap_or_default(),
        })
    }
}

/// One entry of a user directory file or response body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub username: String,
    #[serde(alias = "fullName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

impl UserRecord {
    pub fn into_identity(self) -> Identity {
        let display_name = self
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.username.clone());

        Identity {
            username: self.username,
            display_name,
            role: self.role,
        }
    }
}

/// Fixed roster loaded once at startup. Roles come from the roster, never
/// from the join payload.
#[derive(Debug, Default, Clone)]
pub struct StaticUserDirectory {
    users: HashMap<String, UserRecord>,
}

impl StaticUserDirectory {
    pub fn new(records: Vec<UserRecord>) -> Self {
        let users = records
            .into_iter()
            .map(|record| (record.username.clone(), record))
            .collect();
        Self { users }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClassroomError::InvalidConfiguration(format!(
                "Failed to read user directory {}: {}",
                path.display(),
                e
            ))
        })?;
        let directory = Self::from_json(&contents)?;

        tracing::info!(
            path = %path.display(),
            users = directory.len(),
            "Loaded user directory"
        );

        Ok(directory)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let records: Vec<UserRecord> = serde_json::from_str(contents).map_err(|e| {
            ClassroomError::InvalidConfiguration(format!("Malformed user directory: {}", e))
        })?;
        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn resolve_user(&self, request: &JoinRequest) -> Result<Identity> {
        let username = required_username(request)?;
        self.users
            .get(username)
            .cloned()
            .map(UserRecord::into_identity)
            .ok_or_else(|| ClassroomError::UserNotFound(username.to_string()))
    }
}
