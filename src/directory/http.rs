use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;

use super::{required_username, UserDirectory, UserRecord};
use crate::classroom::{Identity, JoinRequest};
use crate::error::{ClassroomError, Result};

/// Looks users up in a remote directory service at
/// `GET {base_url}/{username}`.
pub struct HttpUserDirectory {
    base_url: String,
    client: reqwest::Client,
}

impl HttpUserDirectory {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ClassroomError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn user_url(&self, username: &str) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(username))
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn resolve_user(&self, request: &JoinRequest) -> Result<Identity> {
        let username = required_username(request)?;
        let url = self.user_url(username);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ClassroomError::UserDirectory(format!("Request failed: {}", e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(ClassroomError::UserNotFound(username.to_string()));
            }
            status if !status.is_success() => {
                return Err(ClassroomError::UserDirectory(format!(
                    "Lookup failed with status {}",
                    status
                )));
            }
            _ => {}
        }

        let record: UserRecord = response.json().await.map_err(|e| {
            ClassroomError::UserDirectory(format!("Failed to parse response: {}", e))
        })?;

        tracing::debug!(
            username = %record.username,
            role = %record.role,
            "Resolved user from directory service"
        );

        Ok(record.into_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classroom::Role;
    use std::net::SocketAddr;
    use warp::Filter;

    fn request(username: &str) -> JoinRequest {
        JoinRequest {
            username: username.to_string(),
            role: Some(Role::Teacher),
            display_name: None,
        }
    }

    fn spawn_directory_service() -> SocketAddr {
        let users = warp::path!("users" / String).map(|raw: String| {
            let username = urlencoding::decode(&raw)
                .map(|name| name.into_owned())
                .unwrap_or(raw);
            match username.as_str() {
                "ana lopez" => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({
                        "username": "ana lopez",
                        "fullName": "Ana Lopez",
                        "role": "student"
                    })),
                    warp::http::StatusCode::OK,
                ),
                "broken" => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({})),
                    warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                ),
                _ => warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({})),
                    warp::http::StatusCode::NOT_FOUND,
                ),
            }
        });

        let (addr, server) = warp::serve(users).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[test]
    fn test_user_url_is_encoded() {
        let directory = HttpUserDirectory::new("http://directory.local/users/", 5).unwrap();
        assert_eq!(
            directory.user_url("ana lopez"),
            "http://directory.local/users/ana%20lopez"
        );
    }

    #[tokio::test]
    async fn test_resolves_known_user() {
        let addr = spawn_directory_service();
        let directory = HttpUserDirectory::new(&format!("http://{}/users", addr), 5).unwrap();

        let identity = directory.resolve_user(&request("ana lopez")).await.unwrap();
        assert_eq!(identity.display_name, "Ana Lopez");
        assert_eq!(identity.role, Role::Student);
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let addr = spawn_directory_service();
        let directory = HttpUserDirectory::new(&format!("http://{}/users", addr), 5).unwrap();

        let result = directory.resolve_user(&request("ghost")).await;
        assert!(matches!(result, Err(ClassroomError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn test_server_error_is_directory_failure() {
        let addr = spawn_directory_service();
        let directory = HttpUserDirectory::new(&format!("http://{}/users", addr), 5).unwrap();

        let result = directory.resolve_user(&request("broken")).await;
        assert!(matches!(result, Err(ClassroomError::UserDirectory(_))));
    }
}
