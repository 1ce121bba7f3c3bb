//! Test server harness for E2E testing
//!
//! Provides TestAuthServer, which runs the real router on a random port
//! backed by an in-memory credential and role store.

use crate::fixtures::test_config;
use common::secret::SecretString;
use gruda_auth::config::Config;
use gruda_auth::models::{NewUser, TokenResponse, UserIdentity};
use gruda_auth::observability::metrics::prometheus_builder;
use gruda_auth::repositories::memory::InMemoryStore;
use gruda_auth::repositories::{CredentialStore, RoleStore};
use gruda_auth::routes::{self, AppState};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the auth service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_e2e() -> Result<()> {
///     let server = TestAuthServer::spawn().await?;
///     server.create_user("alice", ALICE_PASSWORD, &["Admin"]).await?;
///
///     let response = server.login_response("alice", ALICE_PASSWORD).await?;
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestAuthServer {
    addr: SocketAddr,
    store: Arc<InMemoryStore>,
    config: Config,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestAuthServer {
    /// Spawn with [`test_config`] and an empty store
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_config(test_config()).await
    }

    /// Spawn with a custom configuration
    ///
    /// The server binds to 127.0.0.1:0. Its metrics recorder is private to
    /// the server and never installed globally, so many servers can run in
    /// one test process.
    pub async fn spawn_with_config(config: Config) -> Result<Self, anyhow::Error> {
        let store = Arc::new(InMemoryStore::new(config.bcrypt_cost));

        let state = Arc::new(AppState {
            credential_store: store.clone(),
            role_store: store.clone(),
            config: config.clone(),
        });

        let metrics_handle = prometheus_builder()
            .map_err(|e| anyhow::anyhow!("Failed to build metrics recorder: {}", e))?
            .build_recorder()
            .handle();

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, make_service).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            store,
            config,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The store behind the running server
    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create a user with `password` holding `roles`, creating missing roles
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        roles: &[&str],
    ) -> Result<UserIdentity, anyhow::Error> {
        let user = self
            .store
            .create_user(
                &NewUser {
                    username: username.to_string(),
                    email: format!("{}@gruda.io", username),
                },
                &SecretString::from(password),
            )
            .await?;

        for role in roles {
            if !self.store.role_exists(role).await? {
                self.store.create_role(role).await?;
            }
            self.store.add_user_role(&user.id, role).await?;
        }

        self.store
            .find_by_username(username)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User '{}' vanished after creation", username))
    }

    /// POST the login form and return the raw response
    pub async fn login_response(
        &self,
        username: &str,
        password: &str,
    ) -> Result<reqwest::Response, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/account/login", self.url()))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        Ok(response)
    }

    /// Log in and return the access token, failing on any non-200
    pub async fn login(&self, username: &str, password: &str) -> Result<String, anyhow::Error> {
        let response = self.login_response(username, password).await?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Login failed with status {}", status);
        }
        let body: TokenResponse = response.json().await?;
        Ok(body.access_token)
    }

    /// GET the identity endpoint with `token` as bearer
    pub async fn authtest(&self, token: &str) -> Result<reqwest::Response, anyhow::Error> {
        let response = self
            .client
            .get(format!("{}/api/authtest", self.url()))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(response)
    }
}

impl Drop for TestAuthServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}
