//! Azure Key Vault client with auto-negotiating dual-mode (HTTP + CLI)

use async_trait::async_trait;
use kvexport_secrets::{SecretError, SecretName, SecretRecord, VaultClient};
use reqwest::{Client, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Environment variable holding a Key Vault data-plane access token.
pub const TOKEN_ENV: &str = "AZURE_KEYVAULT_TOKEN";

/// Key Vault REST API version used in HTTP mode.
pub const API_VERSION: &str = "7.4";

/// Default budget for one external call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for Azure Key Vault access
#[derive(Debug, Clone)]
pub struct AzureClientConfig {
    /// Path or name of the `az` executable (CLI mode)
    pub az_path: String,

    /// Budget for each external call
    pub timeout: Duration,

    /// Vault base URL override (HTTP mode); defaults to `https://{vault}.vault.azure.net`
    pub vault_url: Option<String>,

    /// Access token; when unset, [`TOKEN_ENV`] is consulted
    pub access_token: Option<SecretString>,
}

impl Default for AzureClientConfig {
    fn default() -> Self {
        Self {
            az_path: "az".to_string(),
            timeout: DEFAULT_TIMEOUT,
            vault_url: None,
            access_token: None,
        }
    }
}

/// JSON emitted by `az keyvault secret show`
#[derive(Debug, Deserialize)]
struct CliSecret {
    name: Option<String>,
    value: Option<String>,
}

/// Secret bundle returned by `GET /secrets/{name}`
#[derive(Debug, Deserialize)]
struct SecretBundle {
    id: Option<String>,
    value: Option<String>,
}

/// Error body returned by the Key Vault REST API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

struct HttpMode {
    client: Client,
    token: SecretString,
}

/// Reads secrets from Azure Key Vault
///
/// Mode is auto-negotiated based on environment:
/// - If an access token is configured or `AZURE_KEYVAULT_TOKEN` is set → HTTP mode
/// - Otherwise → CLI mode (uses `az`)
///
/// In HTTP mode the data-plane API has no subscription scope, so
/// [`set_context`](VaultClient::set_context) only records the request.
pub struct AzureKeyVaultClient {
    config: AzureClientConfig,
    http: Option<HttpMode>,
}

impl std::fmt::Debug for AzureKeyVaultClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureKeyVaultClient")
            .field("mode", &self.mode())
            .field("az_path", &self.config.az_path)
            .field("timeout", &self.config.timeout)
            .finish_non_exhaustive()
    }
}

impl AzureKeyVaultClient {
    /// Create a new client with auto-detected mode
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: AzureClientConfig) -> Result<Self, SecretError> {
        let token = config.access_token.clone().or_else(|| {
            std::env::var(TOKEN_ENV)
                .ok()
                .filter(|t| !t.trim().is_empty())
                .map(SecretString::from)
        });

        let http = match token {
            Some(token) => {
                let client = Client::builder()
                    .user_agent(concat!("kvexport/", env!("CARGO_PKG_VERSION")))
                    .timeout(config.timeout)
                    .build()
                    .map_err(|e| SecretError::Configuration {
                        message: format!("Failed to build HTTP client: {e}"),
                    })?;
                Some(HttpMode { client, token })
            }
            None => None,
        };

        Ok(Self { config, http })
    }

    /// Create a client that always shells out to `az`
    #[must_use]
    pub fn cli(az_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            config: AzureClientConfig {
                az_path: az_path.into(),
                timeout,
                ..AzureClientConfig::default()
            },
            http: None,
        }
    }

    /// Active mode, `"http"` or `"cli"`
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        if self.http.is_some() { "http" } else { "cli" }
    }

    /// Run `az` with `args`, returning stdout.
    ///
    /// The child is killed if the timeout fires.
    async fn run_az(
        &self,
        args: &[&str],
        on_error: impl Fn(String) -> SecretError,
    ) -> Result<String, SecretError> {
        let operation = format!("az {}", args.iter().take(3).copied().collect::<Vec<_>>().join(" "));

        let mut command = Command::new(&self.config.az_path);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.config.timeout, command.output())
            .await
            .map_err(|_| SecretError::Timeout {
                operation: operation.clone(),
                timeout: self.config.timeout,
            })?
            .map_err(|e| on_error(format!("Failed to execute {}: {e}", self.config.az_path)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(on_error(format!(
                "{operation} failed ({}): {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn set_context_cli(&self, subscription_id: &str) -> Result<(), SecretError> {
        self.run_az(
            &["account", "set", "--subscription", subscription_id],
            |message| SecretError::ContextFailed {
                subscription: subscription_id.to_string(),
                message,
            },
        )
        .await
        .map_err(|e| match e {
            // A hung `az account set` is still a context failure
            SecretError::Timeout { .. } => SecretError::ContextFailed {
                subscription: subscription_id.to_string(),
                message: e.to_string(),
            },
            other => other,
        })?;
        Ok(())
    }

    async fn get_secret_cli(
        &self,
        name: &SecretName,
        vault: &str,
    ) -> Result<SecretRecord, SecretError> {
        let stdout = self
            .run_az(
                &[
                    "keyvault",
                    "secret",
                    "show",
                    "--name",
                    name.as_str(),
                    "--vault-name",
                    vault,
                ],
                |message| SecretError::FetchFailed {
                    name: name.to_string(),
                    message,
                },
            )
            .await?;

        let parsed: CliSecret =
            serde_json::from_str(&stdout).map_err(|e| SecretError::MalformedResponse {
                name: name.to_string(),
                message: format!("az output is not a secret object: {e}"),
            })?;

        let value = parsed.value.ok_or_else(|| SecretError::MalformedResponse {
            name: name.to_string(),
            message: "response has no 'value' field".to_string(),
        })?;
        let canonical = parsed.name.unwrap_or_else(|| name.to_string());

        Ok(SecretRecord::new(canonical, value))
    }

    /// Build `{base}/secrets/{name}?api-version=…`
    fn secret_url(&self, name: &SecretName, vault: &str) -> Result<Url, SecretError> {
        let base = self
            .config
            .vault_url
            .clone()
            .unwrap_or_else(|| format!("https://{vault}.vault.azure.net"));

        let mut url = Url::parse(&base).map_err(|e| SecretError::Configuration {
            message: format!("Invalid vault URL '{base}': {e}"),
        })?;
        url.path_segments_mut()
            .map_err(|()| SecretError::Configuration {
                message: format!("Vault URL '{base}' cannot be a base"),
            })?
            .pop_if_empty()
            .push("secrets")
            .push(name.as_str());
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn get_secret_http(
        &self,
        http: &HttpMode,
        name: &SecretName,
        vault: &str,
    ) -> Result<SecretRecord, SecretError> {
        let url = self.secret_url(name, vault)?;
        tracing::debug!(%url, "Requesting secret bundle");

        let response = http
            .client
            .get(url)
            .bearer_auth(http.token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SecretError::Timeout {
                        operation: format!("GET secret '{name}'"),
                        timeout: self.config.timeout,
                    }
                } else {
                    SecretError::FetchFailed {
                        name: name.to_string(),
                        message: format!("Key Vault request failed: {e}"),
                    }
                }
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound {
                name: name.to_string(),
                vault: vault.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::FetchFailed {
                name: name.to_string(),
                message: format!("Key Vault returned {status}: {}", error_message(&body)),
            });
        }

        // The client timeout also covers reading the body
        let bundle: SecretBundle = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SecretError::Timeout {
                    operation: format!("GET secret '{name}'"),
                    timeout: self.config.timeout,
                }
            } else {
                SecretError::MalformedResponse {
                    name: name.to_string(),
                    message: format!("Response is not a secret bundle: {e}"),
                }
            }
        })?;

        let value = bundle.value.ok_or_else(|| SecretError::MalformedResponse {
            name: name.to_string(),
            message: "secret bundle has no 'value' field".to_string(),
        })?;
        let canonical = bundle
            .id
            .as_deref()
            .and_then(name_from_id)
            .unwrap_or_else(|| name.to_string());

        Ok(SecretRecord::new(canonical, value))
    }
}

/// Extract the secret name from an id like `https://kv.vault.azure.net/secrets/{name}/{version}`
fn name_from_id(id: &str) -> Option<String> {
    let (_, rest) = id.split_once("/secrets/")?;
    rest.split('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Best-effort message from a Key Vault error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error: ErrorDetail { code, message },
        }) => match (code, message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => "unknown error".to_string(),
        },
        Err(_) => body.trim().to_string(),
    }
}

#[async_trait]
impl VaultClient for AzureKeyVaultClient {
    fn provider_name(&self) -> &'static str {
        "azure"
    }

    async fn set_context(&self, subscription_id: &str) -> Result<(), SecretError> {
        if self.http.is_some() {
            tracing::debug!(
                subscription = subscription_id,
                "HTTP mode has no subscription scope; context recorded only"
            );
            return Ok(());
        }
        self.set_context_cli(subscription_id).await
    }

    async fn get_secret(
        &self,
        name: &SecretName,
        vault: &str,
    ) -> Result<SecretRecord, SecretError> {
        // Try HTTP mode if available
        if let Some(http) = &self.http {
            return self.get_secret_http(http, name, vault).await;
        }

        // Fallback to CLI
        self.get_secret_cli(name, vault).await
    }
}
