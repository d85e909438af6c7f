//! Registry credential store.
//!
//! The store is a JSON object keyed by registry address:
//!
//! ```json
//! { "https://index.docker.io/v1/": { "auth": "YWxpY2U6c2VjcmV0", "email": "a@example.com" } }
//! ```
//!
//! where `auth` is `base64("username:password")`.

use crate::error::{ClientError, Result};
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Registry address used when none is given.
pub const DEFAULT_REGISTRY: &str = "https://index.docker.io/v1/";

/// Default store file name under `$HOME`.
pub const DEFAULT_STORE_FILE: &str = ".dockercfg";

/// One on-disk store entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthEntry {
    /// `base64("username:password")`
    pub auth: String,
    /// Account email
    #[serde(default)]
    pub email: String,
}

/// Decoded registry credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Registry user
    pub username: String,
    /// Registry password
    pub password: String,
    /// Account email
    pub email: String,
    /// Registry address
    #[serde(rename = "serveraddress")]
    pub server_address: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("email", &self.email)
            .field("server_address", &self.server_address)
            .finish()
    }
}

impl Credentials {
    /// Create credentials for `server_address` (default registry on `None`).
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        email: impl Into<String>,
        server_address: Option<&str>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            email: email.into(),
            server_address: server_address.unwrap_or(DEFAULT_REGISTRY).to_string(),
        }
    }

    /// Decode a store entry.
    ///
    /// # Errors
    /// Returns [`ClientError::Format`] for invalid base64, non-UTF-8 content
    /// or a missing `:` separator.
    pub fn from_entry(server_address: &str, entry: &AuthEntry) -> Result<Self> {
        let (username, password) = decode_auth(&entry.auth)?;
        Ok(Self {
            username,
            password,
            email: entry.email.clone(),
            server_address: server_address.to_string(),
        })
    }

    /// Encode into a store entry.
    pub fn to_entry(&self) -> AuthEntry {
        AuthEntry {
            auth: encode_auth(&self.username, &self.password),
            email: self.email.clone(),
        }
    }

    /// Value of the `X-Registry-Auth` header.
    ///
    /// # Errors
    /// Returns [`ClientError::Format`] if the credentials cannot be serialized.
    pub fn registry_auth_header(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE.encode(json))
    }
}

/// `base64("username:password")`.
pub fn encode_auth(username: &str, password: &str) -> String {
    STANDARD.encode(format!("{username}:{password}"))
}

/// Split `base64("username:password")` on the first `:`.
///
/// # Errors
/// Returns [`ClientError::Format`] if the blob is malformed.
pub fn decode_auth(auth: &str) -> Result<(String, String)> {
    let bytes = STANDARD
        .decode(auth.trim())
        .map_err(|e| ClientError::Format(format!("invalid base64 in auth entry: {e}")))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| ClientError::Format("auth entry is not valid UTF-8".to_string()))?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| ClientError::Format("auth entry has no ':' separator".to_string()))?;
    Ok((username.to_string(), password.to_string()))
}

/// In-memory view of a credential store file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialStore {
    entries: BTreeMap<String, AuthEntry>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// `<home>/.dockercfg`, if a home directory is known.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(DEFAULT_STORE_FILE))
    }

    /// Parse a store from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        let entries = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    /// Serialize the store as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Load a store file. A missing file is an empty store.
    pub async fn load(path: &Path) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(json) => {
                let store = Self::from_json(&json)?;
                tracing::debug!(path = %path.display(), entries = store.entries.len(), "Loaded credential store");
                Ok(store)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No credential store, starting empty");
                Ok(Self::new())
            }
            Err(e) => Err(ClientError::Configuration(format!(
                "cannot read credential store {}: {e}",
                path.display()
            ))),
        }
    }

    /// Write the store to `path`, creating parent directories.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()?).await?;
        tracing::info!(path = %path.display(), "Saved credential store");
        Ok(())
    }

    /// Credentials for `host` (default registry on `None`).
    pub fn get(&self, host: Option<&str>) -> Result<Option<Credentials>> {
        let host = host.unwrap_or(DEFAULT_REGISTRY);
        self.entries
            .get(host)
            .map(|entry| Credentials::from_entry(host, entry))
            .transpose()
    }

    /// Add or replace the entry for `credentials.server_address`.
    pub fn insert(&mut self, credentials: &Credentials) {
        self.entries
            .insert(credentials.server_address.clone(), credentials.to_entry());
    }

    /// Remove the entry for `host`, returning whether it existed.
    pub fn remove(&mut self, host: &str) -> bool {
        self.entries.remove(host).is_some()
    }

    /// Registry addresses with stored credentials.
    pub fn registries(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_decode_stored_entry() {
        let json = json!({
            DEFAULT_REGISTRY: {
                "auth": STANDARD.encode("alice:secret"),
                "email": "a@example.com"
            }
        })
        .to_string();
        let store = CredentialStore::from_json(&json).unwrap();

        let creds = store.get(None).unwrap().unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "secret");
        assert_eq!(creds.email, "a@example.com");
        assert_eq!(creds.server_address, DEFAULT_REGISTRY);
    }

    #[test]
    fn test_encode_matches_engine_format() {
        assert_eq!(encode_auth("alice", "secret"), "YWxpY2U6c2VjcmV0");
    }

    #[test]
    fn test_password_may_contain_colons() {
        let (user, pass) = decode_auth(&encode_auth("bob", "a:b:c")).unwrap();
        assert_eq!(user, "bob");
        assert_eq!(pass, "a:b:c");
    }

    #[test]
    fn test_malformed_auth_is_format_error() {
        assert!(matches!(decode_auth("!!!"), Err(ClientError::Format(_))));
        let no_colon = STANDARD.encode("alice");
        assert!(matches!(decode_auth(&no_colon), Err(ClientError::Format(_))));
    }

    #[test]
    fn test_unknown_registry_is_none() {
        let store = CredentialStore::new();
        assert!(store.get(Some("registry.local:5000")).unwrap().is_none());
    }

    #[test]
    fn test_registry_auth_header() {
        let creds = Credentials::new("alice", "secret", "a@example.com", Some("registry.local"));
        let header = creds.registry_auth_header().unwrap();
        let decoded: Value = serde_json::from_slice(&URL_SAFE.decode(header).unwrap()).unwrap();
        assert_eq!(
            decoded,
            json!({
                "username": "alice",
                "password": "secret",
                "email": "a@example.com",
                "serveraddress": "registry.local"
            })
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let creds = Credentials::new("alice", "secret", "", None);
        let debug = format!("{creds:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("alice"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("dockercfg");

        let mut store = CredentialStore::load(&path).await.unwrap();
        assert!(store.is_empty());

        store.insert(&Credentials::new("alice", "secret", "a@example.com", None));
        store.insert(&Credentials::new("bob", "hunter2", "", Some("registry.local")));
        store.save(&path).await.unwrap();

        let loaded = CredentialStore::load(&path).await.unwrap();
        assert_eq!(loaded, store);
        assert_eq!(
            loaded.registries().collect::<Vec<_>>(),
            vec![DEFAULT_REGISTRY, "registry.local"]
        );

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[DEFAULT_REGISTRY]["auth"], "YWxpY2U6c2VjcmV0");
    }
}
