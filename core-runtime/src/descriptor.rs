//! Vendor services descriptor import.
//!
//! Reads the handful of fields the core needs out of a `google-services.json`
//! file so hosts do not have to copy them into code by hand.

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ServicesDescriptor {
    project_info: ProjectInfo,
    #[serde(default)]
    client: Vec<ClientEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectInfo {
    project_id: String,
    #[serde(default)]
    firebase_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientEntry {
    client_info: ClientInfo,
    #[serde(default)]
    api_key: Vec<ApiKeyEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClientInfo {
    mobilesdk_app_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    current_key: String,
}

impl ServicesDescriptor {
    pub fn from_json(json: &str) -> Result<Self> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| Error::Descriptor(e.to_string()))?;
        if descriptor.project_info.project_id.trim().is_empty() {
            return Err(Error::Descriptor(
                "project_info.project_id is empty".to_string(),
            ));
        }
        Ok(descriptor)
    }

    pub fn project_id(&self) -> &str {
        &self.project_info.project_id
    }

    pub fn database_url(&self) -> Option<&str> {
        self.project_info
            .firebase_url
            .as_deref()
            .filter(|url| !url.is_empty())
    }

    /// App id of the first client entry.
    pub fn app_id(&self) -> Option<&str> {
        self.client
            .first()
            .map(|c| c.client_info.mobilesdk_app_id.as_str())
    }

    /// First API key of the first client entry.
    pub fn api_key(&self) -> Option<&str> {
        self.client
            .first()
            .and_then(|c| c.api_key.first())
            .map(|k| k.current_key.as_str())
            .filter(|key| !key.is_empty())
    }
}
