//! Metabase signed embedding
//!
//! Dashboards are embedded through Metabase's static embedding: the
//! dashboard ID and its locked parameters are signed with the embedding
//! secret, and the token becomes part of the iframe URL.

use crate::config::DashboardConfig;
use crate::errors::{AppError, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedResource {
    pub dashboard: i64,
}

/// Payload Metabase expects in an embed token
#[derive(Debug, Serialize, Deserialize)]
pub struct EmbedClaims {
    pub resource: EmbedResource,
    pub params: Map<String, Value>,
    pub exp: i64,
}

/// Signs dashboard embed URLs
pub struct DashboardSigner {
    site_url: String,
    key: EncodingKey,
    class_dashboard_id: i64,
    student_dashboard_id: i64,
    token_ttl_secs: i64,
}

impl DashboardSigner {
    /// Build a signer; fails if no embedding secret is configured
    pub fn from_config(config: &DashboardConfig) -> Result<Self> {
        let secret = config
            .secret_key
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Configuration {
                message: "dashboard.secret_key is not set".to_string(),
            })?;

        Ok(Self {
            site_url: config.site_url.trim_end_matches('/').to_string(),
            key: EncodingKey::from_secret(secret.as_bytes()),
            class_dashboard_id: config.class_dashboard_id,
            student_dashboard_id: config.student_dashboard_id,
            token_ttl_secs: config.token_ttl_secs as i64,
        })
    }

    /// Embed URL for a class dashboard
    pub fn class_dashboard_url(&self, class_name: &str) -> Result<String> {
        let mut params = Map::new();
        params.insert("class_name".to_string(), Value::from(class_name));
        self.embed_url(self.class_dashboard_id, params)
    }

    /// Embed URL for a single student's dashboard
    pub fn student_dashboard_url(&self, student_id: &str) -> Result<String> {
        let mut params = Map::new();
        params.insert("student_id".to_string(), Value::from(student_id));
        self.embed_url(self.student_dashboard_id, params)
    }

    fn embed_url(&self, dashboard: i64, params: Map<String, Value>) -> Result<String> {
        let claims = EmbedClaims {
            resource: EmbedResource { dashboard },
            params,
            exp: (Utc::now() + Duration::seconds(self.token_ttl_secs)).timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.key).map_err(|e| {
            AppError::Internal {
                message: format!("Failed to sign dashboard token: {}", e),
            }
        })?;

        Ok(format!(
            "{}/embed/dashboard/{}#bordered=true&titled=true",
            self.site_url, token
        ))
    }
}
