// ABOUTME: Deploy attributes stored as JSON in an application's environment.
// ABOUTME: Carries the content digest of the last upload and the deploying run.

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::cluster::ENV_DEPLOY_ATTRIBUTES;

pub const ATTR_APP_CONTENT_DIGEST: &str = "app-content-digest";
pub const ATTR_CORRELATION_ID: &str = "correlation-id";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployAttributes {
    values: Map<String, Value>,
}

impl DeployAttributes {
    /// Read the attributes from an application environment.
    ///
    /// Missing or malformed attributes read as empty.
    pub fn from_env(env: &BTreeMap<String, String>) -> Self {
        let Some(raw) = env.get(ENV_DEPLOY_ATTRIBUTES) else {
            return Self::default();
        };
        match serde_json::from_str::<Map<String, Value>>(raw) {
            Ok(values) => Self { values },
            Err(e) => {
                tracing::warn!("ignoring malformed {}: {}", ENV_DEPLOY_ATTRIBUTES, e);
                Self::default()
            }
        }
    }

    pub fn digest(&self) -> Option<&str> {
        self.values.get(ATTR_APP_CONTENT_DIGEST).and_then(Value::as_str)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.values.get(ATTR_CORRELATION_ID).and_then(Value::as_str)
    }

    pub fn with_digest(mut self, digest: &str) -> Self {
        self.values
            .insert(ATTR_APP_CONTENT_DIGEST.to_string(), Value::from(digest));
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.values
            .insert(ATTR_CORRELATION_ID.to_string(), Value::from(correlation_id));
        self
    }

    /// Copy of `env` with these attributes written into it.
    pub fn apply_to(&self, env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut env = env.clone();
        env.insert(
            ENV_DEPLOY_ATTRIBUTES.to_string(),
            Value::Object(self.values.clone()).to_string(),
        );
        env
    }
}
