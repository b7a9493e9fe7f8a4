//! HTTP availability checker.
//!
//! Talks to an availability endpoint of the form
//! `GET {base_url}/availability?kind=email&value=ana@example.com`
//! which answers `{"available": true}`.

use async_trait::async_trait;

use super::checker::{Availability, UniquenessChecker};
use super::status::FieldKind;
use crate::error::RemoteCheckError;

/// Uniqueness checker that queries a remote availability endpoint.
pub struct HttpUniquenessChecker {
    base_url: String,
    client: reqwest::Client,
}

impl HttpUniquenessChecker {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/availability", self.base_url)
    }
}

#[async_trait]
impl UniquenessChecker for HttpUniquenessChecker {
    async fn check(&self, kind: FieldKind, value: &str) -> Result<Availability, RemoteCheckError> {
        let resp = self
            .client
            .get(self.endpoint())
            .query(&[("kind", kind.as_str()), ("value", value)])
            .send()
            .await
            .map_err(|e| RemoteCheckError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(RemoteCheckError::RequestFailed(format!(
                "availability endpoint returned {}",
                resp.status()
            )));
        }

        resp.json::<Availability>()
            .await
            .map_err(|e| RemoteCheckError::InvalidResponse(e.to_string()))
    }
}
