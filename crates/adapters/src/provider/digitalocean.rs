// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DigitalOcean droplets API.

use super::{NodeProvider, ProviderError};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use sj_core::{NodeId, NodeInfo, NodeSpec, NodeStatus};
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://api.digitalocean.com";
const PAGE_SIZE: usize = 200;

/// Droplet lifecycle over the DigitalOcean v2 API.
#[derive(Clone)]
pub struct DigitalOceanProvider {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for DigitalOceanProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalOceanProvider").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct CreateDroplet<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: &'a [String],
    tags: [&'a str; 1],
    user_data: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Droplet {
    id: u64,
    name: String,
    status: String,
    created_at: String,
    #[serde(default)]
    networks: Networks,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Deserialize)]
struct DropletEnvelope {
    droplet: Droplet,
}

#[derive(Deserialize)]
struct DropletPage {
    droplets: Vec<Droplet>,
}

pub(crate) fn node_from_droplet(droplet: Droplet) -> Result<NodeInfo, ProviderError> {
    let status = match droplet.status.as_str() {
        "new" => NodeStatus::New,
        "active" => NodeStatus::Active,
        "off" => NodeStatus::Off,
        "archive" => NodeStatus::Archived,
        other => return Err(ProviderError::Decode(format!("unknown droplet status {other:?}"))),
    };
    let created_at = DateTime::parse_from_rfc3339(&droplet.created_at)
        .map_err(|e| ProviderError::Decode(format!("bad created_at {:?}: {e}", droplet.created_at)))?;
    let address = droplet.networks.v4.into_iter().find(|n| n.kind == "public").map(|n| n.ip_address);
    Ok(NodeInfo {
        id: NodeId::from_string(droplet.id.to_string()),
        name: droplet.name,
        status,
        address,
        created_at_ms: created_at.timestamp_millis().max(0) as u64,
        tags: droplet.tags,
    })
}

fn transport(e: reqwest::Error) -> ProviderError {
    if e.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Http(e.to_string())
    }
}

async fn api_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ProviderError::Api { status, body: body.chars().take(512).collect() }
}

impl DigitalOceanProvider {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Http(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), token: token.into() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2/{}", self.base_url, path)
    }
}

#[async_trait]
impl NodeProvider for DigitalOceanProvider {
    async fn create(&self, spec: &NodeSpec) -> Result<NodeInfo, ProviderError> {
        let body = CreateDroplet {
            name: &spec.name,
            region: &spec.region,
            size: &spec.size,
            image: &spec.image,
            ssh_keys: &spec.ssh_keys,
            tags: [&spec.tag],
            user_data: &spec.boot_script,
        };
        let response = self
            .client
            .post(self.url("droplets"))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let envelope: DropletEnvelope =
            response.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
        node_from_droplet(envelope.droplet)
    }

    async fn get(&self, id: &NodeId) -> Result<NodeInfo, ProviderError> {
        let response = self
            .client
            .get(self.url(&format!("droplets/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::NotFound(id.clone()));
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        let envelope: DropletEnvelope =
            response.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
        node_from_droplet(envelope.droplet)
    }

    async fn list(&self, tag: &str) -> Result<Vec<NodeInfo>, ProviderError> {
        let mut nodes = Vec::new();
        for page in 1.. {
            let response = self
                .client
                .get(self.url("droplets"))
                .bearer_auth(&self.token)
                .query(&[("tag_name", tag.to_string()), ("per_page", PAGE_SIZE.to_string()), ("page", page.to_string())])
                .send()
                .await
                .map_err(transport)?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }
            let page: DropletPage = response.json().await.map_err(|e| ProviderError::Decode(e.to_string()))?;
            let count = page.droplets.len();
            for droplet in page.droplets {
                nodes.push(node_from_droplet(droplet)?);
            }
            if count < PAGE_SIZE {
                break;
            }
        }
        Ok(nodes)
    }

    async fn delete(&self, id: &NodeId) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.url(&format!("droplets/{id}")))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(node_id = %id, "delete: node already gone");
            return Ok(());
        }
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "digitalocean_tests.rs"]
mod tests;
