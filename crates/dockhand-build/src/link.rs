//! Webhook によるイメージリンク登録

use async_trait::async_trait;
use dockhand_core::{ImageLink, LinkPublisher};
use serde::Serialize;

/// JSON を POST してイメージリンクを登録する
pub struct WebhookLinkPublisher {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct LinkPayload<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    git: GitPayload<'a>,
    docker: DockerPayload<'a>,
    workspace_id: &'a str,
}

#[derive(Debug, Serialize)]
struct GitPayload<'a> {
    owner: &'a str,
    repo: &'a str,
    sha: &'a str,
}

#[derive(Debug, Serialize)]
struct DockerPayload<'a> {
    image: &'a str,
}

impl<'a> From<&'a ImageLink> for LinkPayload<'a> {
    fn from(link: &'a ImageLink) -> Self {
        Self {
            kind: "link-image",
            git: GitPayload {
                owner: &link.owner,
                repo: &link.repo,
                sha: &link.sha,
            },
            docker: DockerPayload { image: &link.image },
            workspace_id: &link.workspace_id,
        }
    }
}

impl WebhookLinkPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl LinkPublisher for WebhookLinkPublisher {
    async fn publish(&self, link: &ImageLink) -> bool {
        let payload = LinkPayload::from(link);
        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::info!("Linked image {} to {}", link.image, link.sha);
                true
            }
            Ok(response) => {
                tracing::warn!(
                    "Image link endpoint {} responded with {}",
                    self.url,
                    response.status()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to reach image link endpoint {}: {}", self.url, e);
                false
            }
        }
    }
}
