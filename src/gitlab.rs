use crate::project::Project;
use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::header::HeaderValue;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Lets callers tell a group that does not exist apart from a rejected
/// token or an unreachable host.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found")]
    NotFound,
    #[error("rejected by the API (check the access token)")]
    Unauthorized,
    #[error("API returned {0}")]
    Server(StatusCode),
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("failed to decode API response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
pub struct Group {
    pub id: u64,
    pub name: String,
}

/// The token, when present, rides along as the `PRIVATE-TOKEN` header on
/// every request.
pub struct GitlabClient {
    http: Client,
    base_url: String,
}

impl GitlabClient {
    pub fn new(base_url: &str, api_token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(token) = api_token {
            headers.insert(
                "PRIVATE-TOKEN",
                HeaderValue::from_str(token)
                    .with_context(|| "Invalid token: cannot be set as HTTP header")?,
            );
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .default_headers(headers)
            .build()
            .with_context(|| "Failed to create http client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    // One GET against the v4 API, JSON-decoded. No retries, no rate-limit
    // header inspection.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let url = format!("{}/api/v4/{}", self.base_url, path);
        let response = self.http.get(&url).query(query).send().await?;
        let status = response.status();
        log::debug!("GET {} status={}", url, status);

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::Unauthorized);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }
        if !status.is_success() {
            return Err(ApiError::Server(status));
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// The search can match several groups: an exact name match wins, otherwise
/// the first result in response order is taken.
pub async fn resolve_group(client: &GitlabClient, group_name: &str) -> Result<Group, ApiError> {
    let mut groups: Vec<Group> = client.get_json("groups", &[("search", group_name)]).await?;
    log::debug!("group search: name={} matches={}", group_name, groups.len());

    if groups.is_empty() {
        return Err(ApiError::NotFound);
    }
    let picked = groups
        .iter()
        .position(|g| g.name.eq_ignore_ascii_case(group_name))
        .unwrap_or(0);
    Ok(groups.swap_remove(picked))
}

/// Follows page-numbered pagination until the API hands back an empty page,
/// so a group with more than 100 projects still comes back whole.
pub async fn fetch_group_projects(
    client: &GitlabClient,
    group_id: u64,
) -> Result<Vec<Project>, ApiError> {
    let path = format!("groups/{}/projects", group_id);
    let mut projects = Vec::new();
    let mut page: u32 = 1;
    loop {
        let page_param = page.to_string();
        let batch: Vec<Project> = client
            .get_json(&path, &[("per_page", "100"), ("page", &page_param)])
            .await?;
        log::debug!(
            "fetched projects: group_id={} page={} count={}",
            group_id,
            page,
            batch.len()
        );
        if batch.is_empty() {
            break;
        }
        projects.extend(batch);
        page += 1;
    }
    Ok(projects)
}
