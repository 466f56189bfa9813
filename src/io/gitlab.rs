//! GitLab v4 REST acquisition client.
//!
//! Page-based pagination, token-header auth, and bounded exponential
//! backoff on 429/5xx responses. The client only fetches and deserializes;
//! all interpretation happens in the pipeline and engine layers.

use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::Settings;
use crate::core::{ChangedFile, Error, Result};

const USER_AGENT: &str = concat!("mergemap/", env!("CARGO_PKG_VERSION"));

/// Raw merge-request payload as returned by the API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MergeRequestPayload {
    pub id: i64,
    pub iid: i64,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    pub state: Option<String>,
    pub author: Option<AuthorPayload>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub web_url: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub merged_at: Option<String>,
    pub closed_at: Option<String>,
    pub source_branch: Option<String>,
    pub target_branch: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthorPayload {
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommitPayload {
    pub id: String,
    pub title: Option<String>,
    pub message: Option<String>,
    pub authored_date: Option<String>,
}

/// One entry of the `changes` endpoint. GitLab does not report per-file
/// addition/deletion counts here, so they are derived from the diff text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangePayload {
    pub old_path: Option<String>,
    pub new_path: Option<String>,
    #[serde(default)]
    pub diff: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChangesEnvelope {
    #[serde(default)]
    changes: Vec<ChangePayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscussionPayload {
    #[serde(default)]
    pub notes: Vec<serde_json::Value>,
    #[serde(default)]
    pub resolvable: bool,
    #[serde(default)]
    pub resolved: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApprovalsPayload {
    #[serde(default)]
    pub approvals_required: u64,
    #[serde(default)]
    pub approved_by: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelinePayload {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPayload {
    pub id: i64,
    #[serde(default)]
    pub path_with_namespace: String,
    #[serde(default)]
    pub name: String,
}

/// Count added/removed lines in a unified diff, skipping file headers.
pub fn diff_line_counts(diff: &str) -> (u64, u64) {
    let mut additions = 0;
    let mut deletions = 0;
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            continue;
        }
        if line.starts_with('+') {
            additions += 1;
        } else if line.starts_with('-') {
            deletions += 1;
        }
    }
    (additions, deletions)
}

impl ChangePayload {
    pub fn into_changed_file(self) -> ChangedFile {
        let (additions, deletions) = diff_line_counts(&self.diff);
        ChangedFile {
            old_path: self.old_path,
            new_path: self.new_path,
            additions,
            deletions,
        }
    }
}

/// Blocking GitLab client with retry/backoff.
pub struct GitLabClient {
    http: Client,
    base_url: String,
    token: String,
    page_size: u32,
    max_retries: u32,
    backoff: Duration,
}

impl GitLabClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let (base_url, token) = settings.gitlab_credentials()?;
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;
        Ok(GitLabClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            page_size: settings.page_size,
            max_retries: settings.max_retries,
            backoff: Duration::from_millis(settings.backoff_ms),
        })
    }

    fn send(&self, path: &str, params: &[(String, String)]) -> Result<Response> {
        let url = format!("{}/api/v4{path}", self.base_url);
        let mut backoff = self.backoff;
        let mut attempt = 0u32;
        loop {
            let response = self
                .http
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(params)
                .send()?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.max_retries {
                attempt += 1;
                log::warn!(
                    "GitLab {} returned {}, retry {}/{} after {:?}",
                    path,
                    status,
                    attempt,
                    self.max_retries,
                    backoff
                );
                thread::sleep(backoff);
                backoff *= 2;
                continue;
            }
            return Err(Error::http(
                format!("GET {path} failed with status {status}"),
                Some(status.as_u16()),
            ));
        }
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str, params: &[(String, String)]) -> Result<T> {
        let response = self.send(path, params)?;
        Ok(response.json()?)
    }

    /// Walk every page of a list endpoint.
    fn paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<Vec<T>> {
        let mut page = 1u32;
        let mut items: Vec<T> = Vec::new();
        loop {
            let mut query: Vec<(String, String)> = params.to_vec();
            query.push(("per_page".to_string(), self.page_size.to_string()));
            query.push(("page".to_string(), page.to_string()));
            let batch: Vec<T> = self.get_json(path, &query)?;
            let batch_len = batch.len();
            items.extend(batch);
            if batch_len < self.page_size as usize {
                return Ok(items);
            }
            page += 1;
        }
    }

    /// All non-archived projects visible to the token.
    pub fn list_accessible_projects(&self) -> Result<Vec<ProjectPayload>> {
        let params = vec![
            ("archived".to_string(), "false".to_string()),
            ("simple".to_string(), "true".to_string()),
            ("order_by".to_string(), "id".to_string()),
            ("sort".to_string(), "asc".to_string()),
        ];
        let mut projects: Vec<ProjectPayload> = self.paginated("/projects", &params)?;
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    /// Projects in a group, subgroups included.
    pub fn list_group_projects(&self, group_ref: &str) -> Result<Vec<ProjectPayload>> {
        let encoded = urlencode(group_ref);
        let params = vec![
            ("include_subgroups".to_string(), "true".to_string()),
            ("archived".to_string(), "false".to_string()),
            ("simple".to_string(), "true".to_string()),
            ("order_by".to_string(), "id".to_string()),
            ("sort".to_string(), "asc".to_string()),
        ];
        let mut projects: Vec<ProjectPayload> =
            self.paginated(&format!("/groups/{encoded}/projects"), &params)?;
        projects.sort_by_key(|p| p.id);
        Ok(projects)
    }

    /// Fast MR count for one project via the `x-total` pagination header.
    pub fn project_mr_count(&self, project_id: i64) -> Result<u64> {
        let params = vec![
            ("state".to_string(), "all".to_string()),
            ("per_page".to_string(), "1".to_string()),
            ("page".to_string(), "1".to_string()),
        ];
        let response = self.send(&format!("/projects/{project_id}/merge_requests"), &params)?;
        let total = response
            .headers()
            .get("x-total")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        Ok(total)
    }

    /// Merge requests for a project, oldest-updated first.
    pub fn list_merge_requests(
        &self,
        project_id: i64,
        updated_after: Option<&str>,
        created_after: Option<&str>,
    ) -> Result<Vec<MergeRequestPayload>> {
        let mut params = vec![
            ("scope".to_string(), "all".to_string()),
            ("order_by".to_string(), "updated_at".to_string()),
            ("sort".to_string(), "asc".to_string()),
            ("with_labels_details".to_string(), "false".to_string()),
        ];
        if let Some(after) = updated_after {
            params.push(("updated_after".to_string(), after.to_string()));
        }
        if let Some(after) = created_after {
            params.push(("created_after".to_string(), after.to_string()));
        }
        self.paginated(&format!("/projects/{project_id}/merge_requests"), &params)
    }

    pub fn mr_commits(&self, project_id: i64, mr_iid: i64) -> Result<Vec<CommitPayload>> {
        self.paginated(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/commits"),
            &[],
        )
    }

    pub fn mr_changes(&self, project_id: i64, mr_iid: i64) -> Result<Vec<ChangePayload>> {
        let envelope: ChangesEnvelope = self.get_json(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/changes"),
            &[],
        )?;
        Ok(envelope.changes)
    }

    pub fn mr_discussions(&self, project_id: i64, mr_iid: i64) -> Result<Vec<DiscussionPayload>> {
        self.paginated(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/discussions"),
            &[],
        )
    }

    pub fn mr_approvals(&self, project_id: i64, mr_iid: i64) -> Result<ApprovalsPayload> {
        self.get_json(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/approvals"),
            &[],
        )
    }

    pub fn mr_pipelines(&self, project_id: i64, mr_iid: i64) -> Result<Vec<PipelinePayload>> {
        self.paginated(
            &format!("/projects/{project_id}/merge_requests/{mr_iid}/pipelines"),
            &[],
        )
    }
}

/// Percent-encode a group reference for use as a path segment.
fn urlencode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
