use anyhow::{Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use crate::{
    graphql::{GraphQLResponse, MAX_PAGE_SIZE, convert_graphql_pr, create_search_request},
    search::stale_pull_requests_query,
    types::{
        CommentSink, Config, MAX_LIMIT, Permission, PermissionLookup, PullRequest,
        PullRequestSource, Repo,
    },
};

/// Upper bound on search pages fetched in one run.
const MAX_PAGES: usize = MAX_LIMIT as usize / MAX_PAGE_SIZE;

pub async fn get_github_token() -> Result<String> {
    // Prefer environment variables over gh CLI to avoid subprocess overhead.
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = std::env::var(var) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }
    }

    let output = Command::new("gh")
        .args(["auth", "token"])
        .output()
        .await
        .context("Failed to run 'gh auth token'")?;

    if !output.status.success() {
        anyhow::bail!("Failed to get GitHub token from gh CLI. Please run 'gh auth login' first");
    }

    let token = String::from_utf8(output.stdout)?.trim().to_string();

    if token.is_empty() {
        anyhow::bail!("Empty token returned from gh CLI");
    }

    Ok(token)
}

#[derive(Debug, Deserialize)]
struct PermissionResponse {
    permission: Permission,
}

/// GitHub-backed implementation of every capability the reminder run needs.
pub struct GitHub {
    octocrab: Octocrab,
}

impl GitHub {
    pub fn new(octocrab: Octocrab) -> Self {
        Self { octocrab }
    }

    /// Creates an authenticated client using available credentials.
    pub async fn connect() -> Result<Self> {
        let token = get_github_token()
            .await
            .context("Failed to obtain GitHub authentication token")?;
        let octocrab = Octocrab::builder()
            .personal_token(token)
            .build()
            .context("Failed to create GitHub client")?;
        Ok(Self::new(octocrab))
    }
}

#[async_trait]
impl PullRequestSource for GitHub {
    async fn fetch_stale_pull_requests(&self, config: &Config) -> Result<Vec<PullRequest>> {
        let search_query = stale_pull_requests_query(config);
        debug!(query = %search_query, "searching for stale pull requests");

        let mut pulls = Vec::new();
        let mut after_cursor: Option<String> = None;

        for page in 1..=MAX_PAGES {
            let remaining = config.limit - pulls.len();
            let request = create_search_request(&search_query, remaining, after_cursor.as_deref());

            let response: GraphQLResponse = self
                .octocrab
                .graphql(&request)
                .await
                .with_context(|| format!("Failed to search pull requests in {}", config.repo))?;
            let results = response.into_search()?;
            debug!(page, count = results.nodes.len(), "fetched search page");

            for graphql_pr in results.nodes {
                pulls.push(convert_graphql_pr(graphql_pr)?);
            }

            if pulls.len() >= config.limit || !results.page_info.has_next_page {
                break;
            }

            after_cursor = results.page_info.end_cursor;
            if after_cursor.is_none() {
                break;
            }
        }

        pulls.truncate(config.limit);
        Ok(pulls)
    }
}

#[async_trait]
impl PermissionLookup for GitHub {
    async fn permission(&self, repo: &Repo, login: &str) -> Result<Permission> {
        let route = format!(
            "/repos/{}/{}/collaborators/{}/permission",
            repo.owner(),
            repo.name(),
            login
        );
        let response: PermissionResponse = self
            .octocrab
            .get(&route, None::<&()>)
            .await
            .with_context(|| format!("Failed to look up {}'s permission on {}", login, repo))?;
        Ok(response.permission)
    }
}

#[async_trait]
impl CommentSink for GitHub {
    async fn post_comment(&self, repo: &Repo, number: u64, body: &str) -> Result<()> {
        self.octocrab
            .issues(repo.owner(), repo.name())
            .create_comment(number, body)
            .await
            .with_context(|| format!("Failed to comment on {}#{}", repo, number))?;
        Ok(())
    }
}
