use chrono::{DateTime, SecondsFormat, Utc};

use crate::types::{Config, Repo};

#[derive(Debug, Default)]
pub struct SearchQueryBuilder {
    terms: Vec<String>,
}

impl SearchQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repo(&mut self, repo: &Repo) -> &mut Self {
        self.terms.push(format!("repo:{}", repo));
        self
    }

    pub fn pr_type(&mut self) -> &mut Self {
        self.terms.push("is:pr".to_string());
        self
    }

    pub fn open(&mut self) -> &mut Self {
        self.terms.push("is:open".to_string());
        self
    }

    pub fn draft(&mut self, draft: bool) -> &mut Self {
        self.terms.push(format!("draft:{}", draft));
        self
    }

    pub fn updated_before(&mut self, cutoff: DateTime<Utc>) -> &mut Self {
        self.terms.push(format!(
            "updated:<{}",
            cutoff.to_rfc3339_opts(SecondsFormat::Secs, true)
        ));
        self
    }

    pub fn build(&self) -> String {
        self.terms.join(" ")
    }
}

/// Search string selecting open, non-draft pull requests in the configured
/// repository that have not been updated since the cutoff.
pub fn stale_pull_requests_query(config: &Config) -> String {
    SearchQueryBuilder::new()
        .repo(&config.repo)
        .pr_type()
        .open()
        .draft(false)
        .updated_before(config.cutoff)
        .build()
}
