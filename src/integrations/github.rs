//! GitHub integration provider
//!
//! Lists workflow definitions stored in a repository and opens pull
//! requests that add or update files. The multi-step pull request flow is
//! written against [`RepositoryBackend`] so it can run over any GitHub-like
//! API; [`GitHubClient`] is the octocrab-backed implementation.

use async_trait::async_trait;
use octocrab::models::repos::Object;
use octocrab::params::repos::Reference;
use octocrab::Octocrab;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::traits::{require, IntegrationError, IntegrationResult};

/// Directory holding workflow definitions in a repository
pub const WORKFLOWS_DIR: &str = "workflows";

/// `owner/name` repository reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse an `owner/repo` string
    pub fn parse(full_name: &str) -> IntegrationResult<Self> {
        match full_name.trim().split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(Self {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(IntegrationError::Config(format!(
                "Repository must be in owner/repo form, got '{}'",
                full_name
            ))),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A file to write on the pull request branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub content: String,
}

/// Everything needed to open a pull request
#[derive(Debug, Clone)]
pub struct PullRequestDraft {
    pub title: String,
    pub body: String,
    /// Branch created for the change
    pub branch: String,
    pub files: Vec<FileChange>,
}

/// Repository operations used by the sync and pull request flows
#[async_trait]
pub trait RepositoryBackend: Send + Sync {
    async fn default_branch(&self, repo: &RepoRef) -> IntegrationResult<String>;

    /// SHA of the latest commit on `branch`
    async fn branch_head(&self, repo: &RepoRef, branch: &str) -> IntegrationResult<String>;

    async fn create_branch(&self, repo: &RepoRef, branch: &str, sha: &str)
        -> IntegrationResult<()>;

    /// Blob SHA of an existing file on `branch`
    async fn file_sha(&self, repo: &RepoRef, path: &str, branch: &str)
        -> IntegrationResult<String>;

    async fn update_file(
        &self,
        repo: &RepoRef,
        file: &FileChange,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> IntegrationResult<()>;

    async fn create_file(
        &self,
        repo: &RepoRef,
        file: &FileChange,
        message: &str,
        branch: &str,
    ) -> IntegrationResult<()>;

    /// Open a pull request and return its URL
    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> IntegrationResult<String>;

    /// Names of the entries directly under `path`
    async fn list_directory(&self, repo: &RepoRef, path: &str) -> IntegrationResult<Vec<String>>;
}

/// Names of the JSON workflow files in the repository's workflows directory
pub async fn workflow_files(
    backend: &dyn RepositoryBackend,
    repo: &RepoRef,
) -> IntegrationResult<Vec<String>> {
    let entries = backend.list_directory(repo, WORKFLOWS_DIR).await?;
    Ok(entries
        .into_iter()
        .filter(|name| name.ends_with(".json"))
        .collect())
}

/// Commit `draft.files` to a new branch and open a pull request against the
/// default branch.
///
/// Branch creation failures are ignored (the branch usually exists already).
/// Files are written one by one with no rollback: if a write fails, files
/// written before it remain on the branch.
pub async fn create_pull_request(
    backend: &dyn RepositoryBackend,
    repo: &RepoRef,
    draft: &PullRequestDraft,
) -> IntegrationResult<String> {
    let base = backend.default_branch(repo).await?;
    let head_sha = backend.branch_head(repo, &base).await?;

    if let Err(e) = backend.create_branch(repo, &draft.branch, &head_sha).await {
        debug!(branch = %draft.branch, error = %e, "Branch not created, continuing");
    }

    for file in &draft.files {
        let message = format!("Add {}", file.path);
        let updated = match backend.file_sha(repo, &file.path, &draft.branch).await {
            Ok(sha) => backend
                .update_file(repo, file, &message, &sha, &draft.branch)
                .await
                .is_ok(),
            Err(_) => false,
        };

        if !updated {
            backend
                .create_file(repo, file, &message, &draft.branch)
                .await?;
        }
    }

    let url = backend
        .open_pull_request(repo, &draft.title, &draft.body, &draft.branch, &base)
        .await?;
    info!(repository = %repo, pr_url = %url, "Pull request opened");
    Ok(url)
}

/// GitHub REST client backed by octocrab
pub struct GitHubClient {
    client: Octocrab,
}

impl GitHubClient {
    /// Create a client authenticated with a personal access token
    pub fn new(token: &str) -> IntegrationResult<Self> {
        Self::with_base_uri(token, None)
    }

    /// Create a client against a GitHub Enterprise or test API root
    pub fn with_base_uri(token: &str, base_uri: Option<&str>) -> IntegrationResult<Self> {
        require(token, "token")?;

        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(uri) = base_uri {
            builder = builder.base_uri(uri)?;
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl RepositoryBackend for GitHubClient {
    async fn default_branch(&self, repo: &RepoRef) -> IntegrationResult<String> {
        let repository = self.client.repos(&repo.owner, &repo.name).get().await?;
        repository.default_branch.ok_or_else(|| {
            IntegrationError::Rejected(format!("Repository {} has no default branch", repo))
        })
    }

    async fn branch_head(&self, repo: &RepoRef, branch: &str) -> IntegrationResult<String> {
        let reference = self
            .client
            .repos(&repo.owner, &repo.name)
            .get_ref(&Reference::Branch(branch.to_string()))
            .await?;

        match reference.object {
            Object::Commit { sha, .. } | Object::Tag { sha, .. } => Ok(sha),
            #[allow(unreachable_patterns)]
            _ => Err(IntegrationError::Rejected(format!(
                "Branch {} does not point at a commit",
                branch
            ))),
        }
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        branch: &str,
        sha: &str,
    ) -> IntegrationResult<()> {
        self.client
            .repos(&repo.owner, &repo.name)
            .create_ref(&Reference::Branch(branch.to_string()), sha)
            .await?;
        Ok(())
    }

    async fn file_sha(
        &self,
        repo: &RepoRef,
        path: &str,
        branch: &str,
    ) -> IntegrationResult<String> {
        let contents = self
            .client
            .repos(&repo.owner, &repo.name)
            .get_content()
            .path(path)
            .r#ref(branch)
            .send()
            .await?;

        contents
            .items
            .into_iter()
            .next()
            .map(|item| item.sha)
            .ok_or_else(|| IntegrationError::Rejected(format!("{} not found", path)))
    }

    async fn update_file(
        &self,
        repo: &RepoRef,
        file: &FileChange,
        message: &str,
        sha: &str,
        branch: &str,
    ) -> IntegrationResult<()> {
        self.client
            .repos(&repo.owner, &repo.name)
            .update_file(&file.path, message, &file.content, sha)
            .branch(branch)
            .send()
            .await?;
        Ok(())
    }

    async fn create_file(
        &self,
        repo: &RepoRef,
        file: &FileChange,
        message: &str,
        branch: &str,
    ) -> IntegrationResult<()> {
        self.client
            .repos(&repo.owner, &repo.name)
            .create_file(&file.path, message, &file.content)
            .branch(branch)
            .send()
            .await?;
        Ok(())
    }

    async fn open_pull_request(
        &self,
        repo: &RepoRef,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> IntegrationResult<String> {
        let pull = self
            .client
            .pulls(&repo.owner, &repo.name)
            .create(title, head, base)
            .body(body)
            .send()
            .await?;

        pull.html_url
            .map(|url| url.to_string())
            .ok_or_else(|| IntegrationError::Rejected("Pull request has no URL".to_string()))
    }

    async fn list_directory(&self, repo: &RepoRef, path: &str) -> IntegrationResult<Vec<String>> {
        let contents = self
            .client
            .repos(&repo.owner, &repo.name)
            .get_content()
            .path(path)
            .send()
            .await?;
        Ok(contents.items.into_iter().map(|item| item.name).collect())
    }
}
