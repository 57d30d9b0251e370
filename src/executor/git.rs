// Git operations composed from bounded process runs
//
// Arguments are interpolated into shell strings. The worker trusts its
// callers: only commit messages get (partial) quoting, paths and URLs are
// passed through as given.

use crate::executor::process::ProcessRunner;
use crate::executor::tool::parse_input;
use crate::executor::types::ExecutionRequest;
use crate::executor::{Result, ToolDefinition, ToolImpl, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Timeout for `git clone`, above the generic shell default
pub const CLONE_TIMEOUT_SECS: u64 = 120;
/// Timeout for `git push`
pub const PUSH_TIMEOUT_SECS: u64 = 60;
/// Commits shown by `log` when the caller does not ask
pub const DEFAULT_LOG_COUNT: u32 = 10;

/// Repository operations; each returns the text its last step produced
pub struct GitOps {
    runner: Arc<ProcessRunner>,
}

impl GitOps {
    pub fn new(runner: Arc<ProcessRunner>) -> Self {
        Self { runner }
    }

    pub async fn status(&self, repo: &Path) -> String {
        let result = self
            .runner
            .execute(&ExecutionRequest::new("git status --short").in_dir(repo))
            .await;
        result.stdout_text()
    }

    pub async fn log(&self, repo: &Path, count: u32) -> String {
        let command = format!("git log --oneline -{}", count);
        let result = self
            .runner
            .execute(&ExecutionRequest::new(command).in_dir(repo))
            .await;
        result.stdout_text()
    }

    pub async fn pull(&self, repo: &Path) -> String {
        let result = self
            .runner
            .execute(&ExecutionRequest::new("git pull").in_dir(repo))
            .await;
        result.combined_text()
    }

    pub async fn clone_repo(&self, url: &str, target_dir: &str) -> String {
        let command = format!("git clone {} {}", url, target_dir);
        let result = self
            .runner
            .execute(&ExecutionRequest::new(command).with_timeout(CLONE_TIMEOUT_SECS))
            .await;
        result.combined_text()
    }

    /// Stage `files` (or everything), then commit. Staging failures are not
    /// rolled back or reported separately; the commit step's output is returned.
    pub async fn commit(&self, repo: &Path, message: &str, files: &[String]) -> String {
        let add = if files.is_empty() {
            "git add -A".to_string()
        } else {
            format!("git add {}", files.join(" "))
        };

        let staged = self
            .runner
            .execute(&ExecutionRequest::new(add).in_dir(repo))
            .await;
        if staged.exit_code != 0 {
            warn!(
                repo = %repo.display(),
                exit_code = staged.exit_code,
                "git add failed, committing anyway"
            );
        }

        let command = format!("git commit -m {}", quote_commit_message(message));
        debug!(repo = %repo.display(), "committing");
        let result = self
            .runner
            .execute(&ExecutionRequest::new(command).in_dir(repo))
            .await;
        result.combined_text()
    }

    pub async fn push(&self, repo: &Path) -> String {
        let result = self
            .runner
            .execute(
                &ExecutionRequest::new("git push")
                    .in_dir(repo)
                    .with_timeout(PUSH_TIMEOUT_SECS),
            )
            .await;
        result.combined_text()
    }
}

/// Wrap a commit message in double quotes, escaping embedded double quotes.
///
/// `$`, backticks and backslashes keep their shell meaning.
pub fn quote_commit_message(message: &str) -> String {
    format!("\"{}\"", message.replace('"', "\\\""))
}

/// Which repository operation a [`GitTool`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOperation {
    Status,
    Log,
    Pull,
    Clone,
    Commit,
    Push,
}

impl GitOperation {
    pub const ALL: [GitOperation; 6] = [
        GitOperation::Status,
        GitOperation::Log,
        GitOperation::Pull,
        GitOperation::Clone,
        GitOperation::Commit,
        GitOperation::Push,
    ];

    pub fn tool_name(self) -> &'static str {
        match self {
            GitOperation::Status => "git_status",
            GitOperation::Log => "git_log",
            GitOperation::Pull => "git_pull",
            GitOperation::Clone => "git_clone",
            GitOperation::Commit => "git_commit",
            GitOperation::Push => "git_push",
        }
    }

    fn description(self) -> &'static str {
        match self {
            GitOperation::Status => "Show `git status --short` for a repository.",
            GitOperation::Log => "Show the last N commits (`git log --oneline`, default 10).",
            GitOperation::Pull => "Run `git pull` in a repository; returns stdout and stderr.",
            GitOperation::Clone => "Clone a repository into a target directory (120s timeout).",
            GitOperation::Commit => {
                "Stage the given files (or everything) and commit with a message."
            }
            GitOperation::Push => "Run `git push` in a repository (60s timeout).",
        }
    }

    fn input_schema(self) -> serde_json::Value {
        let repo = serde_json::json!({
            "type": "string",
            "description": "Path to the repository"
        });
        match self {
            GitOperation::Status | GitOperation::Pull | GitOperation::Push => serde_json::json!({
                "type": "object",
                "properties": { "repoPath": repo },
                "required": ["repoPath"]
            }),
            GitOperation::Log => serde_json::json!({
                "type": "object",
                "properties": {
                    "repoPath": repo,
                    "count": { "type": "integer", "description": "Number of commits" }
                },
                "required": ["repoPath"]
            }),
            GitOperation::Clone => serde_json::json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "Repository URL" },
                    "targetDir": { "type": "string", "description": "Clone destination" }
                },
                "required": ["url", "targetDir"]
            }),
            GitOperation::Commit => serde_json::json!({
                "type": "object",
                "properties": {
                    "repoPath": repo,
                    "message": { "type": "string", "description": "Commit message" },
                    "files": {
                        "type": "array",
                        "items": { "type": "string" },
                        "description": "Files to stage; everything when omitted"
                    }
                },
                "required": ["repoPath", "message"]
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoInput {
    repo_path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogInput {
    repo_path: PathBuf,
    count: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloneInput {
    url: String,
    target_dir: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitInput {
    repo_path: PathBuf,
    message: String,
    #[serde(default)]
    files: Vec<String>,
}

/// Exposes one [`GitOperation`] as a tool
pub struct GitTool {
    git: Arc<GitOps>,
    operation: GitOperation,
}

impl GitTool {
    pub fn new(git: Arc<GitOps>, operation: GitOperation) -> Self {
        Self { git, operation }
    }
}

#[async_trait]
impl ToolImpl for GitTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.operation.tool_name().to_string(),
            description: self.operation.description().to_string(),
            input_schema: self.operation.input_schema(),
        }
    }

    async fn run(&self, input: serde_json::Value) -> Result<ToolOutput> {
        let name = self.operation.tool_name();
        let text = match self.operation {
            GitOperation::Status => {
                let RepoInput { repo_path } = parse_input(name, input)?;
                self.git.status(&repo_path).await
            }
            GitOperation::Log => {
                let LogInput { repo_path, count } = parse_input(name, input)?;
                self.git
                    .log(&repo_path, count.unwrap_or(DEFAULT_LOG_COUNT))
                    .await
            }
            GitOperation::Pull => {
                let RepoInput { repo_path } = parse_input(name, input)?;
                self.git.pull(&repo_path).await
            }
            GitOperation::Clone => {
                let CloneInput { url, target_dir } = parse_input(name, input)?;
                self.git.clone_repo(&url, &target_dir).await
            }
            GitOperation::Commit => {
                let CommitInput {
                    repo_path,
                    message,
                    files,
                } = parse_input(name, input)?;
                self.git.commit(&repo_path, &message, &files).await
            }
            GitOperation::Push => {
                let RepoInput { repo_path } = parse_input(name, input)?;
                self.git.push(&repo_path).await
            }
        };

        Ok(ToolOutput::success(text))
    }
}
