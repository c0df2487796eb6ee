use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;

use crate::auth::Token;
use crate::error::BuildLensError;
use crate::insights::batch::{BatchResult, CancelToken};
use crate::insights::comments::{self, CommentRequest, PullRequestTarget};
use crate::insights::export::{export_json, read_reports};
use crate::insights::recent::{pull_request_build_reports, recent_build_reports};
use crate::insights::report::{assemble_report, fetch_build_reports};
use crate::insights::statistics::{summarize_reports, summarize_window, SummaryQuery};
use crate::insights::BuildIdentity;
use crate::providers::azure::AzureDevOpsClient;
use crate::providers::types::{BuildStatusFilter, ThreadStatus};

#[derive(Parser)]
#[command(name = "buildlens")]
#[command(author, version, about = "CI build reports and pull request comment batches", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Organization URL (e.g., "https://dev.azure.com/fabrikam")
    #[arg(long, env = "AZURE_DEVOPS_ORG_URL")]
    org_url: Option<String>,

    /// Personal access token (optional for public projects)
    #[arg(short, long, env = "AZURE_DEVOPS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Project name
    #[arg(short = 'P', long, env = "AZURE_DEVOPS_PROJECT")]
    project: String,

    /// Output file path (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct PullRequestArgs {
    /// Repository name or id
    #[arg(short, long)]
    repository: String,

    /// Pull request id
    #[arg(long)]
    pull_request: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// Report for a single build
    Build { build_id: u32 },

    /// Reports for several builds; builds that cannot be fetched are skipped
    Builds {
        #[arg(required = true, num_args = 1..)]
        build_ids: Vec<u32>,
    },

    /// Reports for the most recently finished builds of a pipeline definition
    Recent {
        /// Pipeline definition id
        #[arg(short, long)]
        definition: u32,

        /// Number of builds to report
        #[arg(short, long, default_value_t = 10)]
        count: usize,

        /// Build status filter (defaults to completed)
        #[arg(short, long, value_enum)]
        status: Option<BuildStatusFilter>,
    },

    /// Reports for the builds of a pull request
    PrBuilds {
        #[command(flatten)]
        pr: PullRequestArgs,

        /// Number of builds to report
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },

    /// Success rate and durations over a window of finished builds
    Summary {
        /// Window start (RFC 3339, inclusive)
        #[arg(long)]
        from: DateTime<Utc>,

        /// Window end (RFC 3339, exclusive; defaults to now)
        #[arg(long)]
        to: Option<DateTime<Utc>>,

        /// Only count builds of this pipeline definition
        #[arg(short, long)]
        definition: Option<u32>,

        /// Summarize exported reports instead of querying the server
        #[arg(long)]
        reports: Option<PathBuf>,
    },

    /// Post a batch of comments read from a JSON file
    Comment {
        #[command(flatten)]
        pr: PullRequestArgs,

        /// JSON array of {content, file_path?, line?, side?, parent_comment_id?}
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Inspect and update comment threads
    Thread {
        #[command(subcommand)]
        action: ThreadAction,
    },
}

#[derive(Subcommand)]
enum ThreadAction {
    /// List threads that have not been deleted
    List {
        #[command(flatten)]
        pr: PullRequestArgs,
    },

    /// Reply to a thread
    Reply {
        #[command(flatten)]
        pr: PullRequestArgs,

        thread_id: u32,

        text: String,
    },

    /// Change a thread's status
    Resolve {
        #[command(flatten)]
        pr: PullRequestArgs,

        thread_id: u32,

        #[arg(short, long, value_enum, default_value = "fixed")]
        status: ThreadStatus,
    },
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                trigger.cancel();
            }
        });

        match &self.command {
            Commands::Build { build_id } => {
                let client = self.client()?;
                let identity = BuildIdentity::new(&self.project, *build_id)?;
                let report = assemble_report(&client, &identity).await?;
                self.emit(&report)
            }
            Commands::Builds { build_ids } => {
                let client = self.client()?;
                let batch = fetch_build_reports(&client, &self.project, build_ids, &cancel).await?;
                self.emit_batch(batch, "builds")
            }
            Commands::Recent {
                definition,
                count,
                status,
            } => {
                let client = self.client()?;
                let batch = recent_build_reports(
                    &client,
                    &self.project,
                    *definition,
                    *count,
                    *status,
                    &cancel,
                )
                .await?;
                self.emit_batch(batch, "builds")
            }
            Commands::PrBuilds { pr, count } => {
                let client = self.client()?;
                let batch = pull_request_build_reports(
                    &client,
                    &self.project,
                    &pr.repository,
                    pr.pull_request,
                    *count,
                    &cancel,
                )
                .await?;
                self.emit_batch(batch, "builds")
            }
            Commands::Summary {
                from,
                to,
                definition,
                reports,
            } => {
                let query = SummaryQuery {
                    project: self.project.clone(),
                    from: *from,
                    to: to.unwrap_or_else(Utc::now),
                    definition_id: *definition,
                };
                let summary = if let Some(path) = reports {
                    let exported = read_reports(path)
                        .with_context(|| format!("Failed to read reports from {}", path.display()))?;
                    summarize_reports(&query, &exported)?
                } else {
                    summarize_window(&self.client()?, &query).await?
                };
                self.emit(&summary)
            }
            Commands::Comment { pr, file } => {
                let client = self.client()?;
                let requests = read_comment_requests(file)?;
                let batch =
                    comments::post_comments(&client, &self.target(pr), requests, &cancel).await?;
                self.emit_batch(batch, "comments")
            }
            Commands::Thread { action } => self.execute_thread(action).await,
        }
    }

    async fn execute_thread(&self, action: &ThreadAction) -> Result<()> {
        let client = self.client()?;

        match action {
            ThreadAction::List { pr } => {
                let threads = comments::list_threads(&client, &self.target(pr)).await?;
                info!("Found {} threads", threads.len());
                self.emit(&threads)
            }
            ThreadAction::Reply {
                pr,
                thread_id,
                text,
            } => {
                let comment =
                    comments::reply_to_thread(&client, &self.target(pr), *thread_id, text).await?;
                self.emit(&comment)
            }
            ThreadAction::Resolve {
                pr,
                thread_id,
                status,
            } => {
                let thread =
                    comments::set_thread_status(&client, &self.target(pr), *thread_id, *status)
                        .await?;
                self.emit(&thread)
            }
        }
    }

    fn client(&self) -> Result<AzureDevOpsClient> {
        let org_url = self.org_url.as_deref().ok_or_else(|| {
            BuildLensError::Config(
                "An organization URL is required (--org-url or AZURE_DEVOPS_ORG_URL)".to_string(),
            )
        })?;
        let token = self.token.as_deref().map(Token::from);
        Ok(AzureDevOpsClient::new(org_url, token)?)
    }

    fn target(&self, pr: &PullRequestArgs) -> PullRequestTarget {
        PullRequestTarget {
            project: self.project.clone(),
            repository: pr.repository.clone(),
            pull_request_id: pr.pull_request,
        }
    }

    fn emit_batch<T: Serialize>(&self, batch: BatchResult<T>, noun: &str) -> Result<()> {
        if !batch.failed.is_empty() {
            warn!(
                "{} of {} {noun} failed and were left out: {}",
                batch.failed.len(),
                batch.failed.len() + batch.items.len(),
                batch.failed.join(", ")
            );
        }
        self.emit(&batch.into_items())
    }

    fn emit<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        if let Some(output_path) = &self.output {
            export_json(output_path, value)?;
            return Ok(());
        }

        let json_output = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        println!("{json_output}");

        Ok(())
    }
}

fn read_comment_requests(path: &Path) -> Result<Vec<CommentRequest>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read comment requests from {}", path.display()))?;
    let requests = serde_json::from_str(&content)
        .with_context(|| format!("Invalid comment requests in {}", path.display()))?;
    Ok(requests)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;

        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recent_with_status() {
        let cli = Cli::try_parse_from([
            "buildlens",
            "--org-url",
            "https://dev.azure.com/fabrikam",
            "-P",
            "Fiber",
            "recent",
            "--definition",
            "4",
            "--count",
            "3",
            "--status",
            "in-progress",
        ])
        .unwrap();

        match cli.command {
            Commands::Recent {
                definition,
                count,
                status,
            } => {
                assert_eq!(definition, 4);
                assert_eq!(count, 3);
                assert_eq!(status, Some(BuildStatusFilter::InProgress));
            }
            _ => panic!("expected recent"),
        }
    }

    #[test]
    fn test_parse_summary_window() {
        let cli = Cli::try_parse_from([
            "buildlens",
            "-P",
            "Fiber",
            "summary",
            "--from",
            "2024-06-01T00:00:00Z",
            "--to",
            "2024-06-08T00:00:00Z",
        ])
        .unwrap();

        match cli.command {
            Commands::Summary { from, to, .. } => {
                assert!(from < to.unwrap());
            }
            _ => panic!("expected summary"),
        }
    }

    #[test]
    fn test_client_requires_org_url() {
        let cli = Cli::try_parse_from(["buildlens", "-P", "Fiber", "build", "7"]).unwrap();

        if std::env::var_os("AZURE_DEVOPS_ORG_URL").is_none() {
            assert!(cli.client().is_err());
        }
    }

    #[test]
    fn test_read_comment_requests_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comments.json");
        std::fs::write(
            &path,
            r#"[{"content": "LGTM"}, {"content": "typo", "file_path": "README.md", "line": 2}]"#,
        )
        .unwrap();

        let requests = read_comment_requests(&path).unwrap();

        assert_eq!(requests.len(), 2);
        assert!(matches!(requests[1], CommentRequest::Line { line: 2, .. }));
    }
}
