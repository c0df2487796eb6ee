use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use super::batch::{process_batch, BatchResult, CancelToken};
use super::validate_project;
use crate::error::{BuildLensError, Result};
use crate::providers::types::{
    Comment, CommentThread, FilePosition, NewComment, NewThread, ThreadContext, ThreadStatus,
};
use crate::providers::PullRequestApi;

/// A pull request addressed by project, repository and id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestTarget {
    pub project: String,
    pub repository: String,
    pub pull_request_id: u32,
}

impl PullRequestTarget {
    pub fn validate(&self) -> Result<()> {
        validate_project(&self.project)?;
        if self.repository.trim().is_empty() {
            return Err(BuildLensError::Validation(
                "Repository must not be empty".to_string(),
            ));
        }
        if self.pull_request_id == 0 {
            return Err(BuildLensError::Validation(
                "Pull request id must be a positive integer".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PullRequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pull request {} of repository '{}' in project '{}'",
            self.pull_request_id, self.repository, self.project
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffSide {
    Left,
    #[default]
    Right,
}

/// One comment to post on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CommentRequestRecord", into = "CommentRequestRecord")]
pub enum CommentRequest {
    General {
        content: String,
    },
    Line {
        content: String,
        file_path: String,
        line: u32,
        side: DiffSide,
        parent_comment_id: Option<u32>,
    },
}

/// Flat file representation; a request is line-anchored when it names both a file and a line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CommentRequestRecord {
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    side: Option<DiffSide>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_comment_id: Option<u32>,
}

impl From<CommentRequestRecord> for CommentRequest {
    fn from(record: CommentRequestRecord) -> Self {
        match (record.file_path, record.line) {
            (Some(file_path), Some(line)) if !file_path.trim().is_empty() => Self::Line {
                content: record.content,
                file_path,
                line,
                side: record.side.unwrap_or_default(),
                parent_comment_id: record.parent_comment_id,
            },
            _ => Self::General {
                content: record.content,
            },
        }
    }
}

impl From<CommentRequest> for CommentRequestRecord {
    fn from(request: CommentRequest) -> Self {
        match request {
            CommentRequest::General { content } => Self {
                content,
                ..Self::default()
            },
            CommentRequest::Line {
                content,
                file_path,
                line,
                side,
                parent_comment_id,
            } => Self {
                content,
                file_path: Some(file_path),
                line: Some(line),
                side: Some(side),
                parent_comment_id,
            },
        }
    }
}

impl CommentRequest {
    pub fn content(&self) -> &str {
        match self {
            Self::General { content } | Self::Line { content, .. } => content,
        }
    }

    /// Build the thread body, rejecting empty text and line zero.
    pub fn to_thread(&self) -> Result<NewThread> {
        if self.content().trim().is_empty() {
            return Err(BuildLensError::Validation(
                "Comment text must not be empty".to_string(),
            ));
        }

        match self {
            Self::General { content } => Ok(NewThread {
                comments: vec![NewComment::text(content, None)],
                status: ThreadStatus::Active,
                thread_context: None,
            }),
            Self::Line {
                content,
                file_path,
                line,
                side,
                parent_comment_id,
            } => {
                if *line == 0 {
                    return Err(BuildLensError::Validation(format!(
                        "Line numbers start at 1 (got 0 for {file_path})"
                    )));
                }

                Ok(NewThread {
                    comments: vec![NewComment::text(content, *parent_comment_id)],
                    status: ThreadStatus::Active,
                    thread_context: Some(line_context(file_path, *line, *side)),
                })
            }
        }
    }
}

fn line_context(file_path: &str, line: u32, side: DiffSide) -> ThreadContext {
    // Paths in thread contexts are rooted at the repository
    let file_path = if file_path.starts_with('/') {
        file_path.to_string()
    } else {
        format!("/{file_path}")
    };
    let position = Some(FilePosition { line, offset: 1 });

    match side {
        DiffSide::Left => ThreadContext {
            file_path,
            left_file_start: position,
            left_file_end: position,
            ..ThreadContext::default()
        },
        DiffSide::Right => ThreadContext {
            file_path,
            right_file_start: position,
            right_file_end: position,
            ..ThreadContext::default()
        },
    }
}

struct CommentItem {
    position: usize,
    request: CommentRequest,
}

impl fmt::Display for CommentItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.request {
            CommentRequest::General { .. } => write!(f, "comment #{}", self.position),
            CommentRequest::Line {
                file_path, line, ..
            } => write!(f, "comment #{} on {file_path}:{line}", self.position),
        }
    }
}

/// Post every request as its own thread; rejected comments are logged and left out.
pub async fn post_comments<A>(
    api: &A,
    target: &PullRequestTarget,
    requests: Vec<CommentRequest>,
    cancel: &CancelToken,
) -> Result<BatchResult<CommentThread>>
where
    A: PullRequestApi + ?Sized,
{
    target.validate()?;
    info!("Posting {} comments to {target}", requests.len());

    let items: Vec<CommentItem> = requests
        .into_iter()
        .enumerate()
        .map(|(i, request)| CommentItem {
            position: i + 1,
            request,
        })
        .collect();

    process_batch(
        items,
        |item| async move {
            let thread = item.request.to_thread()?;
            api.create_comment_thread(
                &target.project,
                &target.repository,
                target.pull_request_id,
                &thread,
            )
            .await
        },
        cancel,
    )
    .await
}

/// Threads that have not been deleted.
pub async fn list_threads<A>(api: &A, target: &PullRequestTarget) -> Result<Vec<CommentThread>>
where
    A: PullRequestApi + ?Sized,
{
    target.validate()?;

    let threads = api
        .list_comment_threads(&target.project, &target.repository, target.pull_request_id)
        .await
        .map_err(|e| e.context(format!("Failed to list threads of {target}")))?;

    Ok(threads.into_iter().filter(|t| !t.is_deleted).collect())
}

pub async fn reply_to_thread<A>(
    api: &A,
    target: &PullRequestTarget,
    thread_id: u32,
    content: &str,
) -> Result<Comment>
where
    A: PullRequestApi + ?Sized,
{
    target.validate()?;
    if content.trim().is_empty() {
        return Err(BuildLensError::Validation(
            "Reply text must not be empty".to_string(),
        ));
    }

    api.create_comment_reply(
        &target.project,
        &target.repository,
        target.pull_request_id,
        thread_id,
        content,
    )
    .await
    .map_err(|e| e.context(format!("Failed to reply to thread {thread_id} of {target}")))
}

pub async fn set_thread_status<A>(
    api: &A,
    target: &PullRequestTarget,
    thread_id: u32,
    status: ThreadStatus,
) -> Result<CommentThread>
where
    A: PullRequestApi + ?Sized,
{
    target.validate()?;

    api.update_comment_thread_status(
        &target.project,
        &target.repository,
        target.pull_request_id,
        thread_id,
        status,
    )
    .await
    .map_err(|e| e.context(format!("Failed to update thread {thread_id} of {target}")))
}
