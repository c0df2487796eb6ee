use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRef {
    pub display_name: Option<String>,
    pub unique_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionRef {
    pub id: u32,
    pub name: Option<String>,
}

/// A build as returned by the build endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: u32,
    pub build_number: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
    pub queue_time: Option<DateTime<Utc>>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
    pub source_branch: Option<String>,
    pub source_version: Option<String>,
    pub requested_for: Option<IdentityRef>,
    pub requested_by: Option<IdentityRef>,
    pub definition: Option<DefinitionRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub id: Option<String>,
    #[serde(default)]
    pub records: Vec<TimelineRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub record_type: Option<String>,
    pub state: Option<String>,
    pub result: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub finish_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: Option<u32>,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRun {
    pub id: u32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: Option<u32>,
    pub test_case_title: Option<String>,
    /// Provider outcome, an open vocabulary ("Passed", "NotExecuted", ...)
    pub outcome: Option<String>,
}

/// Envelope used by every list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default)]
    pub value: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildStatusFilter {
    All,
    Cancelling,
    Completed,
    InProgress,
    NotStarted,
    Postponed,
}

impl BuildStatusFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::InProgress => "inProgress",
            Self::NotStarted => "notStarted",
            Self::Postponed => "postponed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOrder {
    FinishTimeDescending,
    QueueTimeDescending,
}

impl QueryOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FinishTimeDescending => "finishTimeDescending",
            Self::QueueTimeDescending => "queueTimeDescending",
        }
    }
}

/// Filters for a build listing.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildQuery {
    pub definitions: Vec<u32>,
    pub branch_name: Option<String>,
    pub min_finish_time: Option<DateTime<Utc>>,
    pub max_finish_time: Option<DateTime<Utc>>,
    pub top: usize,
    pub order: QueryOrder,
    pub status_filter: Option<BuildStatusFilter>,
}

impl BuildQuery {
    pub fn new(top: usize) -> Self {
        Self {
            definitions: vec![],
            branch_name: None,
            min_finish_time: None,
            max_finish_time: None,
            top,
            order: QueryOrder::FinishTimeDescending,
            status_filter: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    pub pull_request_id: u32,
    pub title: Option<String>,
    pub status: Option<String>,
    pub source_ref_name: Option<String>,
    pub target_ref_name: Option<String>,
    pub created_by: Option<IdentityRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ThreadStatus {
    Active,
    Fixed,
    WontFix,
    Closed,
    ByDesign,
    Pending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilePosition {
    pub line: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadContext {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_file_start: Option<FilePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_file_end: Option<FilePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_file_start: Option<FilePosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_file_end: Option<FilePosition>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Option<u32>,
    pub parent_comment_id: Option<u32>,
    pub content: Option<String>,
    pub author: Option<IdentityRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    pub id: u32,
    pub status: Option<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub thread_context: Option<ThreadContext>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub parent_comment_id: u32,
    pub content: String,
    pub comment_type: &'static str,
}

impl NewComment {
    pub fn text(content: &str, parent_comment_id: Option<u32>) -> Self {
        Self {
            parent_comment_id: parent_comment_id.unwrap_or(0),
            content: content.to_string(),
            comment_type: "text",
        }
    }
}

/// Body of a thread creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewThread {
    pub comments: Vec<NewComment>,
    pub status: ThreadStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_context: Option<ThreadContext>,
}
