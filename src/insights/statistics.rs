use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use log::{info, warn};

use super::{validate_project, BuildReport, SummaryReport};
use crate::error::{BuildLensError, Result};
use crate::providers::types::{Build, BuildQuery, BuildStatusFilter, QueryOrder};
use crate::providers::BuildApi;

/// Most builds a single window query will pull. Wider windows should be split by the caller.
pub const SUMMARY_PAGE_CAP: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCategory {
    Succeeded,
    PartiallySucceeded,
    Failed,
    Canceled,
    Other,
}

impl ResultCategory {
    pub fn from_result(result: Option<&str>) -> Self {
        match result.map(str::to_ascii_lowercase).as_deref() {
            Some("succeeded") => Self::Succeeded,
            Some("partiallysucceeded") => Self::PartiallySucceeded,
            Some("failed") => Self::Failed,
            Some("canceled" | "cancelled") => Self::Canceled,
            _ => Self::Other,
        }
    }
}

/// The fields the statistics need, shared by raw builds and assembled reports.
pub trait BuildRecord {
    fn result(&self) -> Option<&str>;
    fn started_at(&self) -> Option<DateTime<Utc>>;
    fn finished_at(&self) -> Option<DateTime<Utc>>;
    fn definition(&self) -> Option<(u32, Option<&str>)>;
}

impl<R: BuildRecord + ?Sized> BuildRecord for &R {
    fn result(&self) -> Option<&str> {
        (**self).result()
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        (**self).started_at()
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        (**self).finished_at()
    }

    fn definition(&self) -> Option<(u32, Option<&str>)> {
        (**self).definition()
    }
}

impl BuildRecord for Build {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finish_time
    }

    fn definition(&self) -> Option<(u32, Option<&str>)> {
        self.definition.as_ref().map(|d| (d.id, d.name.as_deref()))
    }
}

impl BuildRecord for BuildReport {
    fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn definition(&self) -> Option<(u32, Option<&str>)> {
        self.definition_id
            .map(|id| (id, self.definition_name.as_deref()))
    }
}

/// A half-open window `[from, to)` of finished builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryQuery {
    pub project: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub definition_id: Option<u32>,
}

impl SummaryQuery {
    pub fn validate(&self) -> Result<()> {
        validate_project(&self.project)?;
        if self.from >= self.to {
            return Err(BuildLensError::Validation(format!(
                "Window start {} must be before window end {}",
                self.from, self.to
            )));
        }
        Ok(())
    }

    fn includes<R: BuildRecord>(&self, record: &R) -> bool {
        let in_window = record
            .finished_at()
            .is_some_and(|t| t >= self.from && t < self.to);
        let in_definition = self
            .definition_id
            .map_or(true, |id| record.definition().is_some_and(|(d, _)| d == id));
        in_window && in_definition
    }
}

/// Query the provider once for the window and summarize what comes back.
pub async fn summarize_window<A>(api: &A, query: &SummaryQuery) -> Result<SummaryReport>
where
    A: BuildApi + ?Sized,
{
    query.validate()?;
    info!(
        "Summarizing builds of project {} finished between {} and {}",
        query.project, query.from, query.to
    );

    let mut build_query = BuildQuery::new(SUMMARY_PAGE_CAP);
    build_query.definitions = query.definition_id.into_iter().collect();
    build_query.min_finish_time = Some(query.from);
    build_query.max_finish_time = Some(query.to);
    build_query.order = QueryOrder::FinishTimeDescending;
    build_query.status_filter = Some(BuildStatusFilter::Completed);

    let builds = api
        .list_builds(&query.project, &build_query)
        .await
        .map_err(|e| {
            e.context(format!(
                "Failed to list builds of project '{}' for summary",
                query.project
            ))
        })?;

    if builds.len() >= SUMMARY_PAGE_CAP {
        warn!("Window returned {SUMMARY_PAGE_CAP} builds, the query cap; narrow the window for complete figures");
    }

    let builds: Vec<Build> = builds.into_iter().filter(|b| query.includes(b)).collect();
    Ok(summarize_builds(query, &builds, Utc::now()))
}

/// Summarize previously exported reports without contacting the provider.
pub fn summarize_reports(query: &SummaryQuery, reports: &[BuildReport]) -> Result<SummaryReport> {
    query.validate()?;

    let selected: Vec<&BuildReport> = reports.iter().filter(|r| query.includes(*r)).collect();
    info!(
        "Summarizing {} of {} exported reports",
        selected.len(),
        reports.len()
    );

    Ok(summarize_builds(query, &selected, Utc::now()))
}

pub fn summarize_builds<R: BuildRecord>(
    query: &SummaryQuery,
    builds: &[R],
    generated_at: DateTime<Utc>,
) -> SummaryReport {
    let mut report = SummaryReport {
        project: query.project.clone(),
        window_start: query.from,
        window_end: query.to,
        definition_id: query.definition_id,
        total_builds: builds.len(),
        succeeded: 0,
        partially_succeeded: 0,
        failed: 0,
        canceled: 0,
        other: 0,
        success_rate: 0.0,
        average_duration: Duration::zero(),
        distinct_definitions: 0,
        builds_by_definition: IndexMap::new(),
        generated_at,
    };

    for build in builds {
        match ResultCategory::from_result(build.result()) {
            ResultCategory::Succeeded => report.succeeded += 1,
            ResultCategory::PartiallySucceeded => report.partially_succeeded += 1,
            ResultCategory::Failed => report.failed += 1,
            ResultCategory::Canceled => report.canceled += 1,
            ResultCategory::Other => report.other += 1,
        }

        if let Some((id, name)) = build.definition() {
            let key = name.map_or_else(|| format!("#{id}"), str::to_string);
            *report.builds_by_definition.entry(key).or_insert(0) += 1;
        }
    }

    report.success_rate = calculate_success_rate(report.succeeded, report.total_builds);
    report.average_duration = calculate_avg_duration(builds);
    report.distinct_definitions = report.builds_by_definition.len();
    report
}

fn calculate_success_rate(successful: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }

    #[allow(clippy::cast_precision_loss)]
    let rate = (successful as f64 / total as f64) * 100.0;
    rate
}

/// Mean over builds that recorded both a start and a finish; others do not count.
fn calculate_avg_duration<R: BuildRecord>(builds: &[R]) -> Duration {
    let durations: Vec<i64> = builds
        .iter()
        .filter_map(|b| super::elapsed(b.started_at(), b.finished_at()))
        .map(|d| d.num_milliseconds())
        .collect();

    if durations.is_empty() {
        return Duration::zero();
    }

    #[allow(clippy::cast_possible_wrap)]
    let avg = durations.iter().sum::<i64>() / durations.len() as i64;
    Duration::milliseconds(avg)
}
