pub mod batch;
pub mod comments;
pub mod export;
pub mod outcome;
pub mod recent;
pub mod report;
pub mod statistics;
pub mod test_summary;

#[cfg(test)]
mod testing;

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{BuildLensError, Result};
use crate::providers::types::Build;
use outcome::TestOutcome;

/// A build addressed by project and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildIdentity {
    pub project: String,
    pub build_id: u32,
}

impl BuildIdentity {
    pub fn new(project: &str, build_id: u32) -> Result<Self> {
        validate_project(project)?;
        if build_id == 0 {
            return Err(BuildLensError::Validation(
                "Build id must be a positive integer".to_string(),
            ));
        }

        Ok(Self {
            project: project.to_string(),
            build_id,
        })
    }
}

impl fmt::Display for BuildIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "build {} in project '{}'", self.build_id, self.project)
    }
}

pub fn validate_project(project: &str) -> Result<()> {
    if project.trim().is_empty() {
        return Err(BuildLensError::Validation(
            "Project name must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestSummary {
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
}

/// Wire shape of a stored summary, checked before it becomes a `TestSummary`.
#[derive(Deserialize)]
struct SummaryCounts {
    total: usize,
    passed: usize,
    failed: usize,
    skipped: usize,
}

impl<'de> Deserialize<'de> for TestSummary {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let SummaryCounts {
            total,
            passed,
            failed,
            skipped,
        } = SummaryCounts::deserialize(deserializer)?;
        let sum = passed
            .checked_add(failed)
            .and_then(|s| s.checked_add(skipped));
        if sum != Some(total) {
            return Err(serde::de::Error::custom(format!(
                "test total {total} does not match passed {passed} + failed {failed} + skipped {skipped}"
            )));
        }

        Ok(Self {
            total,
            passed,
            failed,
            skipped,
        })
    }
}

impl TestSummary {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = TestOutcome>) -> Self {
        outcomes.into_iter().fold(Self::default(), |mut summary, outcome| {
            summary.record(outcome);
            summary
        })
    }

    /// Count one result. `total` moves with every call so it always equals the sum of the buckets.
    pub fn record(&mut self, outcome: TestOutcome) {
        self.total += 1;
        match outcome {
            TestOutcome::Passed => self.passed += 1,
            TestOutcome::Failed => self.failed += 1,
            TestOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        #[allow(clippy::cast_precision_loss)]
        let rate = (self.passed as f64 / self.total as f64) * 100.0;
        rate
    }
}

/// One build's metadata plus its test summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub project: String,
    pub build_id: u32,
    pub build_number: Option<String>,
    pub status: Option<String>,
    pub result: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(rename = "duration_ms", with = "duration_millis::option", default)]
    pub duration: Option<Duration>,
    pub source_branch: Option<String>,
    pub source_version: Option<String>,
    pub requested_for: Option<String>,
    pub requested_by: Option<String>,
    pub definition_id: Option<u32>,
    pub definition_name: Option<String>,
    pub tests: TestSummary,
}

impl BuildReport {
    pub fn from_build(identity: &BuildIdentity, build: Build, tests: TestSummary) -> Self {
        let duration = elapsed(build.start_time, build.finish_time);
        let (definition_id, definition_name) = build
            .definition
            .map_or((None, None), |d| (Some(d.id), d.name));

        Self {
            project: identity.project.clone(),
            build_id: identity.build_id,
            build_number: build.build_number,
            status: build.status,
            result: build.result,
            queued_at: build.queue_time,
            started_at: build.start_time,
            finished_at: build.finish_time,
            duration,
            source_branch: build.source_branch,
            source_version: build.source_version,
            requested_for: build.requested_for.and_then(|i| i.display_name),
            requested_by: build.requested_by.and_then(|i| i.display_name),
            definition_id,
            definition_name,
            tests,
        }
    }
}

/// `finish - start` at millisecond precision, when both ends are known and finish is not before start.
pub fn elapsed(start: Option<DateTime<Utc>>, finish: Option<DateTime<Utc>>) -> Option<Duration> {
    let (start, finish) = (start?, finish?);
    let millis = (finish - start).num_milliseconds();
    (millis >= 0).then(|| Duration::milliseconds(millis))
}

/// Aggregate statistics over a window of finished builds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub project: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub definition_id: Option<u32>,
    pub total_builds: usize,
    pub succeeded: usize,
    pub partially_succeeded: usize,
    pub failed: usize,
    pub canceled: usize,
    pub other: usize,
    pub success_rate: f64,
    #[serde(rename = "average_duration_ms", with = "duration_millis")]
    pub average_duration: Duration,
    pub distinct_definitions: usize,
    pub builds_by_definition: IndexMap<String, usize>,
    pub generated_at: DateTime<Utc>,
}

mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        i64::deserialize(deserializer).map(Duration::milliseconds)
    }

    pub mod option {
        use chrono::Duration;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(duration) => serializer.serialize_some(&duration.num_milliseconds()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::milliseconds))
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::providers::types::{DefinitionRef, IdentityRef};

    #[test]
    fn test_identity_rejects_empty_project_and_zero_id() {
        assert!(matches!(
            BuildIdentity::new("  ", 4),
            Err(BuildLensError::Validation(_))
        ));
        assert!(matches!(
            BuildIdentity::new("Fiber", 0),
            Err(BuildLensError::Validation(_))
        ));
        assert_eq!(
            BuildIdentity::new("Fiber", 4).unwrap().to_string(),
            "build 4 in project 'Fiber'"
        );
    }

    #[test]
    fn test_summary_total_matches_buckets() {
        let summary = TestSummary::from_outcomes([
            TestOutcome::Passed,
            TestOutcome::Passed,
            TestOutcome::Failed,
            TestOutcome::Skipped,
            TestOutcome::Passed,
        ]);

        assert_eq!(summary.total(), 5);
        assert_eq!(
            summary.total(),
            summary.passed() + summary.failed() + summary.skipped()
        );
        assert!((summary.pass_rate() - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_summary_pass_rate_is_zero() {
        let summary = TestSummary::default();

        assert_eq!(summary.total(), 0);
        assert!(summary.pass_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn test_report_duration_requires_both_timestamps() {
        let identity = BuildIdentity::new("Fiber", 9).unwrap();
        let start = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let finish = Utc.with_ymd_and_hms(2024, 6, 11, 10, 12, 30).unwrap();

        let finished = BuildReport::from_build(
            &identity,
            Build {
                id: 9,
                start_time: Some(start),
                finish_time: Some(finish),
                requested_for: Some(IdentityRef {
                    display_name: Some("Jamal Hartnett".to_string()),
                    unique_name: None,
                }),
                definition: Some(DefinitionRef {
                    id: 7,
                    name: Some("ci-main".to_string()),
                }),
                ..Build::default()
            },
            TestSummary::default(),
        );
        let running = BuildReport::from_build(
            &identity,
            Build {
                id: 9,
                start_time: Some(start),
                ..Build::default()
            },
            TestSummary::default(),
        );

        assert_eq!(finished.duration, Some(Duration::seconds(750)));
        assert_eq!(finished.requested_for.as_deref(), Some("Jamal Hartnett"));
        assert_eq!(finished.definition_id, Some(7));
        assert_eq!(running.duration, None);
    }

    #[test]
    fn test_elapsed_truncates_to_milliseconds() {
        let start = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();
        let finish = start + Duration::nanoseconds(1_500_700);

        assert_eq!(
            elapsed(Some(start), Some(finish)),
            Some(Duration::milliseconds(1))
        );
        assert_eq!(elapsed(None, Some(finish)), None);
    }

    #[test]
    fn test_elapsed_is_absent_when_finish_precedes_start() {
        let start = Utc.with_ymd_and_hms(2024, 6, 11, 10, 5, 0).unwrap();
        let finish = Utc.with_ymd_and_hms(2024, 6, 11, 10, 0, 0).unwrap();

        assert_eq!(elapsed(Some(start), Some(finish)), None);
        assert_eq!(elapsed(Some(start), Some(start)), Some(Duration::zero()));
    }

    #[test]
    fn test_stored_summary_with_mismatched_total_is_rejected() {
        let consistent: TestSummary =
            serde_json::from_str(r#"{"total": 3, "passed": 2, "failed": 1, "skipped": 0}"#)
                .unwrap();
        let inflated = serde_json::from_str::<TestSummary>(
            r#"{"total": 99, "passed": 2, "failed": 1, "skipped": 0}"#,
        );

        assert_eq!(consistent.total(), 3);
        assert_eq!(consistent.passed(), 2);
        let err = inflated.unwrap_err().to_string();
        assert!(err.contains("does not match"), "{err}");
    }
}
