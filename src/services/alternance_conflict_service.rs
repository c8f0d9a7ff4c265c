use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{AppError, AppResult};
use crate::models::conflict::ConflictReport;
use crate::models::resolution::{Recommendation, ResolutionReport, ResolveOptions};
use crate::models::settings::ConflictSettings;
use crate::services::calendar_source::CalendarSource;
use crate::services::conflict_detector::ConflictDetector;
use crate::services::conflict_resolver::ConflictResolver;
use crate::services::recommendation_engine;
use crate::services::settings_service::SettingsService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullConflictReport {
    pub report: ConflictReport,
    pub recommendations: Vec<Recommendation>,
    pub generated_at: String,
}

/// Outcome of one student's audit within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentAudit {
    pub student: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<FullConflictReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Entry point tying detection, repair and recommendations to one calendar source.
#[derive(Clone)]
pub struct AlternanceConflictService {
    detector: Arc<ConflictDetector>,
    resolver: Arc<ConflictResolver>,
}

impl AlternanceConflictService {
    pub fn new(source: Arc<dyn CalendarSource>, settings: ConflictSettings) -> Self {
        Self {
            detector: Arc::new(ConflictDetector::new(
                Arc::clone(&source),
                settings.clone(),
            )),
            resolver: Arc::new(ConflictResolver::new(source, settings)),
        }
    }

    /// Builds the service with the thresholds currently stored in `settings`.
    pub fn with_stored_settings(
        source: Arc<dyn CalendarSource>,
        settings: &SettingsService,
    ) -> AppResult<Self> {
        let loaded = settings.get()?;
        info!(
            target: "app::settings",
            gap_threshold_days = loaded.gap_threshold_days,
            rhythm_threshold = loaded.rhythm_threshold,
            "conflict service configured from stored settings"
        );
        Ok(Self::new(source, loaded))
    }

    pub fn detect_all(&self, student_id: &str) -> AppResult<ConflictReport> {
        self.detector.detect_all(student_id)
    }

    pub fn auto_resolve(
        &self,
        student_id: &str,
        options: &ResolveOptions,
    ) -> AppResult<ResolutionReport> {
        self.resolver.auto_resolve(student_id, options)
    }

    pub fn recommend(&self, report: &ConflictReport) -> Vec<Recommendation> {
        recommendation_engine::recommend(report)
    }

    pub fn full_report(&self, student_id: &str) -> AppResult<FullConflictReport> {
        let report = self.detect_all(student_id)?;
        let recommendations = self.recommend(&report);
        Ok(FullConflictReport {
            report,
            recommendations,
            generated_at: Utc::now().to_rfc3339(),
        })
    }

    /// Audits several students concurrently on the blocking pool.
    ///
    /// Results keep the input order; a failing student is reported with its
    /// error and does not stop the others.
    pub async fn audit_students(&self, student_ids: Vec<String>) -> Vec<StudentAudit> {
        let handles: Vec<_> = student_ids
            .into_iter()
            .map(|student_id| {
                let service = self.clone();
                let task_student = student_id.clone();
                let handle = tokio::task::spawn_blocking(move || service.full_report(&task_student));
                (student_id, handle)
            })
            .collect();

        let mut audits = Vec::with_capacity(handles.len());
        for (student, handle) in handles {
            let result = handle
                .await
                .map_err(|err| AppError::other(format!("audit task failed: {err}")))
                .and_then(|result| result);

            match result {
                Ok(report) => audits.push(StudentAudit {
                    student,
                    report: Some(report),
                    error: None,
                }),
                Err(err) => {
                    error!(
                        target: "app::conflict",
                        student_id = %student,
                        error = %err,
                        "student calendar audit failed"
                    );
                    audits.push(StudentAudit {
                        student,
                        report: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        info!(
            target: "app::conflict",
            students = audits.len(),
            failed = audits.iter().filter(|audit| audit.error.is_some()).count(),
            "batch calendar audit finished"
        );

        audits
    }
}
