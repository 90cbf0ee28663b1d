//! Application log service.
//!
//! Coordinates the log store, the workflow driver and the timeline projector.
//! Multi-row writes always run inside one transaction.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::models::{
    ApplicationLogEntry, BulkCreateRequest, BulkCreateResponse, LastIndexResponse,
    LogEntryRequest, NewLogEntry,
};
use crate::db::queries::application_log as queries;
use crate::db::DbPool;
use crate::engine::{
    plan_transition, project, validate_transition, verify_chain, ChainReport, LogIndex, Timeline,
    TransitionRequest,
};
use crate::error::{AppError, AppResult};
use crate::nats::{LogChangeKind, LogNotification, LogPublisher};
use crate::result_ext::ResultExt;
use crate::workflow::WorkflowDefinition;

/// Default page size for unfiltered listings.
pub const DEFAULT_LIMIT: i64 = 100;

/// Largest page size accepted.
pub const MAX_LIMIT: i64 = 1000;

/// Upper bound on rows in one bulk create, whatever the configuration says.
pub const MAX_BULK_ENTRIES: usize = 100;

/// Filter for listing log rows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    pub dtn: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl LogFilter {
    fn page(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

fn require_id(name: &str, id: i64) -> AppResult<()> {
    if id <= 0 {
        return Err(AppError::Validation(format!(
            "{} must be a positive integer",
            name
        )));
    }
    Ok(())
}

/// Service for application log operations.
#[derive(Clone)]
pub struct ApplicationLogService {
    pool: DbPool,
    workflow: Arc<WorkflowDefinition>,
    publisher: Option<LogPublisher>,
    max_bulk_entries: usize,
}

impl ApplicationLogService {
    pub fn new(
        pool: DbPool,
        workflow: Arc<WorkflowDefinition>,
        publisher: Option<LogPublisher>,
        max_bulk_entries: usize,
    ) -> Self {
        let bulk_limit = max_bulk_entries.clamp(1, MAX_BULK_ENTRIES);
        if bulk_limit != max_bulk_entries {
            warn!(
                configured = max_bulk_entries,
                applied = bulk_limit,
                "Bulk entry limit out of range, clamped"
            );
        }
        Self {
            pool,
            workflow,
            publisher,
            max_bulk_entries: bulk_limit,
        }
    }

    pub fn workflow(&self) -> &WorkflowDefinition {
        &self.workflow
    }

    /// Publish after commit. Failures are logged and never reach the caller.
    fn notify(&self, kind: LogChangeKind, main_db_id: i64, entries: &[ApplicationLogEntry]) {
        let Some(publisher) = self.publisher.clone() else {
            return;
        };
        let notification = LogNotification::from_entries(kind, main_db_id, entries);
        tokio::spawn(async move {
            if let Err(e) = publisher.publish(&notification).await {
                warn!(error = %e, main_db_id, "Failed to publish log notification");
            }
        });
    }

    /// List rows, newest first, optionally restricted to one DTN.
    pub async fn list(&self, filter: &LogFilter) -> AppResult<Vec<ApplicationLogEntry>> {
        match filter.dtn.as_deref().map(str::trim) {
            Some(dtn) if !dtn.is_empty() => {
                let record = queries::find_application_by_dtn(&self.pool, dtn)
                    .await
                    .log("resolving DTN")?
                    .ok_or_else(|| AppError::NotFound(format!("Application with DTN {}", dtn)))?;
                queries::list_by_main_db(&self.pool, record.id).await
            }
            _ => {
                let (limit, offset) = filter.page();
                queries::list_all(&self.pool, limit, offset).await
            }
        }
    }

    /// Rows of one application, newest first.
    pub async fn list_by_main_db(&self, main_db_id: i64) -> AppResult<Vec<ApplicationLogEntry>> {
        require_id("main_db_id", main_db_id)?;
        queries::list_by_main_db(&self.pool, main_db_id).await
    }

    /// Rows of one step of an application, newest first.
    pub async fn list_by_step(
        &self,
        main_db_id: i64,
        step: &str,
    ) -> AppResult<Vec<ApplicationLogEntry>> {
        require_id("main_db_id", main_db_id)?;
        if step.trim().is_empty() {
            return Err(AppError::Validation("step is required".to_string()));
        }
        queries::list_by_step(&self.pool, main_db_id, step).await
    }

    pub async fn get(&self, id: i64) -> AppResult<ApplicationLogEntry> {
        queries::get_entry(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application log {}", id)))
    }

    pub async fn last_index(&self, main_db_id: i64) -> AppResult<LastIndexResponse> {
        require_id("main_db_id", main_db_id)?;
        let last = queries::max_del_index(&self.pool, main_db_id).await?;
        Ok(LogIndex::from_last(last)?.into_response(main_db_id))
    }

    /// Insert one client-supplied row.
    pub async fn create(&self, request: LogEntryRequest) -> AppResult<ApplicationLogEntry> {
        let entry = request.into_new_entry(Utc::now())?;
        let created = queries::insert_entry(&self.pool, &entry)
            .await
            .log("creating application log")?;

        info!(
            id = created.id,
            main_db_id = created.main_db_id,
            del_index = created.del_index,
            step = %created.application_step,
            "Application log created"
        );
        self.notify(
            LogChangeKind::Created,
            created.main_db_id,
            std::slice::from_ref(&created),
        );

        Ok(created)
    }

    /// Insert up to `max_bulk_entries` rows in one transaction.
    pub async fn bulk_create(&self, request: BulkCreateRequest) -> AppResult<BulkCreateResponse> {
        let entries = self.validate_bulk(request)?;

        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(entries.len());
        for entry in &entries {
            created.push(queries::insert_entry(&mut *tx, entry).await?);
        }
        tx.commit().await.log("committing bulk create")?;

        info!(count = created.len(), "Application logs bulk created");

        let mut ids: Vec<i64> = created.iter().map(|e| e.main_db_id).collect();
        ids.sort_unstable();
        ids.dedup();
        for main_db_id in ids {
            let rows: Vec<ApplicationLogEntry> = created
                .iter()
                .filter(|e| e.main_db_id == main_db_id)
                .cloned()
                .collect();
            self.notify(LogChangeKind::Created, main_db_id, &rows);
        }

        Ok(BulkCreateResponse {
            created: created.len(),
            entries: created,
        })
    }

    /// Check bulk size and every row before anything is written.
    pub fn validate_bulk(&self, request: BulkCreateRequest) -> AppResult<Vec<NewLogEntry>> {
        if request.entries.is_empty() {
            return Err(AppError::Validation(
                "At least one entry is required".to_string(),
            ));
        }
        if request.entries.len() > self.max_bulk_entries {
            return Err(AppError::Validation(format!(
                "At most {} entries can be created at once, got {}",
                self.max_bulk_entries,
                request.entries.len()
            )));
        }

        let now = Utc::now();
        request
            .entries
            .into_iter()
            .enumerate()
            .map(|(i, e)| {
                e.into_new_entry(now).map_err(|err| match err {
                    AppError::Validation(msg) => {
                        AppError::Validation(format!("entries[{}]: {}", i, msg))
                    }
                    other => other,
                })
            })
            .collect()
    }

    /// Administrative replacement of a row.
    pub async fn update(&self, id: i64, request: LogEntryRequest) -> AppResult<ApplicationLogEntry> {
        let entry = request.into_new_entry(Utc::now())?;
        let updated = queries::update_entry(&self.pool, id, &entry)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Application log {}", id)))?;

        warn!(
            id,
            main_db_id = updated.main_db_id,
            del_index = updated.del_index,
            "Application log rewritten through administrative update"
        );
        self.notify(
            LogChangeKind::Updated,
            updated.main_db_id,
            std::slice::from_ref(&updated),
        );

        Ok(updated)
    }

    /// Administrative removal of a row.
    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let existing = self.get(id).await?;
        if !queries::delete_entry(&self.pool, id).await? {
            return Err(AppError::NotFound(format!("Application log {}", id)));
        }

        warn!(
            id,
            main_db_id = existing.main_db_id,
            del_index = existing.del_index,
            "Application log deleted through administrative delete"
        );
        self.notify(
            LogChangeKind::Deleted,
            existing.main_db_id,
            std::slice::from_ref(&existing),
        );

        Ok(())
    }

    /// Apply a workflow decision: close the actor's step and open the next.
    ///
    /// Reading the chain, checking the acting stage is open, index
    /// allocation and every insert share one transaction holding the
    /// application's advisory lock, so concurrent transitions on the same
    /// application are serialized and a failure writes nothing.
    pub async fn transition(
        &self,
        main_db_id: i64,
        request: TransitionRequest,
    ) -> AppResult<Vec<ApplicationLogEntry>> {
        require_id("main_db_id", main_db_id)?;
        let request = request.normalized();
        validate_transition(&self.workflow, &request)?;

        let mut tx = self.pool.begin().await?;
        queries::lock_application(&mut *tx, main_db_id).await?;

        let chain = queries::list_by_main_db(&mut *tx, main_db_id).await?;
        let plan = plan_transition(&self.workflow, main_db_id, &chain, &request, Utc::now())
            .inspect_err(|e| debug!(main_db_id, error = %e, "Transition rejected"))?;

        debug!(
            main_db_id,
            last_index = plan.index.last_index,
            rows = plan.entries.len(),
            "Transition planned"
        );

        let mut written = Vec::with_capacity(plan.entries.len());
        for entry in &plan.entries {
            written.push(queries::insert_entry(&mut *tx, entry).await?);
        }
        tx.commit().await.log("committing transition")?;

        info!(
            main_db_id,
            stage = %request.stage,
            decision = %request.decision,
            actor = %request.actor,
            del_indexes = ?written.iter().map(|e| e.del_index).collect::<Vec<_>>(),
            "Workflow transition applied"
        );
        self.notify(LogChangeKind::Transition, main_db_id, &written);

        Ok(written)
    }

    pub async fn timeline(&self, main_db_id: i64) -> AppResult<Timeline> {
        let entries = self.list_by_main_db(main_db_id).await?;
        Ok(project(main_db_id, entries))
    }

    pub async fn verify(&self, main_db_id: i64) -> AppResult<ChainReport> {
        let entries = self.list_by_main_db(main_db_id).await?;
        let report = verify_chain(main_db_id, &entries);
        if !report.valid {
            warn!(
                main_db_id,
                violations = report.violations.len(),
                "Application log chain has violations"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::db::pool::create_lazy_pool;
    use crate::workflow::{parse_workflow, BUILTIN_WORKFLOW};

    fn service(max_bulk_entries: usize) -> ApplicationLogService {
        let workflow = Arc::new(parse_workflow(BUILTIN_WORKFLOW).unwrap());
        ApplicationLogService::new(
            create_lazy_pool(&DatabaseConfig::default()),
            workflow,
            None,
            max_bulk_entries,
        )
    }

    fn entry_request(del_index: i64) -> LogEntryRequest {
        LogEntryRequest {
            main_db_id: 1,
            application_step: "Decking".to_string(),
            user_name: "admin".to_string(),
            application_status: "COMPLETED".to_string(),
            application_decision: None,
            application_remarks: None,
            start_date: None,
            accomplished_date: None,
            del_index,
            del_previous: del_index - 1,
            del_last_index: Some(0),
            del_thread: None,
        }
    }

    #[test]
    fn test_filter_page_defaults_and_bounds() {
        assert_eq!(LogFilter::default().page(), (DEFAULT_LIMIT, 0));
        let filter = LogFilter {
            dtn: None,
            limit: Some(5000),
            offset: Some(-3),
        };
        assert_eq!(filter.page(), (MAX_LIMIT, 0));
    }

    #[tokio::test]
    async fn test_validate_bulk_limits() {
        let svc = service(2);

        let err = svc
            .validate_bulk(BulkCreateRequest { entries: vec![] })
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = svc
            .validate_bulk(BulkCreateRequest {
                entries: (1..=3).map(entry_request).collect(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("At most 2"));

        let ok = svc
            .validate_bulk(BulkCreateRequest {
                entries: (1..=2).map(entry_request).collect(),
            })
            .unwrap();
        assert_eq!(ok.len(), 2);
    }

    #[tokio::test]
    async fn test_bulk_limit_is_clamped() {
        let svc = service(0);
        assert_eq!(
            svc.validate_bulk(BulkCreateRequest {
                entries: vec![entry_request(1)],
            })
            .unwrap()
            .len(),
            1
        );

        let svc = service(500);
        let err = svc
            .validate_bulk(BulkCreateRequest {
                entries: (1..=101).map(entry_request).collect(),
            })
            .unwrap_err();
        assert!(err.to_string().contains("At most 100"));
        assert_eq!(
            svc.validate_bulk(BulkCreateRequest {
                entries: (1..=100).map(entry_request).collect(),
            })
            .unwrap()
            .len(),
            100
        );
    }

    #[tokio::test]
    async fn test_validate_bulk_reports_position() {
        let svc = service(100);
        let mut bad = entry_request(2);
        bad.user_name = String::new();
        let err = svc
            .validate_bulk(BulkCreateRequest {
                entries: vec![entry_request(1), bad],
            })
            .unwrap_err();
        assert!(err.to_string().contains("entries[1]"));
    }

    #[tokio::test]
    async fn test_transition_validation_precedes_database() {
        let svc = service(100);
        let request = TransitionRequest {
            stage: "Decking".to_string(),
            actor: "decker".to_string(),
            decision: "For S&E".to_string(),
            ..Default::default()
        };
        let err = svc.transition(42, request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_non_positive_ids_rejected() {
        let svc = service(100);
        assert!(matches!(
            svc.last_index(0).await.unwrap_err(),
            AppError::Validation(_)
        ));
        assert!(matches!(
            svc.list_by_step(5, " ").await.unwrap_err(),
            AppError::Validation(_)
        ));
    }
}
