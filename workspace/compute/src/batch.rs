use chrono::NaiveDate;
use model::entities::recurring_expense;
use sea_orm::{DatabaseConnection, TransactionTrait};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::recurring::{RecurringExpenseProcessor, TemplateOutcome};
use crate::store::{DbStore, TemplateStore};

/// A template whose processing failed and was rolled back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateFailure {
    pub template_id: i32,
    pub error: String,
}

/// Per-template results of one batch run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub today: NaiveDate,
    pub succeeded: Vec<TemplateOutcome>,
    pub failed: Vec<TemplateFailure>,
}

impl BatchReport {
    fn new(today: NaiveDate) -> Self {
        Self {
            today,
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    /// Total number of expenses written by the run.
    pub fn generated(&self) -> usize {
        self.succeeded.iter().map(|o| o.generated).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Processes every due recurring expense, one database transaction per template.
#[derive(Debug, Clone, Default)]
pub struct RecurringExpenseJob {
    processor: RecurringExpenseProcessor,
}

impl RecurringExpenseJob {
    pub fn new(processor: RecurringExpenseProcessor) -> Self {
        Self { processor }
    }

    pub fn processor(&self) -> &RecurringExpenseProcessor {
        &self.processor
    }

    /// Loads the templates due on `today` and processes each of them.
    ///
    /// A template that fails is rolled back and reported; the remaining
    /// templates are still processed. Only failing to load the due templates
    /// fails the whole run.
    #[instrument(skip(self, db))]
    pub async fn process_due_templates(
        &self,
        db: &DatabaseConnection,
        today: NaiveDate,
    ) -> Result<BatchReport> {
        let due = DbStore::new(db).find_due(today).await?;
        info!("Processing {} due recurring expenses as of {}", due.len(), today);

        let mut report = BatchReport::new(today);
        for template in due {
            let template_id = template.id;
            match self.process_in_transaction(db, template, today).await {
                Ok(outcome) => report.succeeded.push(outcome),
                Err(e) => {
                    error!(template_id, "Failed to process recurring expense: {}", e);
                    report.failed.push(TemplateFailure {
                        template_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            generated = report.generated(),
            "Recurring expense run finished"
        );
        Ok(report)
    }

    /// Expenses and the template update commit together or not at all.
    async fn process_in_transaction(
        &self,
        db: &DatabaseConnection,
        template: recurring_expense::Model,
        today: NaiveDate,
    ) -> Result<TemplateOutcome> {
        let txn = db.begin().await?;
        let store = DbStore::new(&txn);

        // Work on the row as seen by this transaction, not the snapshot from
        // the due query, so a concurrent deactivation is not written back.
        let template = match store.reload_template(template.id).await {
            Ok(current) => current,
            Err(e) => {
                if let Err(rollback_error) = txn.rollback().await {
                    warn!("Rollback failed, the transaction is discarded on drop: {}", rollback_error);
                }
                return Err(e);
            }
        };

        match self.processor.process_template(&store, &store, template, today).await {
            Ok(outcome) => {
                txn.commit().await?;
                debug!(template_id = outcome.template_id, "Committed recurring expense");
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_error) = txn.rollback().await {
                    warn!("Rollback failed, the transaction is discarded on drop: {}", rollback_error);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Days;
    use model::entities::expense;
    use model::entities::recurring_expense::RecurrenceUnit;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set, Unchanged};

    use super::*;
    use crate::error::ComputeError;
    use crate::recurring::OutcomeStatus;
    use crate::template::deactivate_template;
    use crate::testing::{
        date, expense_dates, new_template, new_user, reload_template, setup_db, TemplateFixture,
    };

    #[tokio::test]
    async fn test_weekly_catch_up_is_persisted() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        let template = new_template(
            &db,
            &user,
            TemplateFixture::new(RecurrenceUnit::Weekly, today - Days::new(14)),
        )
        .await
        .unwrap();

        let report = RecurringExpenseJob::default()
            .process_due_templates(&db, today)
            .await
            .unwrap();

        assert_eq!(report.generated(), 3);
        assert!(!report.has_failures());
        assert_eq!(
            expense_dates(&db, &template).await.unwrap(),
            vec![today - Days::new(14), today - Days::new(7), today]
        );

        let stored = reload_template(&db, &template).await.unwrap();
        assert_eq!(stored.next_occurrence_date, Some(today + Days::new(7)));
        assert!(stored.active);
    }

    #[tokio::test]
    async fn test_second_run_is_idempotent() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, date(2025, 6, 10)))
            .await
            .unwrap();
        new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Monthly, date(2025, 1, 31)))
            .await
            .unwrap();

        let job = RecurringExpenseJob::default();
        let first = job.process_due_templates(&db, today).await.unwrap();
        let written = expense::Entity::find().count(&db).await.unwrap();
        assert_eq!(first.generated(), 9 + 5);
        assert_eq!(written, 14);

        let second = job.process_due_templates(&db, today).await.unwrap();
        assert!(second.succeeded.is_empty());
        assert_eq!(second.generated(), 0);
        assert_eq!(expense::Entity::find().count(&db).await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_exhausted_and_malformed_templates_are_deactivated() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);

        let ending = new_template(
            &db,
            &user,
            TemplateFixture::new(RecurrenceUnit::Yearly, today).ending(today),
        )
        .await
        .unwrap();
        let zero_interval = new_template(
            &db,
            &user,
            TemplateFixture::new(RecurrenceUnit::Daily, date(2025, 6, 1)).interval(0),
        )
        .await
        .unwrap();
        let no_cursor = new_template(
            &db,
            &user,
            TemplateFixture::new(RecurrenceUnit::Daily, today).without_cursor(),
        )
        .await
        .unwrap();

        let report = RecurringExpenseJob::default()
            .process_due_templates(&db, today)
            .await
            .unwrap();
        assert_eq!(report.succeeded.len(), 3);

        assert_eq!(expense_dates(&db, &ending).await.unwrap(), vec![today]);
        assert!(!reload_template(&db, &ending).await.unwrap().active);

        for template in [&zero_interval, &no_cursor] {
            assert!(expense_dates(&db, template).await.unwrap().is_empty());
            assert!(!reload_template(&db, template).await.unwrap().active);
        }
    }

    #[tokio::test]
    async fn test_failing_template_does_not_abort_batch() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);

        let orphan = new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, date(2025, 6, 16)))
            .await
            .unwrap();
        let healthy = new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, date(2025, 6, 17)))
            .await
            .unwrap();

        // Point the first template at a user that does not exist
        recurring_expense::ActiveModel {
            id: Unchanged(orphan.id),
            user_id: Set(user.id + 1000),
            ..Default::default()
        }
        .update(&db)
        .await
        .unwrap();

        let report = RecurringExpenseJob::default()
            .process_due_templates(&db, today)
            .await
            .unwrap();

        assert!(report.has_failures());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].template_id, orphan.id);
        assert_eq!(report.succeeded.len(), 1);
        assert_eq!(report.succeeded[0].template_id, healthy.id);

        assert!(expense_dates(&db, &orphan).await.unwrap().is_empty());
        let stored = reload_template(&db, &orphan).await.unwrap();
        assert_eq!(stored.next_occurrence_date, Some(date(2025, 6, 16)));
        assert!(stored.active);

        assert_eq!(
            expense_dates(&db, &healthy).await.unwrap(),
            vec![date(2025, 6, 17), today]
        );
    }

    #[tokio::test]
    async fn test_failure_mid_catch_up_rolls_back_partial_expenses() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        let template = new_template(
            &db,
            &user,
            TemplateFixture::new(RecurrenceUnit::Weekly, today - Days::new(14)),
        )
        .await
        .unwrap();

        // The second occurrence already exists, so writing it again violates
        // the per-template uniqueness of occurrence dates.
        expense::ActiveModel {
            user_id: Set(user.id),
            recurring_expense_id: Set(Some(template.id)),
            category: Set(template.category.clone()),
            amount: Set(Decimal::new(999, 2)),
            payment_method: Set(None),
            description: Set(None),
            date: Set(today - Days::new(7)),
            created_at: Set(today.and_hms_opt(0, 0, 0).unwrap()),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let report = RecurringExpenseJob::default()
            .process_due_templates(&db, today)
            .await
            .unwrap();

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.generated(), 0);

        // The first occurrence written in the failed run is gone again
        assert_eq!(
            expense_dates(&db, &template).await.unwrap(),
            vec![today - Days::new(7)]
        );
        let stored = reload_template(&db, &template).await.unwrap();
        assert_eq!(stored.next_occurrence_date, Some(today - Days::new(14)));
        assert!(stored.active);
    }

    #[tokio::test]
    async fn test_safety_limit_spreads_backlog_over_runs() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        let start = today - Days::new(2999);
        let template = new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, start))
            .await
            .unwrap();

        let job = RecurringExpenseJob::new(RecurringExpenseProcessor::new(1000));

        for run in 1..=3u64 {
            let report = job.process_due_templates(&db, today).await.unwrap();
            assert_eq!(report.generated(), 1000);
            // The third run writes the last 1000 and nothing is left behind
            let expected = if run < 3 {
                OutcomeStatus::Throttled
            } else {
                OutcomeStatus::Advanced
            };
            assert_eq!(report.succeeded[0].status, expected);

            let stored = reload_template(&db, &template).await.unwrap();
            assert!(stored.active);
            assert_eq!(stored.next_occurrence_date, Some(start + Days::new(1000 * run)));
        }

        // 3000 occurrences: start ..= today
        let report = job.process_due_templates(&db, today).await.unwrap();
        assert!(report.succeeded.is_empty());
        assert_eq!(expense_dates(&db, &template).await.unwrap().len(), 3000);
        assert_eq!(
            reload_template(&db, &template).await.unwrap().next_occurrence_date,
            Some(today + Days::new(1))
        );
    }

    #[tokio::test]
    async fn test_deactivation_after_due_query_is_respected() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        let template = new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, date(2025, 6, 16)))
            .await
            .unwrap();

        // Loaded as due, then deactivated before it is processed
        let due = DbStore::new(&db).find_due(today).await.unwrap();
        assert_eq!(due.len(), 1);
        deactivate_template(&db, template.id).await.unwrap();

        let job = RecurringExpenseJob::default();
        let outcome = job
            .process_in_transaction(&db, due[0].clone(), today)
            .await
            .unwrap();

        assert_eq!(outcome.status, OutcomeStatus::Skipped);
        assert!(expense_dates(&db, &template).await.unwrap().is_empty());
        let stored = reload_template(&db, &template).await.unwrap();
        assert!(!stored.active);
        assert_eq!(stored.next_occurrence_date, Some(date(2025, 6, 16)));
    }

    #[tokio::test]
    async fn test_template_removed_after_due_query_fails_cleanly() {
        let db = setup_db().await.unwrap();
        let user = new_user(&db).await.unwrap();
        let today = date(2025, 6, 18);
        let template = new_template(&db, &user, TemplateFixture::new(RecurrenceUnit::Daily, today))
            .await
            .unwrap();

        let mut stale = template.clone();
        stale.id = template.id + 1000;

        let result = RecurringExpenseJob::default()
            .process_in_transaction(&db, stale, today)
            .await;
        assert!(matches!(result, Err(ComputeError::TemplateNotFound(_))));
        assert!(expense::Entity::find().all(&db).await.unwrap().is_empty());
    }
}
