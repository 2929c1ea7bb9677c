//! Materialization of recurring expense templates.
//!
//! A template carries a cursor (`next_occurrence_date`). Processing a template
//! as of `today` writes one expense for every occurrence from the cursor up to
//! and including `today`, moves the cursor past the last written occurrence
//! and retires the template once the cursor has moved beyond its end date.
//! Missed runs are caught up in order, bounded by a per-invocation safety
//! limit; whatever is left over is picked up by the next run.

use chrono::NaiveDate;
use model::entities::recurring_expense;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::occurrence::{is_within_end_date, next_occurrence};
use crate::store::{ExpenseSink, NewExpense, TemplateStore};

/// Maximum number of occurrences materialized per template per invocation.
pub const DEFAULT_SAFETY_LIMIT: usize = 1000;

/// What processing did to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The template was inactive and left untouched.
    Skipped,
    /// The cursor moved forward and the template stays active.
    Advanced,
    /// The schedule ran past its end date and the template was retired.
    Exhausted,
    /// The template had no cursor or a non-positive interval and was retired.
    Invalid,
    /// The safety limit was reached; the backlog continues on the next run.
    Throttled,
}

/// Result of processing a single template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateOutcome {
    pub template_id: i32,
    /// Number of expenses written.
    pub generated: usize,
    /// The persisted cursor.
    pub next_occurrence_date: Option<NaiveDate>,
    /// The persisted active flag.
    pub active: bool,
    pub status: OutcomeStatus,
}

impl TemplateOutcome {
    fn new(template: &recurring_expense::Model, generated: usize, status: OutcomeStatus) -> Self {
        Self {
            template_id: template.id,
            generated,
            next_occurrence_date: template.next_occurrence_date,
            active: template.active,
            status,
        }
    }
}

/// Runs the catch-up loop for individual templates.
#[derive(Debug, Clone)]
pub struct RecurringExpenseProcessor {
    safety_limit: usize,
}

impl Default for RecurringExpenseProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_SAFETY_LIMIT)
    }
}

impl RecurringExpenseProcessor {
    /// Creates a processor writing at most `safety_limit` occurrences per
    /// template per call. A limit of zero is raised to one.
    pub fn new(safety_limit: usize) -> Self {
        Self {
            safety_limit: safety_limit.max(1),
        }
    }

    pub fn safety_limit(&self) -> usize {
        self.safety_limit
    }

    /// Materializes every occurrence of `template` due on or before `today`.
    ///
    /// The template is saved through `templates` exactly once unless it was
    /// inactive to begin with. Expenses go to `expenses`, in date order. Callers
    /// wanting all-or-nothing semantics pass stores bound to one transaction
    /// and roll it back on error.
    #[instrument(
        skip(self, templates, expenses, template),
        fields(template_id = template.id, today = %today)
    )]
    pub async fn process_template<T, E>(
        &self,
        templates: &T,
        expenses: &E,
        mut template: recurring_expense::Model,
        today: NaiveDate,
    ) -> Result<TemplateOutcome>
    where
        T: TemplateStore + ?Sized,
        E: ExpenseSink + ?Sized,
    {
        if !template.active {
            debug!("Recurring expense is inactive, skipping");
            return Ok(TemplateOutcome::new(&template, 0, OutcomeStatus::Skipped));
        }

        let Some(mut candidate) = template.next_occurrence_date else {
            warn!("Recurring expense has no next occurrence date, deactivating");
            return self.retire(templates, template, OutcomeStatus::Invalid).await;
        };

        if template.interval <= 0 {
            warn!(interval = template.interval, "Recurring expense has a non-positive interval, deactivating");
            return self.retire(templates, template, OutcomeStatus::Invalid).await;
        }

        if !is_within_end_date(candidate, template.end_date) {
            info!(
                next_occurrence_date = %candidate,
                end_date = ?template.end_date,
                "Recurring expense is past its end date, deactivating"
            );
            return self.retire(templates, template, OutcomeStatus::Exhausted).await;
        }

        let mut generated = 0;
        while is_within_end_date(candidate, template.end_date)
            && candidate <= today
            && generated < self.safety_limit
        {
            expenses
                .save_expense(NewExpense::from_template(&template, candidate))
                .await?;
            generated += 1;
            candidate = next_occurrence(candidate, template.recurrence_unit, template.interval)?;
        }

        template.next_occurrence_date = Some(candidate);

        // Only throttled when the limit cut the loop short with occurrences still due
        let backlog_left = is_within_end_date(candidate, template.end_date) && candidate <= today;
        if generated >= self.safety_limit && backlog_left {
            warn!(
                generated,
                next_occurrence_date = %candidate,
                "Safety limit reached, remaining occurrences are deferred to the next run"
            );
            templates.save_template(&template).await?;
            return Ok(TemplateOutcome::new(&template, generated, OutcomeStatus::Throttled));
        }

        let status = if is_within_end_date(candidate, template.end_date) {
            OutcomeStatus::Advanced
        } else {
            template.active = false;
            OutcomeStatus::Exhausted
        };
        templates.save_template(&template).await?;

        info!(
            generated,
            next_occurrence_date = %candidate,
            active = template.active,
            "Processed recurring expense"
        );
        Ok(TemplateOutcome::new(&template, generated, status))
    }

    async fn retire<T>(
        &self,
        templates: &T,
        mut template: recurring_expense::Model,
        status: OutcomeStatus,
    ) -> Result<TemplateOutcome>
    where
        T: TemplateStore + ?Sized,
    {
        template.active = false;
        templates.save_template(&template).await?;
        Ok(TemplateOutcome::new(&template, 0, status))
    }
}
