//! Storage seams used by the recurring expense processor.
//!
//! The processor only needs somewhere to read and write templates and
//! somewhere to append materialized expenses. [`DbStore`] implements both over
//! any SeaORM connection, so the same code runs against a pooled connection or
//! inside a [`sea_orm::DatabaseTransaction`].

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use model::entities::expense::{self, PaymentMethod};
use model::entities::{recurring_expense, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, Unchanged,
};
use tracing::{debug, instrument, trace};

use crate::error::{ComputeError, Result};

/// Source of recurring expense templates.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Active templates whose cursor is on or before `today`, oldest cursor
    /// first. Active templates with no cursor at all are returned too so the
    /// processor can retire them.
    async fn find_due(&self, today: NaiveDate) -> Result<Vec<recurring_expense::Model>>;

    /// Persists the template's cursor and active flag.
    async fn save_template(&self, template: &recurring_expense::Model) -> Result<()>;
}

/// Destination for materialized occurrences.
#[async_trait]
pub trait ExpenseSink: Send + Sync {
    async fn save_expense(&self, expense: NewExpense) -> Result<()>;
}

/// One occurrence of a template, ready to be written as an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub user_id: i32,
    pub recurring_expense_id: i32,
    pub category: String,
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub description: Option<String>,
    pub date: NaiveDate,
}

impl NewExpense {
    /// Snapshot of `template` for the occurrence on `date`.
    pub fn from_template(template: &recurring_expense::Model, date: NaiveDate) -> Self {
        Self {
            user_id: template.user_id,
            recurring_expense_id: template.id,
            category: template.category.clone(),
            amount: template.amount,
            payment_method: template.payment_method,
            description: template.description.clone(),
            date,
        }
    }
}

/// [`TemplateStore`] and [`ExpenseSink`] backed by SeaORM.
pub struct DbStore<'a, C> {
    conn: &'a C,
    known_owners: Mutex<HashSet<i32>>,
}

impl<'a, C> DbStore<'a, C>
where
    C: ConnectionTrait,
{
    pub fn new(conn: &'a C) -> Self {
        Self {
            conn,
            known_owners: Mutex::new(HashSet::new()),
        }
    }

    /// Current state of a template.
    pub async fn reload_template(&self, template_id: i32) -> Result<recurring_expense::Model> {
        recurring_expense::Entity::find_by_id(template_id)
            .one(self.conn)
            .await?
            .ok_or(ComputeError::TemplateNotFound(template_id))
    }

    /// Checks the owner exists, querying each owner at most once per store.
    async fn resolve_owner(&self, user_id: i32) -> Result<()> {
        if self.is_known_owner(user_id) {
            return Ok(());
        }

        let owner = user::Entity::find_by_id(user_id)
            .one(self.conn)
            .await?
            .ok_or(ComputeError::OwnerNotFound(user_id))?;
        trace!(owner = %owner.username, "Resolved expense owner");

        if let Ok(mut known) = self.known_owners.lock() {
            known.insert(owner.id);
        }
        Ok(())
    }

    fn is_known_owner(&self, user_id: i32) -> bool {
        self.known_owners
            .lock()
            .map(|known| known.contains(&user_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl<C> TemplateStore for DbStore<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    #[instrument(skip(self))]
    async fn find_due(&self, today: NaiveDate) -> Result<Vec<recurring_expense::Model>> {
        let due = recurring_expense::Entity::find()
            .filter(recurring_expense::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(recurring_expense::Column::NextOccurrenceDate.lte(today))
                    .add(recurring_expense::Column::NextOccurrenceDate.is_null()),
            )
            .order_by_asc(recurring_expense::Column::NextOccurrenceDate)
            .order_by_asc(recurring_expense::Column::Id)
            .all(self.conn)
            .await?;

        debug!("Found {} due recurring expenses", due.len());
        Ok(due)
    }

    async fn save_template(&self, template: &recurring_expense::Model) -> Result<()> {
        trace!(
            template_id = template.id,
            next_occurrence_date = ?template.next_occurrence_date,
            active = template.active,
            "Saving recurring expense"
        );

        recurring_expense::ActiveModel {
            id: Unchanged(template.id),
            next_occurrence_date: Set(template.next_occurrence_date),
            active: Set(template.active),
            ..Default::default()
        }
        .update(self.conn)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl<C> ExpenseSink for DbStore<'_, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn save_expense(&self, expense: NewExpense) -> Result<()> {
        self.resolve_owner(expense.user_id).await?;

        trace!(
            template_id = expense.recurring_expense_id,
            user_id = expense.user_id,
            date = %expense.date,
            "Writing recurring expense occurrence"
        );

        expense::ActiveModel {
            user_id: Set(expense.user_id),
            recurring_expense_id: Set(Some(expense.recurring_expense_id)),
            category: Set(expense.category),
            amount: Set(expense.amount),
            payment_method: Set(expense.payment_method),
            description: Set(expense.description),
            date: Set(expense.date),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(self.conn)
        .await?;

        Ok(())
    }
}
