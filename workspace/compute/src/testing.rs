//! Shared fixtures for the compute tests.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;
use migration::{Migrator, MigratorTrait};
use model::entities::expense::PaymentMethod;
use model::entities::recurring_expense::{self, RecurrenceUnit};
use model::entities::{expense, user};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, Database, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set,
};

pub type Result<T> = std::result::Result<T, DbErr>;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub async fn setup_db() -> Result<DatabaseConnection> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let db = Database::connect("sqlite::memory:").await?;
    db.execute_unprepared("PRAGMA foreign_keys = ON;").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub async fn new_user(db: &DatabaseConnection) -> Result<user::Model> {
    static USER_ID: AtomicU64 = AtomicU64::new(0);

    let current_id = USER_ID.fetch_add(1, Ordering::SeqCst);
    user::ActiveModel {
        username: Set(format!("user_{}", current_id)),
        email: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Shape of a template to insert; defaults to an active, unbounded,
/// interval-1 subscription of 9.99.
#[derive(Debug, Clone)]
pub struct TemplateFixture {
    pub unit: RecurrenceUnit,
    pub interval: i32,
    pub next_occurrence_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub active: bool,
}

impl TemplateFixture {
    pub fn new(unit: RecurrenceUnit, next_occurrence_date: NaiveDate) -> Self {
        Self {
            unit,
            interval: 1,
            next_occurrence_date: Some(next_occurrence_date),
            end_date: None,
            active: true,
        }
    }

    pub fn interval(mut self, interval: i32) -> Self {
        self.interval = interval;
        self
    }

    pub fn ending(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn without_cursor(mut self) -> Self {
        self.next_occurrence_date = None;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The template as it would be loaded, without touching a database.
    pub fn model(&self, id: i32, user_id: i32) -> recurring_expense::Model {
        recurring_expense::Model {
            id,
            user_id,
            category: "Subscriptions".to_string(),
            amount: Decimal::new(999, 2),
            payment_method: Some(PaymentMethod::CreditCard),
            description: Some("Streaming service".to_string()),
            recurrence_unit: self.unit,
            interval: self.interval,
            next_occurrence_date: self.next_occurrence_date,
            end_date: self.end_date,
            active: self.active,
        }
    }
}

pub async fn new_template(
    db: &DatabaseConnection,
    owner: &user::Model,
    fixture: TemplateFixture,
) -> Result<recurring_expense::Model> {
    recurring_expense::ActiveModel {
        user_id: Set(owner.id),
        category: Set("Subscriptions".to_string()),
        amount: Set(Decimal::new(999, 2)),
        payment_method: Set(Some(PaymentMethod::CreditCard)),
        description: Set(Some("Streaming service".to_string())),
        recurrence_unit: Set(fixture.unit),
        interval: Set(fixture.interval),
        next_occurrence_date: Set(fixture.next_occurrence_date),
        end_date: Set(fixture.end_date),
        active: Set(fixture.active),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn reload_template(
    db: &DatabaseConnection,
    template: &recurring_expense::Model,
) -> Result<recurring_expense::Model> {
    recurring_expense::Entity::find_by_id(template.id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("recurring expense {}", template.id)))
}

/// Occurrence dates written for `template`, in date order.
pub async fn expense_dates(
    db: &DatabaseConnection,
    template: &recurring_expense::Model,
) -> Result<Vec<NaiveDate>> {
    let expenses = expense::Entity::find()
        .filter(expense::Column::RecurringExpenseId.eq(template.id))
        .order_by_asc(expense::Column::Date)
        .all(db)
        .await?;
    Ok(expenses.into_iter().map(|e| e.date).collect())
}
