use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::expense::{self, PaymentMethod};

/// Unit of time between two occurrences of a recurring expense.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecurrenceUnit {
    #[sea_orm(string_value = "DAILY")]
    Daily,
    #[sea_orm(string_value = "WEEKLY")]
    Weekly,
    #[sea_orm(string_value = "MONTHLY")]
    Monthly,
    #[sea_orm(string_value = "YEARLY")]
    Yearly,
}

/// A template describing an expense that repeats on a regular schedule
/// (rent, subscriptions, memberships).
///
/// `next_occurrence_date` is the cursor: the earliest occurrence that has not
/// been materialized as an [`expense`] yet. The template is retired by
/// clearing `active` once the cursor moves past `end_date`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "recurring_expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Owner of the generated expenses. Resolved when an occurrence is written.
    pub user_id: i32,
    pub category: String,
    /// The value of each occurrence.
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub description: Option<String>,
    pub recurrence_unit: RecurrenceUnit,
    /// Number of units between two occurrences.
    #[sea_orm(column_name = "recurrence_interval", default_value = "1")]
    pub interval: i32,
    /// The earliest occurrence not yet materialized.
    pub next_occurrence_date: Option<NaiveDate>,
    /// The date of the last allowed occurrence (inclusive). If null, it repeats indefinitely.
    pub end_date: Option<NaiveDate>,
    #[sea_orm(default_value = "true")]
    pub active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "expense::Entity")]
    Expense,
}

impl Related<expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expense.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
