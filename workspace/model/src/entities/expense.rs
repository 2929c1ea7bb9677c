use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::{recurring_expense, user};

/// How an expense was paid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "CASH")]
    Cash,
    #[sea_orm(string_value = "CREDIT_CARD")]
    CreditCard,
    #[sea_orm(string_value = "DEBIT_CARD")]
    DebitCard,
    #[sea_orm(string_value = "BANK_TRANSFER")]
    BankTransfer,
    #[sea_orm(string_value = "DIGITAL_WALLET")]
    DigitalWallet,
    #[sea_orm(string_value = "OTHER")]
    Other,
}

/// Money spent on a concrete date.
///
/// Expenses are either entered by hand or materialized from a recurring
/// expense template, in which case `recurring_expense_id` records the
/// template and `date` the occurrence it was generated for. Once written an
/// expense is independent of its template.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    /// The template this expense was generated from, if any.
    pub recurring_expense_id: Option<i32>,
    pub category: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub payment_method: Option<PaymentMethod>,
    pub description: Option<String>,
    /// The day the money was spent.
    pub date: NaiveDate,
    pub created_at: NaiveDateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "user::Entity",
        from = "Column::UserId",
        to = "user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "recurring_expense::Entity",
        from = "Column::RecurringExpenseId",
        to = "recurring_expense::Column::Id",
        on_delete = "SetNull"
    )]
    RecurringExpense,
}

impl Related<user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<recurring_expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecurringExpense.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
