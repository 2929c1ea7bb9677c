use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string(Users::Username).unique_key())
                    .col(string_null(Users::Email))
                    .to_owned(),
            )
            .await?;

        // Create recurring_expenses table.
        // The owner is a plain reference, it is resolved when an occurrence is written.
        manager
            .create_table(
                Table::create()
                    .table(RecurringExpenses::Table)
                    .if_not_exists()
                    .col(pk_auto(RecurringExpenses::Id))
                    .col(integer(RecurringExpenses::UserId))
                    .col(string(RecurringExpenses::Category))
                    .col(decimal(RecurringExpenses::Amount).decimal_len(12, 2))
                    .col(string_len_null(RecurringExpenses::PaymentMethod, 20))
                    .col(string_null(RecurringExpenses::Description))
                    .col(string_len(RecurringExpenses::RecurrenceUnit, 10))
                    .col(integer(RecurringExpenses::Interval).default(1))
                    .col(date_null(RecurringExpenses::NextOccurrenceDate))
                    .col(date_null(RecurringExpenses::EndDate))
                    .col(boolean(RecurringExpenses::Active).default(true))
                    .to_owned(),
            )
            .await?;

        // The daily run looks templates up by (active, next_occurrence_date)
        manager
            .create_index(
                Index::create()
                    .name("idx_recurring_expenses_due")
                    .table(RecurringExpenses::Table)
                    .col(RecurringExpenses::Active)
                    .col(RecurringExpenses::NextOccurrenceDate)
                    .to_owned(),
            )
            .await?;

        // Create expenses table
        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(pk_auto(Expenses::Id))
                    .col(integer(Expenses::UserId))
                    .col(integer_null(Expenses::RecurringExpenseId))
                    .col(string(Expenses::Category))
                    .col(decimal(Expenses::Amount).decimal_len(12, 2))
                    .col(string_len_null(Expenses::PaymentMethod, 20))
                    .col(string_null(Expenses::Description))
                    .col(date(Expenses::Date))
                    .col(date_time(Expenses::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_user")
                            .from(Expenses::Table, Expenses::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_expense_recurring_expense")
                            .from(Expenses::Table, Expenses::RecurringExpenseId)
                            .to(RecurringExpenses::Table, RecurringExpenses::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // An occurrence of a template is materialized at most once.
        // Hand-entered expenses have a NULL template and never collide.
        manager
            .create_index(
                Index::create()
                    .name("idx_expenses_recurring_occurrence")
                    .table(Expenses::Table)
                    .col(Expenses::RecurringExpenseId)
                    .col(Expenses::Date)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RecurringExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
}

#[derive(DeriveIden)]
enum RecurringExpenses {
    Table,
    Id,
    UserId,
    Category,
    Amount,
    PaymentMethod,
    Description,
    RecurrenceUnit,
    #[sea_orm(iden = "recurrence_interval")]
    Interval,
    NextOccurrenceDate,
    EndDate,
    Active,
}

#[derive(DeriveIden)]
enum Expenses {
    Table,
    Id,
    UserId,
    RecurringExpenseId,
    Category,
    Amount,
    PaymentMethod,
    Description,
    Date,
    CreatedAt,
}
