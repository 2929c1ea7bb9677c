//! This file serves as the root for all SeaORM entity modules.
//! We define the data models for the expense tracker here: users, the
//! expenses they record and the recurring templates expenses are generated from.

pub mod expense;
pub mod recurring_expense;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::expense::Entity as Expense;
    pub use super::recurring_expense::Entity as RecurringExpense;
    pub use super::user::Entity as User;
}
