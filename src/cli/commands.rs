pub mod initdb;
pub mod run;
pub mod schedule;
pub mod template;
pub mod user;

pub use initdb::init_database;
pub use run::run_once;
pub use schedule::schedule;
pub use template::{add_template, deactivate, list_templates, NewTemplateArgs};
pub use user::add_user;
