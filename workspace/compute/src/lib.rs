pub mod batch;
pub mod error;
pub mod occurrence;
pub mod recurring;
pub mod store;
pub mod template;
pub mod users;

#[cfg(test)]
mod testing;

use batch::RecurringExpenseJob;
use recurring::RecurringExpenseProcessor;

/// Returns the pre-configured job used by the scheduler and the `run` command.
///
/// `safety_limit` caps the occurrences written per template per run; `None`
/// uses [`recurring::DEFAULT_SAFETY_LIMIT`].
pub fn default_job(safety_limit: Option<usize>) -> RecurringExpenseJob {
    let processor = safety_limit
        .map(RecurringExpenseProcessor::new)
        .unwrap_or_default();
    RecurringExpenseJob::new(processor)
}
