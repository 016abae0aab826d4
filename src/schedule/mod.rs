mod worker;

pub use worker::{next_execution, run_on_schedule, run_with_retries, RetryPolicy};
