pub mod credits;
pub mod job_queue;
pub mod poller;
pub mod runware;
pub mod stripe;
pub mod styles;
pub mod validation;
