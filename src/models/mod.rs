pub mod credits;
pub mod generation;
pub mod job;
pub mod pricing;
