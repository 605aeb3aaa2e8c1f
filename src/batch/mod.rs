mod planner;

pub use planner::{plan_batches, AddressBatch, BatchPlan, BatchState};
