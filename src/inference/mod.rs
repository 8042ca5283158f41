pub mod classifier_pipeline;
pub mod models;
pub mod task;
