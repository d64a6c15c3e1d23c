use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("A plan with id '{0}' has already been executed. Choose a new plan id or request re-execution.")]
    DuplicatePlan(String),

    #[error("Trade execution error: {0}")]
    Executor(#[from] executor::ExecutorError),

    #[error("Database error: {0}")]
    Store(#[from] database::StoreError),

    #[error("Serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}
