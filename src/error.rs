use thiserror::Error;

#[derive(Error, Debug)]
pub enum KopilkaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown savings goal: {0}")]
    UnknownGoal(i64),

    #[error("Unknown budget: {0}")]
    UnknownBudget(i64),

    #[error("Unknown batch format: {0}")]
    UnknownFormat(String),

    #[error("Not enough money in goal {goal_id}. Available: {available}")]
    InsufficientFunds {
        goal_id: i64,
        available: rust_decimal::Decimal,
    },

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, KopilkaError>;
