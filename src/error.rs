//! Error types for Guest Assist.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Classification error: {0}")]
    Classify(#[from] ClassifyError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Classification client errors.
///
/// `Unavailable` is non-fatal to the intake pipelines: they log it, skip
/// the response/escalation steps, and return the persisted record.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("Cannot classify empty text")]
    EmptyInput,

    #[error("Classification service unavailable: {0}")]
    Unavailable(String),
}

/// Intake pipeline errors — these reject the request before or during
/// the fatal (persistence) steps.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Invalid intake input: {0}")]
    Validation(String),

    #[error("No tenant matches routing key {0}")]
    TenantResolution(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

/// Delivery provider errors — logged, never propagated out of the
/// pipelines, never roll back a persisted message.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("No delivery provider configured for channel {channel}")]
    NotConfigured { channel: String },

    #[error("No reachable recipient for message {message_id}")]
    NoRecipient { message_id: String },

    #[error("Send failed on channel {channel}: {reason}")]
    SendFailed { channel: String, reason: String },
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
