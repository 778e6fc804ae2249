use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConsoleError {
    #[error("A session is running; stop it before editing")]
    Busy,

    #[error("Unknown variable id: {0}")]
    UnknownVariable(u32),

    #[error("Unknown variable field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

