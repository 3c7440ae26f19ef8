use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("backend error: {0}")]
    Application(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("decode error: {0}")]
    Decode(String),
}

impl FetchError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
            Self::Application(_) => "application",
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Network(detail) => format!("Cannot connect to backend server: {detail}"),
            Self::Http { status, body } => {
                let from_body = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                    .filter(|s| !s.trim().is_empty());
                match from_body {
                    Some(message) => message,
                    None if body.trim().is_empty() => format!("Server error: {status}"),
                    None => format!("Server error: {status} - {}", body.trim()),
                }
            }
            Self::Application(message) | Self::Validation(message) => message.clone(),
            Self::Decode(detail) => format!("Unexpected response from backend: {detail}"),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Network("request timed out".to_string())
        } else if err.is_connect() {
            Self::Network(format!("connection failed ({err})"))
        } else {
            Self::Network(err.to_string())
        }
    }
}
