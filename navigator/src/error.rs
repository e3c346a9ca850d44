use shared::polyline::DecodeError;
use thiserror::Error;

pub type Result<T, E = NavError> = std::result::Result<T, E>;

/// Everything that can go wrong between a user action and a displayed
/// route. The workflow turns each variant into a user-facing notice.
#[derive(Debug, Error)]
pub enum NavError {
    #[error("location permission is required to show your position")]
    PermissionDenied,
    #[error("current position is unavailable: {0}")]
    PositionUnavailable(String),
    #[error("network request failed: {0}")]
    Network(String),
    #[error("unexpected response from the {service} service: {detail}")]
    Parse {
        service: &'static str,
        detail: String,
    },
    #[error("no place found for \"{0}\"")]
    NotFound(String),
    #[error("no route found between the selected points")]
    NoRoute,
    #[error("route geometry could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("search query is empty")]
    EmptyQuery,
}

impl NavError {
    /// Short heading for the notice shown to the user.
    pub fn title(&self) -> &'static str {
        match self {
            NavError::PermissionDenied => "Permission needed",
            NavError::PositionUnavailable(_) => "Location unavailable",
            NavError::NotFound(_) | NavError::EmptyQuery => "Search",
            NavError::NoRoute | NavError::Decode(_) => "Routing",
            NavError::Network(_) | NavError::Parse { .. } => "Error",
        }
    }

    pub(crate) fn parse(service: &'static str, detail: impl ToString) -> Self {
        NavError::Parse {
            service,
            detail: detail.to_string(),
        }
    }
}

impl From<reqwest::Error> for NavError {
    fn from(err: reqwest::Error) -> Self {
        NavError::Network(err.to_string())
    }
}
