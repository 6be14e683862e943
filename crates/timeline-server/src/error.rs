use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use timeline_core::TimelineError;
use timeline_loop::TurnError;

pub type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error(transparent)]
    Turn(#[from] TurnError),

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Stored session {0} is unusable: {1}")]
    CorruptSession(String, TimelineError),
}

fn timeline_status(error: &TimelineError) -> StatusCode {
    match error {
        TimelineError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        TimelineError::InvalidMerge(_)
        | TimelineError::EmptyMessages
        | TimelineError::RootBranchDisallowed
        | TimelineError::NoPreviousEntry => StatusCode::BAD_REQUEST,
        TimelineError::PromptLocked { .. } => StatusCode::CONFLICT,
        TimelineError::DetachedNode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Timeline(error) => timeline_status(error),
            ApiError::Turn(error) => match error {
                TurnError::EmptyInput | TurnError::NoParentToBranch => StatusCode::BAD_REQUEST,
                TurnError::AlreadyInFlight | TurnError::Cancelled { .. } => StatusCode::CONFLICT,
                TurnError::RemoteCompletionFailed { .. } => StatusCode::BAD_GATEWAY,
                TurnError::Interrupted { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                TurnError::Timeline(error) => timeline_status(error),
            },
            ApiError::Storage(_) | ApiError::CorruptSession(..) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({ "error": self.to_string() });
        if let ApiError::Turn(error) = self {
            if let Some(draft) = error.draft() {
                body["draft"] = json!(draft);
            }
        }
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timeline_core::NodeId;
    use timeline_llm::LLMError;

    #[test]
    fn timeline_errors_map_to_client_statuses() {
        let cases = [
            (TimelineError::NodeNotFound(NodeId::new("x")), 404),
            (TimelineError::InvalidMerge("dup".into()), 400),
            (TimelineError::PromptLocked { node_count: 3 }, 409),
            (TimelineError::NoPreviousEntry, 400),
            (TimelineError::DetachedNode(NodeId::new("x")), 500),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status_code().as_u16(), status);
        }
    }

    #[test]
    fn turn_errors_map_to_gateway_and_conflict() {
        let error = ApiError::from(TurnError::RemoteCompletionFailed {
            draft: "Hi".to_string(),
            source: LLMError::EmptyResponse,
        });

        assert_eq!(error.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            ApiError::from(TurnError::Timeline(TimelineError::RootBranchDisallowed))
                .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(TurnError::AlreadyInFlight).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(TurnError::NoParentToBranch).status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
