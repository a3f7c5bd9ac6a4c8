use axum::{
    Router,
    extract::{
        FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use json::Json;
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, warn};
use visualsocial_common::{
    model::{Id, post::PostMarker},
    pin::PinError,
};
use visualsocial_db::{
    annotations::AnnotationError,
    client::{ClientError, ReviewClient},
};

mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub client: Arc<ReviewClient>,
}

/// Path the local media directory is served under.
pub const FILES_PATH: &str = "/files";

/// The full application: routes, tracing and, if given, the local media directory.
pub fn app(state: ServerState, media_dir: Option<PathBuf>) -> Router {
    let router = match media_dir {
        Some(media_dir) => routes().nest_service(FILES_PATH, ServeDir::new(media_dir)),
        None => routes(),
    };
    let router = router.layer(TraceLayer::new_for_http());

    router.with_state(state)
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Query rejected: {0}")]
    QueryRejection(#[from] QueryRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("Multipart body rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Multipart body has no `file` field")]
    MissingFile,
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Post with id {0} was not found.")]
    PostByIdNotFound(Id<PostMarker>),
    #[error("Pass either a position or a click, not both or neither")]
    AmbiguousPlacement,
    #[error("Click could not be mapped: {0}")]
    Pin(#[from] PinError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::PostByIdNotFound(_) => StatusCode::NOT_FOUND,
            ServerError::QueryRejection(_)
            | ServerError::JsonRejection(_)
            | ServerError::MultipartRejection(_)
            | ServerError::Multipart(_)
            | ServerError::MissingFile
            | ServerError::AmbiguousPlacement
            | ServerError::Pin(_)
            | ServerError::Client(ClientError::Annotation(AnnotationError::EmptyText)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Client(ClientError::Review(_)) => StatusCode::CONFLICT,
            ServerError::Client(ClientError::NoMediaStore) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Client(ClientError::Upload(_)) => StatusCode::BAD_GATEWAY,
            ServerError::JsonResponse(_)
            | ServerError::Client(ClientError::Id(_) | ClientError::Annotation(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Rejecting request");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
            message: self.to_string(),
        };
        (status, Json(error_response)).into_response()
    }
}
