//! Pre-flight readiness checks run before a chat session starts.

use thiserror::Error;
use tracing::{info, warn};

use crate::traits::ChatBackend;

/// Why a session cannot start.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreflightError {
    #[error("could not connect to {backend} at {url}; is it running?")]
    Unreachable { backend: String, url: String },

    #[error("model '{model}' is not available on {backend}; try `ollama pull {model}`")]
    ModelMissing { backend: String, model: String },
}

/// Verify the backend is reachable and serves the configured model.
pub async fn preflight(backend: &dyn ChatBackend) -> Result<(), PreflightError> {
    if !backend.check_availability().await {
        warn!(url = backend.endpoint(), "backend unreachable");
        return Err(PreflightError::Unreachable {
            backend: backend.display_name().to_string(),
            url: backend.endpoint().to_string(),
        });
    }

    if !backend.is_model_present().await {
        warn!(model = backend.model(), "model not installed");
        return Err(PreflightError::ModelMissing {
            backend: backend.display_name().to_string(),
            model: backend.model().to_string(),
        });
    }

    info!(
        backend = backend.display_name(),
        model = backend.model(),
        "pre-flight checks passed"
    );
    Ok(())
}
