use futures::stream::Stream;
use std::pin::Pin;

use crate::errors::AppError;

pub mod model_registry;
pub mod ollama;

// Type alias for the incremental completion stream: a lazy, finite,
// non-restartable sequence of text fragments, terminated when the upstream
// connection closes.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String, AppError>> + Send>>;
