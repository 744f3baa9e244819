use answer_engine::AskRequest;
use serde::Deserialize;

/// Request payload for `POST /api/v1/ask`.
///
/// Missing fields default to empty strings so that they surface as
/// validation errors (400) rather than deserialization failures.
#[derive(Debug, Deserialize)]
pub struct AskBody {
    #[serde(default)]
    pub grade: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub question: String,
}

impl From<AskBody> for AskRequest {
    fn from(b: AskBody) -> Self {
        AskRequest::new(b.grade, b.subject, b.question)
    }
}
