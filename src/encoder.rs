//! Request encoding for the answer-fetch call.
//!
//! Pure: session + question in, query and body parameters out.

use serde_json::json;

use crate::model::Question;
use crate::session::SessionState;

/// Parameters fixed for the lifetime of a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    /// Value of `bl`.
    pub backend_version: String,
    /// Value of `_reqid`, chosen once per client.
    pub request_id: u16,
}

impl RequestParams {
    pub fn new(backend_version: impl Into<String>) -> Self {
        Self {
            backend_version: backend_version.into(),
            request_id: random_request_id(),
        }
    }
}

/// A four-digit request id.
pub fn random_request_id() -> u16 {
    use rand::Rng;
    rand::thread_rng().gen_range(1000..10_000)
}

/// Query and body parameters of one answer-fetch request, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub query: Vec<(String, String)>,
    pub body: Vec<(String, String)>,
}

impl EncodedRequest {
    pub fn query_string(&self) -> String {
        form_encode(&self.query)
    }

    pub fn body_string(&self) -> String {
        form_encode(&self.body)
    }

    /// `base_url?query`.
    pub fn url(&self, base_url: &str) -> String {
        format!("{base_url}?{}", self.query_string())
    }
}

/// Build the answer-fetch parameters.
///
/// The continuity triple comes from the question when it carries one,
/// otherwise from the session.
pub fn encode(session: &SessionState, question: &Question, params: &RequestParams) -> EncodedRequest {
    let (conversation_id, response_id, choice_id) = if question.has_continuity() {
        (
            question.conversation_id.as_str(),
            question.response_id.as_str(),
            question.choice_id.as_str(),
        )
    } else {
        (
            session.conversation_id.as_str(),
            session.response_id.as_str(),
            session.choice_id.as_str(),
        )
    };

    EncodedRequest {
        query: vec![
            ("bl".into(), params.backend_version.clone()),
            ("_reqid".into(), params.request_id.to_string()),
            ("rt".into(), "c".into()),
        ],
        body: vec![
            (
                "f.req".into(),
                f_req(&question.text, conversation_id, response_id, choice_id),
            ),
            ("at".into(), session.anti_forgery_token.clone()),
        ],
    }
}

/// `[null, "<inner JSON>"]` where the inner array is itself serialized to a
/// string, so its quotes arrive escaped a second time.
fn f_req(text: &str, conversation_id: &str, response_id: &str, choice_id: &str) -> String {
    let inner = json!([[text], null, [conversation_id, response_id, choice_id]]);
    json!([null, inner.to_string()]).to_string()
}

/// `k=v&k=v` with spaces as `%20`; the service rejects `+`.
pub fn form_encode(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
