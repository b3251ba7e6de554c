//! Google Translate web endpoint as a [`Translator`].
//!
//! Uses the keyless `client=gtx` endpoint. Responses are positional arrays:
//! segment translations at `[0][i][0]`, detected source language at `[2]`.

use std::sync::Arc;

use bard_config::TranslatorConfig;
use serde_json::Value;
use tracing::debug;

use super::{TranslationError, Translator};
use crate::encoder::form_encode;
use crate::transport::{HttpRequest, Method, Transport, TransportError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36";

pub struct GoogleTranslator {
    transport: Arc<dyn Transport>,
    endpoint: String,
}

impl GoogleTranslator {
    pub fn new(transport: Arc<dyn Transport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &TranslatorConfig) -> Self {
        Self::new(transport, config.endpoint.clone())
    }

    fn query(&self, source: &str, target: &str, text: &str) -> Result<Value, TranslationError> {
        let params = [
            ("client", "gtx"),
            ("sl", source),
            ("tl", target),
            ("dt", "t"),
            ("q", text),
        ]
        .map(|(k, v)| (k.to_string(), v.to_string()));
        let url = format!("{}?{}", self.endpoint, form_encode(&params));

        debug!("translator query sl={source} tl={target}");
        let response = self.transport.request(HttpRequest {
            method: Method::Get,
            url,
            headers: vec![("User-Agent".into(), USER_AGENT.into())],
            body: None,
        })?;

        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
            }
            .into());
        }
        let body = response.body.ok_or(TransportError::EmptyBody)?;
        serde_json::from_str(&body)
            .map_err(|e| TranslationError::MalformedResponse(format!("not JSON: {e}")))
    }
}

impl Translator for GoogleTranslator {
    fn detect(&self, text: &str) -> Result<String, TranslationError> {
        let value = self.query("auto", "en", text)?;
        value
            .get(2)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TranslationError::Detect("no detected language at [2]".into()))
    }

    fn translate(&self, from: &str, to: &str, text: &str) -> Result<String, TranslationError> {
        let value = self.query(from, to, text)?;
        joined_segments(&value).ok_or_else(|| TranslationError::Translate {
            from: from.to_string(),
            to: to.to_string(),
            message: "no translated segments at [0]".into(),
        })
    }
}

/// Concatenate `[0][i][0]` across segments.
fn joined_segments(value: &Value) -> Option<String> {
    let segments = value.get(0)?.as_array()?;
    let mut out = String::new();
    for segment in segments {
        // Trailing transliteration segments carry null here.
        if let Some(part) = segment.get(0).and_then(Value::as_str) {
            out.push_str(part);
        }
    }
    if out.is_empty() && !segments.is_empty() {
        return None;
    }
    Some(out)
}
