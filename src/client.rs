//! BardClient — drives one question/answer cycle against the web service.
//!
//! No pipeline awareness and no retries. Each call blocks on the transport,
//! and session state changes only after a call has fully succeeded.

use std::sync::Arc;

use bard_config::ClientConfig;
use tracing::{debug, info};

use crate::decoder;
use crate::encoder::{self, RequestParams};
use crate::error::{BardError, BardResult};
use crate::model::{Answer, Question};
use crate::session::{self, SessionState};
use crate::transport::{HttpRequest, Method, Transport, TransportError};
use crate::translate::{Inbound, TranslationBridge};

/// Where the client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No anti-forgery token yet; the next call fetches one.
    Fresh,
    /// Token present; the continuity triple may be empty or populated.
    Ready,
}

/// Client for one conversation. Not meant to be shared across threads
/// without a lock: `get_answer` takes `&mut self`.
pub struct BardClient {
    config: ClientConfig,
    session: SessionState,
    params: RequestParams,
    transport: Arc<dyn Transport>,
    translator: Option<TranslationBridge>,
}

impl BardClient {
    /// Create a client. Fails with `InvalidInput` on a malformed auth token.
    pub fn new(
        auth_token: impl Into<String>,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> BardResult<Self> {
        let session = SessionState::new(auth_token)?;
        let params = RequestParams::new(config.service.backend_version.clone());
        Ok(Self {
            config,
            session,
            params,
            transport,
            translator: None,
        })
    }

    /// Route questions in unsupported languages through a translation bridge.
    pub fn with_translator(mut self, bridge: TranslationBridge) -> Self {
        self.translator = Some(bridge);
        self
    }

    pub fn state(&self) -> ClientState {
        if self.session.has_anti_forgery_token() {
            ClientState::Ready
        } else {
            ClientState::Fresh
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn request_id(&self) -> u16 {
        self.params.request_id
    }

    /// Ask a question in the current conversation.
    pub fn ask(&mut self, text: &str) -> BardResult<Answer> {
        self.get_answer(&Question::new(text))
    }

    /// Run one full request/response cycle.
    pub fn get_answer(&mut self, question: &Question) -> BardResult<Answer> {
        if question.text.is_empty() {
            return Err(BardError::InvalidInput("question is empty".into()));
        }

        self.ensure_token()?;

        let inbound = match &self.translator {
            Some(bridge) => bridge.maybe_translate_in(&question.text)?,
            None => Inbound {
                text: question.text.clone(),
                used_translator: false,
                detected_lang: String::new(),
            },
        };
        let outgoing = Question {
            text: inbound.text.clone(),
            ..question.clone()
        };

        let raw = self.send_question(&outgoing)?;
        let mut answer = decoder::decode(&raw)?;

        if inbound.used_translator {
            if let Some(bridge) = &self.translator {
                answer.text =
                    bridge.maybe_translate_out(&answer.text, true, &inbound.detected_lang)?;
            }
            answer.used_translator = true;
            // Spans index the pivot-language text, which is gone now.
            if answer.sources.take().is_some() {
                debug!("dropped sources after translating the answer");
            }
        }

        self.session.advance(
            &answer.conversation_id,
            &answer.response_id,
            &answer.choices[0].id,
        );
        Ok(answer)
    }

    /// Forget the conversation and the anti-forgery token.
    pub fn reset(&mut self) {
        debug!("session reset");
        self.session.reset();
    }

    /// Fetch the anti-forgery token if the session has none.
    pub fn ensure_token(&mut self) -> BardResult<()> {
        if self.session.has_anti_forgery_token() {
            return Ok(());
        }

        info!("fetching anti-forgery token");
        let response = self.transport.request(HttpRequest {
            method: Method::Get,
            url: self.config.service.root_url.clone(),
            headers: self.session.headers(&self.config.service, &self.config.http),
            body: None,
        })?;

        if response.status != 200 {
            return Err(TransportError::Status {
                status: response.status,
            }
            .into());
        }
        let body = response.body.ok_or(TransportError::EmptyBody)?;
        self.session.anti_forgery_token = session::extract_anti_forgery_token(&body)?;
        Ok(())
    }

    fn send_question(&self, question: &Question) -> BardResult<String> {
        let encoded = encoder::encode(&self.session, question, &self.params);
        let url = encoded.url(&self.config.service.stream_generate_url());
        debug!("sending question, _reqid={}", self.params.request_id);

        let response = self.transport.request(HttpRequest {
            method: Method::Post,
            url,
            headers: self.session.headers(&self.config.service, &self.config.http),
            body: Some(encoded.body_string()),
        })?;

        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
            }
            .into());
        }
        Ok(response.body.ok_or(TransportError::EmptyBody)?)
    }
}

impl std::fmt::Debug for BardClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BardClient")
            .field("session", &self.session)
            .field("request_id", &self.params.request_id)
            .field("translator", &self.translator)
            .finish_non_exhaustive()
    }
}
