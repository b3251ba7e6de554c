//! Unofficial client for the Bard web assistant.
//!
//! The service has no public API, so requests mimic a browser session and
//! answers arrive as nested positional JSON. Flow of one call:
//!
//! Question → translate (optional) → encode → transport → decode →
//! translate back (optional) → Answer, then the session advances.

pub mod client;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod model;
pub mod session;
pub mod translate;
pub mod transport;

pub use bard_config::ClientConfig;
pub use client::{BardClient, ClientState};
pub use error::{BardError, BardResult};
pub use model::{Answer, Choice, Image, Question, RelatedTopic, Source};
pub use translate::{GoogleTranslator, TranslationBridge, Translator};
pub use transport::{HttpTransport, Transport};
