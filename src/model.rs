//! Question and Answer types.

use serde::Serialize;

/// A question to send. An empty continuity triple means "use the session's".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub conversation_id: String,
    pub response_id: String,
    pub choice_id: String,
}

impl Question {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Continue a specific conversation instead of the session's current one.
    pub fn in_conversation(
        mut self,
        conversation_id: impl Into<String>,
        response_id: impl Into<String>,
        choice_id: impl Into<String>,
    ) -> Self {
        self.conversation_id = conversation_id.into();
        self.response_id = response_id.into();
        self.choice_id = choice_id.into();
        self
    }

    pub fn has_continuity(&self) -> bool {
        !(self.conversation_id.is_empty() && self.response_id.is_empty() && self.choice_id.is_empty())
    }
}

/// A decoded answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub text: String,
    pub conversation_id: String,
    pub response_id: String,
    pub choice_id: String,
    /// Whether the question/answer went through the translation bridge.
    pub used_translator: bool,
    pub factuality_queries: Option<Vec<String>>,
    pub text_query: Option<String>,
    /// Never empty; `choices[0].id` is the next turn's choice id.
    pub choices: Vec<Choice>,
    pub images: Option<Vec<Image>>,
    pub sources: Option<Vec<Source>>,
    pub related_topics: Option<Vec<RelatedTopic>>,
    /// The whole response body as received.
    pub raw_response: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    pub id: String,
    pub content: String,
}

/// A generated image. `image_marker` is a bracketed label like `[Image of X]`
/// that appears verbatim in the answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_url: String,
    pub image_marker: String,
    pub details_link: String,
}

impl Image {
    /// Markdown that replaces the marker: an image wrapped in a link to its article.
    pub fn markdown(&self) -> String {
        format!(
            "[!{}({})]({})",
            self.image_marker, self.image_url, self.details_link
        )
    }
}

/// A cited span of the answer. Offsets count UTF-16 code units of `Answer::text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub start_index_in_answer: usize,
    pub end_index_in_answer: usize,
    pub raw_content_in_answer: String,
    pub source_link: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTopic {
    pub topic: String,
    pub num: i64,
}

/// Piece of the answer being rendered: untouched text, or a substitution
/// that later images must not search inside.
enum Segment {
    Raw(String),
    Rendered(String),
}

impl Answer {
    /// The answer text with each image marker replaced by markdown.
    ///
    /// Images are applied in list order, each to the first occurrence of its
    /// marker in text not already substituted. Missing markers are skipped.
    pub fn markdown(&self) -> String {
        let images = match &self.images {
            Some(images) if !images.is_empty() => images,
            _ => return self.text.clone(),
        };

        let mut segments = vec![Segment::Raw(self.text.clone())];
        for image in images {
            let marker = image.image_marker.as_str();
            if marker.is_empty() {
                continue;
            }
            let hit = segments.iter().enumerate().find_map(|(i, seg)| match seg {
                Segment::Raw(s) => s.find(marker).map(|pos| (i, pos)),
                Segment::Rendered(_) => None,
            });
            let Some((index, pos)) = hit else {
                continue;
            };
            let Segment::Raw(raw) = &segments[index] else {
                continue;
            };
            let before = raw[..pos].to_string();
            let after = raw[pos + marker.len()..].to_string();
            segments.splice(
                index..=index,
                [
                    Segment::Raw(before),
                    Segment::Rendered(image.markdown()),
                    Segment::Raw(after),
                ],
            );
        }

        segments
            .into_iter()
            .map(|seg| match seg {
                Segment::Raw(s) | Segment::Rendered(s) => s,
            })
            .collect()
    }
}
