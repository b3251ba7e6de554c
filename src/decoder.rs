//! Response decoder — chunked, double-encoded, positional JSON to [`Answer`].
//!
//! The answer-fetch body is newline-delimited. Line 3 carries an envelope
//! `[["wrb.fr", null, "<payload>"]]` whose third entry is a JSON string that
//! must be parsed again. The payload array is positional:
//!
//! | index | contents                                             | required |
//! |-------|------------------------------------------------------|----------|
//! | 0     | `[text]`                                             | yes      |
//! | 1     | `[conversation_id, response_id]`                     | yes      |
//! | 2     | `[[text_query, n], ...]`, also read as related topics | no       |
//! | 3     | factuality queries, or `[[[start, end, [link]], ...]]` | no     |
//! | 4     | choices `[[id, content, _, _, images], ...]`         | yes      |
//!
//! Required fields fail the whole decode with `MalformedResponse`. Optional
//! fields are decoded one at a time and left `None` when their shape does not
//! match; sections 2 and 3 are tried under both known interpretations.

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{BardError, BardResult};
use crate::model::{Answer, Choice, Image, RelatedTopic, Source};

/// Physical line of the response stream that holds the payload envelope.
pub const PAYLOAD_LINE: usize = 3;

/// Decode a raw answer-fetch body.
pub fn decode(raw: &str) -> BardResult<Answer> {
    let payload = extract_payload(raw)?;
    decode_payload(&payload, raw)
}

/// Locate the payload line and undo both layers of JSON encoding.
pub fn extract_payload(raw: &str) -> BardResult<Value> {
    let line = raw.lines().nth(PAYLOAD_LINE).ok_or_else(|| {
        BardError::MalformedResponse(format!(
            "response has {} lines, payload expected on line {PAYLOAD_LINE}",
            raw.lines().count()
        ))
    })?;

    let envelope: Value = serde_json::from_str(line)
        .map_err(|e| BardError::MalformedResponse(format!("payload line is not JSON: {e}")))?;

    let inner = at(&envelope, &[0, 2])
        .and_then(Value::as_str)
        .ok_or_else(|| {
            BardError::MalformedResponse("envelope has no payload string at [0][2]".into())
        })?;

    let payload: Value = serde_json::from_str(inner)
        .map_err(|e| BardError::MalformedResponse(format!("payload string is not JSON: {e}")))?;

    if !payload.is_array() {
        return Err(BardError::MalformedResponse("payload is not an array".into()));
    }
    Ok(payload)
}

/// Interpret an already-parsed payload array.
pub fn decode_payload(payload: &Value, raw: &str) -> BardResult<Answer> {
    let text = at(payload, &[0, 0])
        .and_then(text_of)
        .ok_or_else(|| missing("answer text at [0][0]"))?
        .to_string();
    let conversation_id = at(payload, &[1, 0])
        .and_then(text_of)
        .ok_or_else(|| missing("conversation id at [1][0]"))?
        .to_string();
    let response_id = at(payload, &[1, 1])
        .and_then(text_of)
        .ok_or_else(|| missing("response id at [1][1]"))?
        .to_string();
    let choices = decode_choices(payload)?;

    let text_query = decode_text_query(payload);
    let related_topics = decode_related_topics(payload);
    flag_unmatched(payload, 2, text_query.is_some() || related_topics.is_some());

    let factuality_queries = decode_factuality_queries(payload);
    let sources = decode_sources(payload, &text);
    flag_unmatched(payload, 3, factuality_queries.is_some() || sources.is_some());

    let images = decode_images(payload);
    if let Some(section) = at(payload, &[4, 0, 4]) {
        if images.is_none() && !section.is_null() {
            debug!(
                target: "bard_client::decoder",
                raw = %section,
                "image section matched no known shape"
            );
        }
    }

    Ok(Answer {
        text,
        conversation_id,
        response_id,
        choice_id: choices[0].id.clone(),
        used_translator: false,
        factuality_queries,
        text_query,
        choices,
        images,
        sources,
        related_topics,
        raw_response: raw.to_string(),
    })
}

fn missing(what: &str) -> BardError {
    BardError::MalformedResponse(format!("missing {what}"))
}

/// Choices at [4]. At least one, each `[id, content, ...]`.
fn decode_choices(payload: &Value) -> BardResult<Vec<Choice>> {
    let entries = payload
        .get(4)
        .and_then(Value::as_array)
        .ok_or_else(|| missing("choice list at [4]"))?;

    let choices = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let id = entry.get(0).and_then(text_of);
            let content = entry.get(1).and_then(text_of);
            match (id, content) {
                (Some(id), Some(content)) => Ok(Choice {
                    id: id.to_string(),
                    content: content.to_string(),
                }),
                _ => Err(BardError::MalformedResponse(format!(
                    "choice {i} is not [id, content, ...]"
                ))),
            }
        })
        .collect::<BardResult<Vec<_>>>()?;

    if choices.is_empty() {
        return Err(missing("at least one choice at [4]"));
    }
    Ok(choices)
}

/// [2][0][0].
fn decode_text_query(payload: &Value) -> Option<String> {
    at(payload, &[2, 0, 0]).and_then(text_of).map(str::to_string)
}

/// [2] as a list of `[topic, count]` pairs.
fn decode_related_topics(payload: &Value) -> Option<Vec<RelatedTopic>> {
    payload
        .get(2)?
        .as_array()?
        .iter()
        .map(|entry| {
            Some(RelatedTopic {
                topic: entry.get(0).and_then(text_of)?.to_string(),
                num: entry.get(1).and_then(int_of)?,
            })
        })
        .collect()
}

/// [3] as a flat list of query strings.
fn decode_factuality_queries(payload: &Value) -> Option<Vec<String>> {
    payload
        .get(3)?
        .as_array()?
        .iter()
        .map(|q| text_of(q).map(str::to_string))
        .collect()
}

/// [3][0] as citation spans `[start, end, [link]]`.
///
/// A malformed entry drops the whole field; an out-of-range span drops only
/// that entry.
fn decode_sources(payload: &Value, text: &str) -> Option<Vec<Source>> {
    let entries = at(payload, &[3, 0])?.as_array()?;

    let mut sources = Vec::with_capacity(entries.len());
    for entry in entries {
        let start = entry.get(0).and_then(int_of)?;
        let end = entry.get(1).and_then(int_of)?;
        let link = entry.get(2).and_then(text_of)?;

        match slice_span(text, start, end) {
            Ok(raw_content) => sources.push(Source {
                // slice_span has checked both are non-negative.
                start_index_in_answer: start as usize,
                end_index_in_answer: end as usize,
                raw_content_in_answer: raw_content,
                source_link: link.to_string(),
            }),
            Err(e) => warn!("dropping source {link}: {e}"),
        }
    }
    Some(sources)
}

/// [4][0][4] as `[[[url]], [[article_url]], "[label]"]` entries.
fn decode_images(payload: &Value) -> Option<Vec<Image>> {
    at(payload, &[4, 0, 4])?
        .as_array()?
        .iter()
        .map(|entry| {
            let image_url = at(entry, &[0, 0, 0]).and_then(text_of)?;
            let details_link = at(entry, &[1, 0, 0]).and_then(text_of)?;
            let marker = entry.get(2).and_then(text_of)?;
            if !is_bracketed(marker) {
                return None;
            }
            Some(Image {
                image_url: image_url.to_string(),
                image_marker: marker.to_string(),
                details_link: details_link.to_string(),
            })
        })
        .collect()
}

fn is_bracketed(marker: &str) -> bool {
    marker.chars().count() >= 2 && marker.starts_with('[') && marker.ends_with(']')
}

/// `text[start..end]` in UTF-16 code units, the indexing the service uses.
///
/// `InvalidSpan` unless `0 <= start <= end <= len` and both ends fall on a
/// character boundary.
pub fn slice_span(text: &str, start: i64, end: i64) -> BardResult<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let len = units.len();
    let invalid = || BardError::InvalidSpan { start, end, len };
    if start < 0 || start > end || end as u64 > len as u64 {
        return Err(invalid());
    }
    // A span cutting a surrogate pair leaves an unpaired half behind.
    String::from_utf16(&units[start as usize..end as usize]).map_err(|_| invalid())
}

/// Sections 2 and 3 have two known shapes; log when a present section fits neither.
fn flag_unmatched(payload: &Value, index: usize, matched: bool) {
    match payload.get(index) {
        Some(section) if !matched && !section.is_null() => debug!(
            target: "bard_client::decoder",
            section = index,
            raw = %section,
            "payload section matched no known shape"
        ),
        _ => {}
    }
}

/// Walk nested arrays by index.
fn at<'a>(value: &'a Value, path: &[usize]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, &i| v.get(i))
}

/// A string, or a string wrapped in any number of single-element arrays.
fn text_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Array(items) if items.len() == 1 => text_of(&items[0]),
        _ => None,
    }
}

/// An integer, a numeric string, or either wrapped in single-element arrays.
fn int_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(items) if items.len() == 1 => int_of(&items[0]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEXT: &str = "Joe Biden is the current president. [Image of White House]";

    /// Wrap a payload the way the service frames it.
    fn wire(payload: &Value) -> String {
        let envelope = json!([["wrb.fr", null, payload.to_string()]]).to_string();
        format!(
            ")]}}'\n\n{}\n{}\n25\n[[\"di\",59],[\"af.httprm\",58,\"-1\",1]]\n",
            envelope.len(),
            envelope
        )
    }

    fn image_entry(n: u32, marker: &str) -> Value {
        json!([
            [[format!("https://img.example/{n}.jpg")]],
            [[format!("https://article.example/{n}")]],
            marker
        ])
    }

    fn full_payload() -> Value {
        json!([
            [TEXT],
            ["c_abc", "r_def"],
            [["who is the president of the USA", 1]],
            [[[0, 9, ["https://src.example/1"]], [10, 12, ["https://src.example/2"]]]],
            [
                ["rc_1", [TEXT], null, null, [image_entry(1, "[Image of White House]")]],
                ["rc_2", ["Another draft"]]
            ]
        ])
    }

    fn minimal_payload() -> Value {
        json!([[TEXT], ["c_abc", "r_def"], null, null, [["rc_1", [TEXT]]]])
    }

    #[test]
    fn decode_full_payload() {
        let raw = wire(&full_payload());
        let answer = decode(&raw).unwrap();

        assert_eq!(answer.text, TEXT);
        assert_eq!(answer.conversation_id, "c_abc");
        assert_eq!(answer.response_id, "r_def");
        assert_eq!(answer.choice_id, "rc_1");
        assert_eq!(answer.choices.len(), 2);
        assert_eq!(answer.choices[1].content, "Another draft");
        assert_eq!(
            answer.text_query.as_deref(),
            Some("who is the president of the USA")
        );
        assert!(!answer.used_translator);
        assert_eq!(answer.raw_response, raw);

        let topics = answer.related_topics.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].num, 1);

        let images = answer.images.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].image_url, "https://img.example/1.jpg");
        assert_eq!(images[0].details_link, "https://article.example/1");
        assert_eq!(images[0].image_marker, "[Image of White House]");

        let sources = answer.sources.unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].raw_content_in_answer, "Joe Biden");
        assert_eq!(sources[1].raw_content_in_answer, "is");

        // spans here, so not a factuality list
        assert!(answer.factuality_queries.is_none());
    }

    #[test]
    fn decode_is_deterministic() {
        let raw = wire(&full_payload());
        assert_eq!(decode(&raw).unwrap(), decode(&raw).unwrap());
    }

    #[test]
    fn optional_sections_absent() {
        let answer = decode(&wire(&minimal_payload())).unwrap();
        assert!(answer.text_query.is_none());
        assert!(answer.related_topics.is_none());
        assert!(answer.factuality_queries.is_none());
        assert!(answer.sources.is_none());
        assert!(answer.images.is_none());
        assert_eq!(answer.choice_id, "rc_1");
    }

    #[test]
    fn factuality_queries_variant() {
        let mut payload = minimal_payload();
        payload[3] = json!(["is biden president", "who won the 2020 election"]);
        let answer = decode(&wire(&payload)).unwrap();
        assert_eq!(
            answer.factuality_queries.unwrap(),
            vec!["is biden president", "who won the 2020 election"]
        );
        assert!(answer.sources.is_none());
    }

    #[test]
    fn out_of_range_span_drops_only_that_source() {
        let mut payload = full_payload();
        payload[3] = json!([[
            [0, 9, ["https://src.example/ok"]],
            [4, 9999, ["https://src.example/too-long"]],
            [12, 10, ["https://src.example/reversed"]],
            [-1, 3, ["https://src.example/negative"]]
        ]]);
        let answer = decode(&wire(&payload)).unwrap();
        let sources = answer.sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].source_link, "https://src.example/ok");

        let len = answer.text.encode_utf16().count();
        for s in &sources {
            assert!(s.start_index_in_answer <= s.end_index_in_answer);
            assert!(s.end_index_in_answer <= len);
        }
    }

    #[test]
    fn unknown_image_shape_leaves_images_absent() {
        let mut payload = full_payload();
        payload[4][0][4] = json!({"unexpected": "object"});
        let answer = decode(&wire(&payload)).unwrap();
        assert!(answer.images.is_none());
        assert_eq!(answer.choices.len(), 2);

        let mut payload = full_payload();
        payload[4][0][4] = json!([[["no-url-here", 1]], "bare"]);
        assert!(decode(&wire(&payload)).unwrap().images.is_none());
    }

    #[test]
    fn unbracketed_marker_is_rejected() {
        let mut payload = full_payload();
        payload[4][0][4] = json!([image_entry(1, "Image of White House")]);
        assert!(decode(&wire(&payload)).unwrap().images.is_none());
    }

    #[test]
    fn choice_content_may_be_plain_string() {
        let mut payload = minimal_payload();
        payload[4] = json!([["rc_9", "plain content"]]);
        let answer = decode(&wire(&payload)).unwrap();
        assert_eq!(answer.choices[0].content, "plain content");
    }

    #[test]
    fn missing_text_is_malformed() {
        let mut payload = minimal_payload();
        payload[0] = json!(null);
        let err = decode(&wire(&payload)).unwrap_err();
        assert!(matches!(err, BardError::MalformedResponse(_)));
    }

    #[test]
    fn missing_ids_is_malformed() {
        let mut payload = minimal_payload();
        payload[1] = json!(["c_only"]);
        assert!(matches!(
            decode(&wire(&payload)),
            Err(BardError::MalformedResponse(_))
        ));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let mut payload = minimal_payload();
        payload[4] = json!([]);
        assert!(matches!(
            decode(&wire(&payload)),
            Err(BardError::MalformedResponse(_))
        ));

        let payload = json!([[TEXT], ["c", "r"]]);
        assert!(matches!(
            decode(&wire(&payload)),
            Err(BardError::MalformedResponse(_))
        ));
    }

    #[test]
    fn short_stream_is_malformed() {
        let err = decode(")]}'\n\n12\n").unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn null_payload_string_is_malformed() {
        let raw = ")]}'\n\n40\n[[\"wrb.fr\",null,null]]\n";
        assert!(matches!(decode(raw), Err(BardError::MalformedResponse(_))));
    }

    #[test]
    fn crlf_framing_is_accepted() {
        let raw = wire(&minimal_payload()).replace('\n', "\r\n");
        assert_eq!(decode(&raw).unwrap().text, TEXT);
    }

    #[test]
    fn slice_span_counts_utf16_units() {
        assert_eq!(slice_span("héllo wörld", 6, 11).unwrap(), "wörld");
        assert_eq!(slice_span("😀 Joe Biden", 3, 12).unwrap(), "Joe Biden");
        assert_eq!(slice_span("abc", 3, 3).unwrap(), "");
        assert!(matches!(
            slice_span("abc", 2, 4),
            Err(BardError::InvalidSpan {
                start: 2,
                end: 4,
                len: 3
            })
        ));
    }

    #[test]
    fn slice_span_rejects_split_surrogate_pair() {
        assert!(matches!(
            slice_span("😀 Joe", 1, 6),
            Err(BardError::InvalidSpan { len: 6, .. })
        ));
        assert!(slice_span("😀 Joe", 0, 1).is_err());
        assert_eq!(slice_span("😀 Joe", 0, 2).unwrap(), "😀");
    }

    #[test]
    fn source_after_emoji_is_kept() {
        let text = "😀 Joe Biden";
        let payload = json!([
            [text],
            ["c_abc", "r_def"],
            null,
            [[[3, 12, ["https://l"]]]],
            [["rc_1", [text]]]
        ]);
        let sources = decode(&wire(&payload)).unwrap().sources.unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].start_index_in_answer, 3);
        assert_eq!(sources[0].end_index_in_answer, 12);
        assert_eq!(sources[0].raw_content_in_answer, "Joe Biden");
        assert_eq!(sources[0].source_link, "https://l");
    }

    #[test]
    fn text_of_unwraps_singletons() {
        assert_eq!(text_of(&json!([[["x"]]])), Some("x"));
        assert_eq!(text_of(&json!(["x", "y"])), None);
        assert_eq!(int_of(&json!(["7"])), Some(7));
        assert_eq!(int_of(&json!(null)), None);
    }
}
