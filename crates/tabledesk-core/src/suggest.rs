//! Similarity suggestions for new alias names.
//!
//! The engine builds a prompt, hands it to a [`SuggestionService`] and pulls a
//! ranked list out of whatever free text comes back. Matching quality is the
//! service's business; parsing here is deliberately lenient.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::error::{Result, ValidationError};

/// Number of suggestions returned when the caller does not ask for a count.
pub const DEFAULT_TOP_N: usize = 3;

/// An existing alias group offered for comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CandidateRepr")]
pub struct Candidate {
    /// Group id, carried as text.
    pub id: String,
    /// Representative name.
    pub name: String,
}

impl Candidate {
    /// Create a candidate.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ids arrive as numbers or strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum IdRepr {
    Int(i64),
    Text(String),
}

impl From<IdRepr> for String {
    fn from(id: IdRepr) -> Self {
        match id {
            IdRepr::Int(i) => i.to_string(),
            IdRepr::Text(s) => s,
        }
    }
}

/// Candidates are accepted as `[id, name]` pairs or `{id, name}` objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateRepr {
    Pair(IdRepr, String),
    Object { id: IdRepr, name: String },
}

impl From<CandidateRepr> for Candidate {
    fn from(repr: CandidateRepr) -> Self {
        match repr {
            CandidateRepr::Pair(id, name) | CandidateRepr::Object { id, name } => {
                Candidate::new(id, name)
            }
        }
    }
}

/// A ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Candidate group id.
    pub id: String,
    /// Candidate name as reported by the service.
    pub name: String,
    /// Similarity in `[0, 1]`.
    pub similarity: f64,
}

/// Text-completion collaborator used to rank candidates.
#[async_trait]
pub trait SuggestionService: Send + Sync {
    /// Complete a prompt. Transport failures map to [`crate::Error::Upstream`].
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Build the ranking prompt for `new_name`.
pub fn build_prompt(new_name: &str, candidates: &[Candidate], top_n: usize) -> String {
    let listing = serde_json::to_string(candidates).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You compare names of the same kind of entity.\n\
         New name: {new_name:?}\n\
         Existing names as JSON: {listing}\n\
         Pick up to {top_n} existing names most similar to the new name. \
         Answer only with a JSON array of objects with the fields \
         \"id\", \"name\" and \"similarity\" (a number from 0 to 1), \
         most similar first. Do not add any other text."
    )
}

/// End of the balanced `[...]` span starting at `start`, honoring JSON strings.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'[' | b'{' => depth += 1,
            b']' | b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Whether the array at `start` opens with an object.
fn opens_object_array(bytes: &[u8], start: usize) -> bool {
    bytes[start + 1..]
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'{')
}

fn text_of(value: Option<&Json>) -> Option<String> {
    match value? {
        Json::String(s) => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn similarity_of(value: Option<&Json>) -> f64 {
    let raw = match value {
        Some(Json::Number(n)) => n.as_f64(),
        Some(Json::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(f) if f.is_finite() => f.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn suggestion_of(item: &Json) -> Option<Suggestion> {
    let object = item.as_object()?;
    Some(Suggestion {
        id: text_of(object.get("id"))?,
        name: text_of(object.get("name")).unwrap_or_default(),
        similarity: similarity_of(object.get("similarity")),
    })
}

/// Pull up to `top_n` suggestions out of free text.
///
/// The first balanced `[ { ... } ]` span that parses as a JSON array wins.
/// Items without an id are dropped, similarity is clamped to `[0, 1]` and the
/// list is ordered by descending similarity. Unparseable text yields an empty
/// list.
pub fn extract_suggestions(text: &str, top_n: usize) -> Vec<Suggestion> {
    let bytes = text.as_bytes();

    for start in (0..bytes.len()).filter(|&i| bytes[i] == b'[') {
        if !opens_object_array(bytes, start) {
            continue;
        }
        let Some(end) = balanced_end(bytes, start) else {
            continue;
        };
        let Ok(items) = serde_json::from_str::<Vec<Json>>(&text[start..=end]) else {
            continue;
        };

        let mut suggestions: Vec<Suggestion> = items.iter().filter_map(suggestion_of).collect();
        suggestions.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        suggestions.truncate(top_n);
        return suggestions;
    }

    debug!(len = text.len(), "No suggestion array in completion");
    Vec::new()
}

/// Rank `candidates` against `new_name` through the service.
pub async fn suggest(
    service: &dyn SuggestionService,
    new_name: &str,
    candidates: &[Candidate],
    top_n: usize,
) -> Result<Vec<Suggestion>> {
    let new_name = new_name.trim();
    if new_name.is_empty() {
        return Err(ValidationError::MissingRequiredField("new_name".to_string()).into());
    }
    if candidates.is_empty() {
        return Err(ValidationError::MissingRequiredField("existing_names".to_string()).into());
    }
    if top_n == 0 {
        return Ok(Vec::new());
    }

    let prompt = build_prompt(new_name, candidates, top_n);
    let completion = service.complete(&prompt).await?;
    let suggestions = extract_suggestions(&completion, top_n);
    if suggestions.is_empty() {
        warn!(new_name, "Suggestion service returned no usable ranking");
    }
    Ok(suggestions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    struct Canned {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SuggestionService for Canned {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(Error::Upstream)
        }
    }

    fn candidates() -> Vec<Candidate> {
        vec![Candidate::new("1", "steel bolt"), Candidate::new("2", "hex nut")]
    }

    #[test]
    fn test_extract_from_surrounding_text() {
        let text = r#"Sure! Here you go:
            [{"id": 2, "name": "hex nut", "similarity": 0.4},
             {"id": "1", "name": "steel bolt", "similarity": 0.9}]
            Hope this helps."#;
        let suggestions = extract_suggestions(text, 3);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].id, "1");
        assert_eq!(suggestions[1].id, "2");
    }

    #[test]
    fn test_extract_clamps_and_truncates() {
        let text = r#"[{"id":1,"name":"a","similarity":1.7},
                       {"id":2,"name":"b","similarity":-3},
                       {"id":3,"name":"c","similarity":"0.5"},
                       {"name":"no id","similarity":0.99}]"#;
        let suggestions = extract_suggestions(text, 2);
        assert_eq!(suggestions.len(), 2);
        assert_eq!(suggestions[0].similarity, 1.0);
        assert_eq!(suggestions[1].id, "3");
        assert_eq!(suggestions[1].similarity, 0.5);
    }

    #[test]
    fn test_extract_skips_unparseable_spans() {
        let text = r#"[1, 2] then [{oops}] finally [{"id": 7, "name": "x ] y", "similarity": 0.3}]"#;
        let suggestions = extract_suggestions(text, 3);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "x ] y");
    }

    #[test]
    fn test_extract_without_array() {
        assert!(extract_suggestions("I cannot help with that.", 3).is_empty());
        assert!(extract_suggestions("[{\"id\": 1", 3).is_empty());
    }

    #[test]
    fn test_candidate_accepts_pairs_and_objects() {
        let parsed: Vec<Candidate> =
            serde_json::from_str(r#"[[1, "bolt"], {"id": "2", "name": "nut"}]"#).unwrap();
        assert_eq!(parsed, vec![Candidate::new("1", "bolt"), Candidate::new("2", "nut")]);
    }

    #[test]
    fn test_prompt_mentions_inputs() {
        let prompt = build_prompt("bolt M8", &candidates(), 3);
        assert!(prompt.contains("\"bolt M8\""));
        assert!(prompt.contains("steel bolt"));
        assert!(prompt.contains("up to 3"));
    }

    #[tokio::test]
    async fn test_suggest_ranks_reply() {
        let service = Canned::ok(r#"[{"id":"2","name":"hex nut","similarity":0.2},{"id":"1","name":"steel bolt","similarity":0.8}]"#);
        let suggestions = suggest(&service, " bolt ", &candidates(), 1).await.unwrap();
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].name, "steel bolt");
        assert!(service.prompts.lock().unwrap()[0].contains("\"bolt\""));
    }

    #[tokio::test]
    async fn test_suggest_propagates_upstream_failure() {
        let service = Canned {
            reply: Err("connection refused".to_string()),
            prompts: Mutex::new(Vec::new()),
        };
        assert!(matches!(
            suggest(&service, "bolt", &candidates(), 3).await,
            Err(Error::Upstream(_))
        ));
    }

    #[tokio::test]
    async fn test_suggest_validates_input() {
        let service = Canned::ok("[]");
        assert!(matches!(
            suggest(&service, "  ", &candidates(), 3).await,
            Err(Error::Validation(ValidationError::MissingRequiredField(_)))
        ));
        assert!(matches!(
            suggest(&service, "bolt", &[], 3).await,
            Err(Error::Validation(ValidationError::MissingRequiredField(field)))
                if field == "existing_names"
        ));
        assert!(suggest(&service, "bolt", &candidates(), 0).await.unwrap().is_empty());
        assert!(service.prompts.lock().unwrap().is_empty());
    }
}
