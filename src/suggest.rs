//! AI-backed title suggestions: the smart-search conversation model, the
//! provider client, and the follow-up merge path. The provider is asked to
//! avoid titles the user already has (passed as title+year pairs, never raw
//! ids), but its avoidance is best-effort; results are always re-validated
//! through the dedup resolver before they reach the caller.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::env;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::dedup;
use crate::models::{ContentItem, ContentTypeFilter, FilterSpec, MediaType};
use crate::tmdb::CatalogApi;

const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Error)]
pub enum SuggestError {
    /// Rate/quota exhaustion. Surfaced verbatim for user messaging and
    /// never retried automatically.
    #[error("suggestion quota exhausted: {0}")]
    Quota(String),
    #[error("suggestion provider error: {0}")]
    Provider(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestMode {
    /// Initial smart search: titles similar to the query.
    #[default]
    Similar,
    /// Follow-up within an existing conversation.
    Refine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Append-only message history for one smart-search session; discarded
/// when the user leaves the search surface.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

/// A title the provider proposed. Not yet a catalog entity; it still has
/// to be resolved against the upstream provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedTitle {
    pub title: String,
    #[serde(default)]
    pub year: String,
    pub media_type: MediaType,
}

#[async_trait]
pub trait SuggestApi: Send + Sync {
    async fn suggest(
        &self,
        query: &str,
        mode: SuggestMode,
        history: &[ChatMessage],
        existing: &[(String, String)],
        limit: usize,
    ) -> Result<Vec<SuggestedTitle>, SuggestError>;
}

#[derive(Debug, Clone)]
pub struct SuggestClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl SuggestClient {
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("SUGGEST_API_KEY").ok().filter(|k| !k.is_empty())?;
        let api_url =
            env::var("SUGGEST_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let model = env::var("SUGGEST_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let user_agent = format!("cinescout/{}", env!("CARGO_PKG_VERSION"));
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(60))
            .user_agent(user_agent)
            .build()
            .ok()?;
        Some(Self {
            client,
            api_url,
            api_key,
            model,
        })
    }
}

#[async_trait]
impl SuggestApi for SuggestClient {
    async fn suggest(
        &self,
        query: &str,
        mode: SuggestMode,
        history: &[ChatMessage],
        existing: &[(String, String)],
        limit: usize,
    ) -> Result<Vec<SuggestedTitle>, SuggestError> {
        #[derive(Deserialize)]
        struct ChatResponse {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMessage,
        }
        #[derive(Deserialize)]
        struct ChoiceMessage {
            content: String,
        }

        let mut messages = vec![json!({
            "role": "system",
            "content": system_prompt(mode, existing, limit),
        })];
        for msg in history {
            let role = match msg.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(json!({ "role": role, "content": msg.content }));
        }
        messages.push(json!({ "role": "user", "content": query }));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": 0.7,
        });

        let res = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SuggestError::Provider(format!("request failed: {e}")))?;

        let status = res.status();
        let text = res
            .bytes()
            .await
            .map_err(|e| SuggestError::Provider(format!("reading body failed: {e}")))?;
        let text = String::from_utf8_lossy(&text).into_owned();
        if status.as_u16() == 429 {
            return Err(SuggestError::Quota(text));
        }
        if !status.is_success() {
            return Err(SuggestError::Provider(format!(
                "HTTP error (status {status}): {text}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| SuggestError::Provider(format!("failed to parse response: {e}")))?;
        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .ok_or_else(|| SuggestError::Provider("response had no choices".to_string()))?;

        parse_titles(content)
            .map_err(|e| SuggestError::Provider(format!("unusable suggestion payload: {e}")))
    }
}

fn system_prompt(mode: SuggestMode, existing: &[(String, String)], limit: usize) -> String {
    let intent = match mode {
        SuggestMode::Similar => "movies and series similar to what the user describes",
        SuggestMode::Refine => "further movies and series refining the ongoing conversation",
    };
    let mut prompt = format!(
        "You recommend {intent}. Reply with a JSON array of at most {limit} objects, \
         each {{\"title\": string, \"year\": string, \"media_type\": \"movie\"|\"tv\"}}. \
         No prose outside the JSON."
    );
    if !existing.is_empty() {
        let avoid: Vec<String> = existing
            .iter()
            .map(|(title, year)| format!("{title} ({year})"))
            .collect();
        prompt.push_str(&format!(" Do not repeat any of: {}.", avoid.join(", ")));
    }
    prompt
}

/// Parses the model's reply into titles, tolerating markdown code fences.
fn parse_titles(content: &str) -> Result<Vec<SuggestedTitle>, serde_json::Error> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.strip_suffix("```").unwrap_or(rest))
        .unwrap_or(trimmed);
    serde_json::from_str(trimmed.trim())
}

/// Resolves suggested titles to live catalog entities. Each title is
/// searched in its own media-type namespace; a title+year-matching hit is
/// preferred, the first hit is the fallback, and misses are skipped.
pub async fn resolve_suggestions(
    catalog: &dyn CatalogApi,
    titles: &[SuggestedTitle],
) -> Vec<ContentItem> {
    let mut resolved = Vec::with_capacity(titles.len());
    for suggestion in titles {
        let spec = FilterSpec {
            content_type: match suggestion.media_type {
                MediaType::Movie => ContentTypeFilter::Movie,
                MediaType::Series => ContentTypeFilter::Series,
            },
            ..FilterSpec::default()
        };
        match catalog.search(&suggestion.title, 1, &spec).await {
            Ok(page) => {
                let wanted = dedup::normalize_key(&suggestion.title, &suggestion.year);
                let best = page
                    .results
                    .iter()
                    .find(|item| dedup::item_key(item) == wanted)
                    .or_else(|| page.results.first());
                match best {
                    Some(item) => resolved.push(item.clone()),
                    None => warn!("no catalog match for suggested '{}'", suggestion.title),
                }
            }
            Err(e) => warn!("failed to resolve suggested '{}': {e}", suggestion.title),
        }
    }
    resolved
}

/// Drops resolved suggestions whose title+year key is already known to the
/// caller, then merges the survivors into the existing result set.
pub fn merge_follow_up(
    existing: Vec<ContentItem>,
    resolved: Vec<ContentItem>,
    known: &[(String, String)],
) -> Vec<ContentItem> {
    let known_keys: HashSet<String> = known
        .iter()
        .map(|(title, year)| dedup::normalize_key(title, year))
        .collect();
    let fresh: Vec<ContentItem> = resolved
        .into_iter()
        .filter(|item| !known_keys.contains(&dedup::item_key(item)))
        .collect();
    dedup::merge_unique(existing, fresh)
}

/// Title+year pairs for an existing result set, in the shape the provider
/// expects for its own duplicate avoidance.
pub fn existing_title_pairs(items: &[ContentItem]) -> Vec<(String, String)> {
    items
        .iter()
        .map(|item| {
            (
                item.title().to_string(),
                item.year().unwrap_or("").to_string(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieItem;

    fn movie(id: i64, title: &str, date: &str) -> ContentItem {
        ContentItem::Movie(MovieItem {
            id,
            title: title.to_string(),
            popularity: 0.0,
            vote_average: 0.0,
            vote_count: 0,
            adult: None,
            release_date: Some(date.to_string()),
            overview: String::new(),
        })
    }

    #[test]
    fn parses_a_bare_json_array() {
        let titles = parse_titles(
            r#"[{"title": "Dune", "year": "2021", "media_type": "movie"}]"#,
        )
        .expect("parse");
        assert_eq!(titles.len(), 1);
        assert_eq!(titles[0].title, "Dune");
        assert_eq!(titles[0].media_type, MediaType::Movie);
    }

    #[test]
    fn parses_a_fenced_reply() {
        let content = "```json\n[{\"title\": \"Severance\", \"media_type\": \"tv\"}]\n```";
        let titles = parse_titles(content).expect("parse");
        assert_eq!(titles[0].title, "Severance");
        assert_eq!(titles[0].year, "");
    }

    #[test]
    fn prose_replies_are_an_error_not_a_panic() {
        assert!(parse_titles("Sorry, I can't help with that.").is_err());
    }

    #[test]
    fn merge_follow_up_revalidates_against_known_pairs() {
        let known = vec![("dune".to_string(), "2021".to_string())];
        let resolved = vec![
            movie(10, "Dune", "2021-10-22"),
            movie(11, "Arrival", "2016-11-11"),
        ];
        let merged = merge_follow_up(Vec::new(), resolved, &known);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].title(), "Arrival");
    }

    #[test]
    fn conversation_is_append_only_until_cleared() {
        let mut convo = Conversation::default();
        convo.push_user("space movies");
        convo.push_assistant("[...]");
        assert_eq!(convo.messages().len(), 2);
        assert_eq!(convo.messages()[0].role, Role::User);
        convo.clear();
        assert!(convo.messages().is_empty());
    }

    #[test]
    fn avoid_list_lands_in_the_prompt() {
        let existing = vec![("Dune".to_string(), "2021".to_string())];
        let prompt = system_prompt(SuggestMode::Similar, &existing, 10);
        assert!(prompt.contains("Dune (2021)"));
        assert!(prompt.contains("at most 10"));
    }
}
