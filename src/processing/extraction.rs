//! LLM-based metadata extraction for legal documents.
//!
//! Each document gets one chat-completion call that must return a JSON object with a
//! pinned field set: plain-language summaries, bluebook citation lists, and 5-8 topic
//! tags (plus holding/outcome/issue/reasoning for opinions, impacted agencies for
//! orders). Rate-limit and gateway errors are retried three times with doubling
//! backoff; every other failure surfaces to the payload builder, which substitutes
//! the fallback object and flags the document for reprocessing.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, ReasoningEffort,
    ResponseFormat,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

/// Chat model used for metadata extraction.
pub const EXTRACTION_MODEL: &str = "gpt-5-nano";

/// Completion-token cap applied to every extraction call.
const MAX_COMPLETION_TOKENS: u32 = 2000;

const MAX_ATTEMPTS: u32 = 3;

/// Errors raised by the metadata extractor.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The chat-completion API failed after retries.
    #[error("OpenAI request failed: {0}")]
    Api(#[from] OpenAIError),
    /// The API returned a completion with no content.
    #[error("Empty response from OpenAI API")]
    EmptyResponse,
    /// The completion content was not the expected JSON object.
    #[error("Failed to parse extraction JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// LLM-extracted fields for a Supreme Court opinion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScotusLlmFields {
    /// One-paragraph lay summary of the case and decision.
    #[serde(default)]
    pub plain_language_summary: String,
    /// The Court's holding in one plain-English sentence.
    #[serde(default)]
    pub holding_plain: String,
    /// Who won and what happens next, in simple terms.
    #[serde(default)]
    pub outcome_simple: String,
    /// The central question answered, phrased as a simple question.
    #[serde(default)]
    pub issue_plain: String,
    /// The Court's main reasoning in one lay paragraph.
    #[serde(default)]
    pub reasoning: String,
    /// U.S. Constitution citations in bluebook format.
    #[serde(default)]
    pub constitution_cited: Vec<String>,
    /// U.S.C. citations in bluebook format.
    #[serde(default)]
    pub federal_statutes_cited: Vec<String>,
    /// C.F.R. citations in bluebook format.
    #[serde(default)]
    pub federal_regulations_cited: Vec<String>,
    /// Case citations in bluebook format.
    #[serde(default)]
    pub cases_cited: Vec<String>,
    /// 5-8 topic tags mixing legal concepts and everyday search terms.
    #[serde(default)]
    pub topics_or_policy_areas: Vec<String>,
}

impl ScotusLlmFields {
    /// Placeholder fields used when extraction fails after retries.
    pub fn fallback() -> Self {
        Self {
            plain_language_summary: "Unable to generate summary.".into(),
            holding_plain: "Unable to extract holding.".into(),
            outcome_simple: "Unable to extract outcome.".into(),
            issue_plain: "Unable to extract issue.".into(),
            reasoning: "Unable to extract reasoning.".into(),
            constitution_cited: Vec::new(),
            federal_statutes_cited: Vec::new(),
            federal_regulations_cited: Vec::new(),
            cases_cited: Vec::new(),
            topics_or_policy_areas: vec![
                "supreme court".into(),
                "legal opinion".into(),
                "court decision".into(),
            ],
        }
    }

    fn finalize(mut self) -> Self {
        clip_topics(&mut self.topics_or_policy_areas);
        self
    }

    /// Flatten the fields into a metadata map for payload merging.
    pub fn to_metadata(&self) -> Map<String, Value> {
        value_to_map(serde_json::to_value(self))
    }
}

/// LLM-extracted fields for an Executive Order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EoLlmFields {
    /// Action-oriented lay summary of what the order does and who it affects.
    #[serde(default)]
    pub plain_language_summary: String,
    /// Federal agencies that must act or are affected.
    #[serde(default)]
    pub agencies_impacted: Vec<String>,
    /// U.S. Constitution citations in bluebook format.
    #[serde(default)]
    pub constitution_cited: Vec<String>,
    /// U.S.C. citations in bluebook format.
    #[serde(default)]
    pub federal_statutes_cited: Vec<String>,
    /// C.F.R. citations in bluebook format.
    #[serde(default)]
    pub federal_regulations_cited: Vec<String>,
    /// Case citations in bluebook format (rare in orders).
    #[serde(default)]
    pub cases_cited: Vec<String>,
    /// 5-8 topic tags using terms regular people would search for.
    #[serde(default)]
    pub topics_or_policy_areas: Vec<String>,
}

impl EoLlmFields {
    /// Placeholder fields used when extraction fails after retries.
    pub fn fallback() -> Self {
        Self {
            plain_language_summary: "Unable to generate summary.".into(),
            agencies_impacted: Vec::new(),
            constitution_cited: Vec::new(),
            federal_statutes_cited: Vec::new(),
            federal_regulations_cited: Vec::new(),
            cases_cited: Vec::new(),
            topics_or_policy_areas: vec![
                "executive order".into(),
                "federal policy".into(),
                "presidential action".into(),
            ],
        }
    }

    fn finalize(mut self) -> Self {
        clip_topics(&mut self.topics_or_policy_areas);
        self
    }

    /// Flatten the fields into a metadata map for payload merging.
    pub fn to_metadata(&self) -> Map<String, Value> {
        value_to_map(serde_json::to_value(self))
    }
}

/// Clip topic lists to 8 entries; fewer than 5 degrades retrieval but is kept.
fn clip_topics(topics: &mut Vec<String>) {
    if topics.len() > 8 {
        topics.truncate(8);
    } else if topics.len() < 5 {
        tracing::warn!(
            count = topics.len(),
            "Fewer than 5 topics extracted, may affect retrieval quality"
        );
    }
}

fn value_to_map(value: Result<Value, serde_json::Error>) -> Map<String, Value> {
    match value {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Interface implemented by metadata extraction backends.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Extract structured fields from a Supreme Court opinion, preferring the
    /// Syllabus for holding/outcome/issue when supplied.
    async fn scotus_fields(
        &self,
        text: &str,
        syllabus: Option<&str>,
    ) -> Result<ScotusLlmFields, ExtractionError>;

    /// Extract structured fields from an Executive Order.
    async fn eo_fields(&self, text: &str) -> Result<EoLlmFields, ExtractionError>;
}

/// Metadata extractor backed by the OpenAI chat-completions API.
pub struct OpenAiExtractor {
    client: Client<OpenAIConfig>,
}

impl OpenAiExtractor {
    /// Construct an extractor authenticated with the given API key.
    pub fn new(api_key: &str) -> Self {
        Self {
            client: Client::with_config(OpenAIConfig::new().with_api_key(api_key)),
        }
    }

    async fn complete_json(
        &self,
        system_prompt: String,
        user_prompt: String,
    ) -> Result<String, ExtractionError> {
        let request = CreateChatCompletionRequest {
            model: EXTRACTION_MODEL.to_string(),
            messages: vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(system_prompt),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: ChatCompletionRequestUserMessageContent::Text(user_prompt),
                    name: None,
                }),
            ],
            response_format: Some(ResponseFormat::JsonObject),
            reasoning_effort: Some(ReasoningEffort::Low),
            max_completion_tokens: Some(MAX_COMPLETION_TOKENS),
            ..Default::default()
        };

        let mut attempt: u32 = 0;
        let response = loop {
            attempt += 1;
            match self.client.chat().create(request.clone()).await {
                Ok(response) => break response,
                Err(error) if attempt < MAX_ATTEMPTS && is_retryable(&error) => {
                    let wait = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        wait_s = wait.as_secs(),
                        error = %error,
                        "Retryable extraction error, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(error) => return Err(error.into()),
            }
        };

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ExtractionError::EmptyResponse)?;

        tracing::debug!(length = content.len(), "Received extraction response");
        Ok(content)
    }
}

#[async_trait]
impl MetadataExtractor for OpenAiExtractor {
    async fn scotus_fields(
        &self,
        text: &str,
        syllabus: Option<&str>,
    ) -> Result<ScotusLlmFields, ExtractionError> {
        let (analysis_content, syllabus_instruction) = match syllabus {
            Some(syllabus) => (
                format!(
                    "SYLLABUS (USE THIS FOR HOLDING, OUTCOME, AND ISSUE):\n{syllabus}\n\nFULL OPINION:\n{text}"
                ),
                SCOTUS_SYLLABUS_INSTRUCTION,
            ),
            None => (text.to_string(), ""),
        };

        let system_prompt = format!("{SCOTUS_SYSTEM_PROMPT_HEAD}\n{syllabus_instruction}\n{SCOTUS_SYSTEM_PROMPT_FIELDS}");
        let user_prompt =
            format!("Extract metadata from this Supreme Court opinion:\n\n{analysis_content}");

        let content = self.complete_json(system_prompt, user_prompt).await?;
        let fields: ScotusLlmFields = serde_json::from_str(&content)?;
        Ok(fields.finalize())
    }

    async fn eo_fields(&self, text: &str) -> Result<EoLlmFields, ExtractionError> {
        let user_prompt = format!("Extract metadata from this Executive Order:\n\n{text}");
        let content = self
            .complete_json(EO_SYSTEM_PROMPT.to_string(), user_prompt)
            .await?;
        let fields: EoLlmFields = serde_json::from_str(&content)?;
        Ok(fields.finalize())
    }
}

/// Retry only on rate limiting and upstream gateway errors; everything else surfaces.
fn is_retryable(error: &OpenAIError) -> bool {
    match error {
        OpenAIError::ApiError(api) => {
            let type_is_rate_limit = api
                .r#type
                .as_deref()
                .is_some_and(|kind| kind.contains("rate_limit"));
            let message = &api.message;
            type_is_rate_limit
                || message.contains("Rate limit")
                || message.contains("502")
                || message.contains("503")
                || message.contains("504")
        }
        _ => false,
    }
}

const SCOTUS_SYSTEM_PROMPT_HEAD: &str = "You are a legal analyst extracting metadata from Supreme Court opinions for a RAG system.\nYour task is to extract structured metadata that helps lay users (non-lawyers) understand complex legal documents.\n\nCRITICAL: Use simple, everyday language. Avoid legal jargon at all costs.";

const SCOTUS_SYLLABUS_INSTRUCTION: &str = "IMPORTANT: Extract holding_plain, outcome_simple, and issue_plain ONLY from the SYLLABUS section.\nThe Syllabus is the authoritative summary. Use the full opinion for all other fields.";

const SCOTUS_SYSTEM_PROMPT_FIELDS: &str = r#"Extract the following fields in JSON format:

1. plain_language_summary (string): One paragraph. Start with "In a case about [what the case is about in everyday terms]...", then "the Court decided that [holding in plain English].", and finish with "The Court reasoned that [the key reason]."

2. constitution_cited (array of strings): U.S. Constitution citations in Bluebook format (e.g., "U.S. Const. amend. XIV, sec. 1").

3. federal_statutes_cited (array of strings): U.S.C. citations in Bluebook format (e.g., "42 U.S.C. sec. 1983").

4. federal_regulations_cited (array of strings): C.F.R. citations in Bluebook format (e.g., "14 C.F.R. sec. 91.817").

5. cases_cited (array of strings): Case citations in Bluebook format (e.g., "Brown v. Bd. of Educ., 347 U.S. 483 (1954)").

6. topics_or_policy_areas (array of 5 to 8 strings): Tags that mix legal concepts AND everyday search terms people might use. Good examples: ["abortion rights", "religious freedom", "healthcare law", "federal power"]. Bad examples: ["constitutional law", "statutory interpretation", "judicial review"].

7. holding_plain (string): The Court's decision in ONE sentence using simple language. Instead of "petitioner prevailed" say "the person who sued won". Instead of "reversed and remanded" say "overturned the lower court's decision and sent it back".

8. outcome_simple (string): Who won and what happens next, in simple terms.

9. issue_plain (string): The central question the Court answered, phrased as a simple question starting with "Can...", "Does...", "Must...", or "Is it constitutional to...".

10. reasoning (string): Why the Court decided this way, in ONE paragraph of everyday language. Avoid terms like "petitioner", "respondent", "certiorari", "standing".

FORBIDDEN LEGAL JARGON, use plain alternatives:
- "Petitioner" -> "the person who sued" or "the person who appealed"
- "Respondent" -> "the other party" or "the government"
- "Affirmed" -> "upheld the lower court's decision"
- "Reversed" -> "overturned the lower court's decision"
- "Remanded" -> "sent back to the lower court"
- "Vacated" -> "threw out the lower court's decision"
- "Standing" -> "the right to sue"
- "Certiorari" -> "agreed to hear the case"
- "Per curiam" -> "unsigned opinion"

Remember: Write for someone with NO legal training."#;

const EO_SYSTEM_PROMPT: &str = r#"You are a policy analyst extracting metadata from Presidential Executive Orders for a RAG system.
Your task is to extract structured metadata that helps lay users (non-lawyers, everyday Americans) understand government actions and policies.

CRITICAL: Write for regular people, not policy experts. Focus on real-world impacts.

Extract the following fields in JSON format:

1. plain_language_summary (string): One paragraph (3-4 sentences) explaining what this order does and who it affects. Start with a strong action verb: "Creates...", "Bans...", "Prohibits...", "Requires...", "Mandates...", "Cancels...", "Eliminates...", "Orders [agency] to...", "Speeds up...", "Protects...", "Expands...". Then explain the practical impact, who is affected, and any deadlines.

2. agencies_impacted (array of strings): Federal agencies that must take action or are affected. Use full, recognizable names: "Department of Transportation", "Environmental Protection Agency".

3. constitution_cited (array of strings): U.S. Constitution citations in Bluebook format.

4. federal_statutes_cited (array of strings): U.S.C. citations in Bluebook format.

5. federal_regulations_cited (array of strings): C.F.R. citations in Bluebook format.

6. cases_cited (array of strings): Case citations in Bluebook format (rare in executive orders but possible).

7. topics_or_policy_areas (array of 5 to 8 strings): Tags using terms regular people would search for, such as "immigration", "climate change", "border security", "student loans".

Remember: Emphasize concrete actions and real-world effects, never bureaucratic phrasing."#;
