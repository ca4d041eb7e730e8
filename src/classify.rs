//! Classification client — turns raw guest text into a structured
//! classification (reply, intent, sentiment, urgency, summary, actions)
//! via an injected LLM provider.
//!
//! Stateless request/response: no retries, no persisted state. Retry
//! policy, if any, belongs to the caller. Every remote failure mode
//! (timeout, transport error, unusable payload) surfaces as
//! `ClassifyError::Unavailable` so the pipelines can degrade instead of
//! aborting the intake.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::ClassifyError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};
use crate::model::{Intent, Sentiment};

/// Temperature for conversational replies.
const RESPONSE_TEMPERATURE: f32 = 0.7;

/// Max tokens for conversational replies.
const RESPONSE_MAX_TOKENS: u32 = 500;

/// Temperature for transcript analysis (kept low — structured output).
const ANALYSIS_TEMPERATURE: f32 = 0.3;

/// Max tokens for transcript analysis.
const ANALYSIS_MAX_TOKENS: u32 = 512;

// ── Value objects ───────────────────────────────────────────────────

/// Contextual hints passed alongside the text being classified.
#[derive(Debug, Clone, Default)]
pub struct ClassifyContext {
    pub hotel_name: Option<String>,
    pub guest_name: Option<String>,
    pub booking_ref: Option<String>,
    /// Earlier messages from the same counterpart, newest first.
    pub prior_context: Option<String>,
    pub language: Option<String>,
}

/// Analytical fields shared by message classification and transcript
/// analysis. Urgency is always within [0, 10] by the time it lands here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub intent: Option<Intent>,
    pub sentiment: Sentiment,
    pub urgency: u8,
    pub summary: String,
    pub actions: Vec<String>,
}

/// Full classification of an inbound message: a guest-facing reply plus
/// the analytical fields.
#[derive(Debug, Clone)]
pub struct Classification {
    pub reply: String,
    pub analysis: Analysis,
}

// ── Client ──────────────────────────────────────────────────────────

/// Classification client over an injected LLM provider.
pub struct ClassifyClient {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl ClassifyClient {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Classify an inbound guest message and generate a reply.
    ///
    /// Fails with `EmptyInput` on blank text and `Unavailable` when the
    /// provider cannot produce a usable response; a usable response must
    /// contain a JSON object with a non-empty `reply`. Analytical fields
    /// are defaulted individually when missing or malformed.
    pub async fn classify(
        &self,
        text: &str,
        context: &ClassifyContext,
    ) -> Result<Classification, ClassifyError> {
        if text.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(build_reply_system_prompt(context)),
            ChatMessage::user(text.to_string()),
        ])
        .with_temperature(RESPONSE_TEMPERATURE)
        .with_max_tokens(RESPONSE_MAX_TOKENS);

        let response = self.complete_bounded(request).await?;
        let object = parse_object(&response.content)
            .ok_or_else(|| ClassifyError::Unavailable("no JSON object in response".into()))?;

        let reply = string_field(&object, "reply");
        if reply.is_empty() {
            return Err(ClassifyError::Unavailable("response missing reply text".into()));
        }

        let classification = Classification {
            reply,
            analysis: analysis_from(&object, None),
        };
        debug!(
            intent = ?classification.analysis.intent,
            urgency = classification.analysis.urgency,
            "Message classified"
        );
        Ok(classification)
    }

    /// Analyze a call transcript: intent, sentiment, urgency, summary,
    /// required actions. No reply is generated.
    ///
    /// A missing intent defaults to `information`; other fields default
    /// individually, matching `classify`.
    pub async fn analyze(
        &self,
        transcript: &str,
        context: &ClassifyContext,
    ) -> Result<Analysis, ClassifyError> {
        if transcript.trim().is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let request = CompletionRequest::new(vec![
            ChatMessage::system(
                "You are an expert at analyzing hotel guest conversations. \
                 Respond with ONLY a JSON object."
                    .to_string(),
            ),
            ChatMessage::user(build_analysis_prompt(transcript, context)),
        ])
        .with_temperature(ANALYSIS_TEMPERATURE)
        .with_max_tokens(ANALYSIS_MAX_TOKENS);

        let response = self.complete_bounded(request).await?;
        let object = parse_object(&response.content)
            .ok_or_else(|| ClassifyError::Unavailable("no JSON object in response".into()))?;

        Ok(analysis_from(&object, Some(Intent::Information)))
    }

    /// Run a completion with the configured deadline.
    async fn complete_bounded(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ClassifyError> {
        match tokio::time::timeout(self.timeout, self.llm.complete(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ClassifyError::Unavailable(e.to_string())),
            Err(_) => Err(ClassifyError::Unavailable(format!(
                "timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_reply_system_prompt(context: &ClassifyContext) -> String {
    let mut prompt = String::with_capacity(768);

    prompt.push_str(&format!(
        "You are an AI receptionist for {}. You are professional, friendly, and helpful. \
         You answer questions about the hotel, handle requests and complaints, and route \
         complex issues to human staff when needed.\n\n",
        context.hotel_name.as_deref().unwrap_or("a hotel"),
    ));

    if let Some(ref name) = context.guest_name {
        prompt.push_str(&format!("Guest name: {name}\n"));
    }
    if let Some(ref booking) = context.booking_ref {
        prompt.push_str(&format!("Current booking: {booking}\n"));
    }
    if let Some(ref prior) = context.prior_context {
        prompt.push_str(&format!("Recent messages from this guest:\n{prior}\n"));
    }
    match context.language {
        Some(ref lang) => prompt.push_str(&format!("Respond in: {lang}\n")),
        None => prompt.push_str("Respond in English\n"),
    }

    prompt.push_str(
        "\nRespond with ONLY a JSON object:\n\
         {\"reply\": \"...\", \"intent\": \"...\", \"sentiment\": \"...\", \
         \"urgency\": 0, \"summary\": \"...\", \"actions\": []}\n\n\
         Rules:\n\
         - \"reply\" is the message sent to the guest. Be concise and always offer to assist further.\n\
         - \"intent\" is one of: booking, modification, cancellation, information, complaint, \
         request, maintenance, housekeeping, concierge\n\
         - \"sentiment\" is one of: positive, neutral, negative\n\
         - \"urgency\" is an integer from 0 to 10\n\
         - \"actions\" lists steps staff should take, or [] if none",
    );

    prompt
}

fn build_analysis_prompt(transcript: &str, context: &ClassifyContext) -> String {
    format!(
        "Analyze this hotel call transcript and extract:\n\
         1. Intent (booking, modification, cancellation, information, complaint, request, \
         maintenance, housekeeping, concierge)\n\
         2. Sentiment (positive, neutral, negative)\n\
         3. Urgency (0-10 scale)\n\
         4. Brief summary\n\
         5. Required actions\n\n\
         Respond with ONLY a JSON object: \
         {{\"intent\": \"...\", \"sentiment\": \"...\", \"urgency\": 0, \
         \"summary\": \"...\", \"actions\": []}}\n\n\
         Transcript: {}\n\
         Hotel: {}",
        transcript,
        context.hotel_name.as_deref().unwrap_or("Unknown"),
    )
}

// ── Response parsing ────────────────────────────────────────────────

/// Extract and parse a JSON object from LLM output.
///
/// Returns `None` when no parseable object is present — the caller treats
/// that as an unusable response, not a crash.
fn parse_object(text: &str) -> Option<Value> {
    let candidate = extract_json_object(text)?;
    serde_json::from_str(&candidate).ok()
}

/// Find the JSON object inside LLM output (handles markdown wrapping and
/// surrounding prose).
fn extract_json_object(text: &str) -> Option<String> {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return Some(trimmed.to_string());
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return Some(after[..end].trim().to_string());
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return Some(inner.to_string());
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return Some(trimmed[start..=end].to_string());
    }

    None
}

/// Build an `Analysis` from a parsed object, defaulting field-by-field.
fn analysis_from(object: &Value, default_intent: Option<Intent>) -> Analysis {
    let intent_raw = string_field(object, "intent");
    let intent = if intent_raw.is_empty() {
        default_intent
    } else {
        Some(Intent::parse(&intent_raw))
    };

    let actions = object["actions"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();

    Analysis {
        intent,
        sentiment: Sentiment::coerce(&string_field(object, "sentiment")),
        urgency: clamp_urgency(&object["urgency"]),
        summary: string_field(object, "summary"),
        actions,
    }
}

fn string_field(object: &Value, key: &str) -> String {
    object[key].as_str().unwrap_or_default().trim().to_string()
}

/// Clamp a raw urgency value into [0, 10]. Non-numeric values count as 0.
fn clamp_urgency(value: &Value) -> u8 {
    let raw = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .unwrap_or(0.0);
    raw.clamp(0.0, 10.0) as u8
}
