use serde::{Deserialize, Serialize};
use tracing::error;

use crate::config::Config;

/// OpenAI Chat Completion request for a single word
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

/// The JSON object the model is instructed to emit
#[derive(Debug, Deserialize)]
struct GeneratedRecord {
    english: String,
    phonetic: String,
    sentence: String,
    arabic_sentence: String,
}

/// Generated annotations for one word
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordTranslation {
    pub translation: String,
    pub phonetic: String,
    pub sentence: String,
    #[serde(rename = "arabic_sentence")]
    pub native_sentence: String,
}

impl From<GeneratedRecord> for WordTranslation {
    fn from(record: GeneratedRecord) -> Self {
        Self {
            translation: record.english,
            phonetic: record.phonetic,
            sentence: record.sentence,
            native_sentence: record.arabic_sentence,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("No word provided")]
    EmptyWord,

    #[error("Failed to send request to OpenAI API: {0}")]
    Request(#[from] reqwest::Error),

    #[error("OpenAI API error ({status}): {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to parse OpenAI response: {0}")]
    InvalidResponse(reqwest::Error),

    #[error("OpenAI response contained no choices")]
    NoChoices,

    #[error("Model output is not a valid translation record: {0}")]
    Malformed(#[from] serde_json::Error),
}

const SYSTEM_PROMPT: &str = r#"You are a translator. Respond ONLY with valid JSON in this exact format: {"english": "word", "phonetic": "pronunciation", "sentence": "example sentence", "arabic_sentence": "arabic example sentence"}. No other text."#;

const MAX_TOKENS: u32 = 200;
const TEMPERATURE: f32 = 0.3;

/// Build the user prompt for one word
fn build_user_prompt(word: &str) -> String {
    format!(
        "For the Arabic word '{}', provide: 1) English translation (one word), \
         2) phonetic transliteration, 3) one simple example sentence using the word in English, \
         4) the same example sentence in Arabic.",
        word
    )
}

/// Parse the model's message content into a translation record
fn parse_generated(content: &str) -> Result<WordTranslation, TranslationError> {
    let record: GeneratedRecord = serde_json::from_str(content.trim())?;
    Ok(record.into())
}

/// Client for the chat completion endpoint. Build once at startup and share.
#[derive(Debug, Clone)]
pub struct Translator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl Translator {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Ask the model for a translation, transliteration and example sentences.
    ///
    /// One request, no retries. Empty input fails before anything is sent.
    pub async fn translate(&self, word: &str) -> Result<WordTranslation, TranslationError> {
        let word = word.trim();
        if word.is_empty() {
            return Err(TranslationError::EmptyWord);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: build_user_prompt(word),
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            error!("Translation error for '{}': {} {}", word, status, body);
            return Err(TranslationError::Api { status, body });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(TranslationError::InvalidResponse)?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(TranslationError::NoChoices)?;

        parse_generated(&content).inspect_err(|e| {
            error!("Translation error for '{}': {}", word, e);
        })
    }
}
