//! Generation backends
//!
//! A backend turns a prompt into text. The default speaks the OpenAI chat
//! completions protocol; the command backend delegates to an external CLI.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use tarot::Usage;

use crate::config::{BackendKind, CompletionConfig, GenerationConfig};

/// Appended to every prompt and passed as the stop sequence
pub const STOP_SEQUENCE: &str = "END-OF-TRANSMISSION";

const SYSTEM_MESSAGE: &str = "you are a helpful assistant.";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No API key configured; set generation.api_key or OPENAI_API_KEY")]
    MissingApiKey,

    #[error("Generation request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Generation service returned no choices")]
    EmptyResponse,

    #[error("Failed to execute backend {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Backend {command} exited with status: {status}")]
    Exit { command: String, status: String },
}

/// Text produced by a single generation call
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub id: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub usage: Usage,
    pub text: String,
}

/// Anything that can turn a prompt into a generation
pub trait Generator {
    fn generate(&self, prompt: &str, request: &CompletionConfig) -> Result<Generation, BackendError>;
}

/// Create the backend selected in the configuration
pub fn from_config(config: &GenerationConfig) -> Result<Box<dyn Generator>, BackendError> {
    match config.backend {
        BackendKind::OpenAi => {
            let api_key = config.api_key.clone().ok_or(BackendError::MissingApiKey)?;
            Ok(Box::new(OpenAiBackend::new(&config.base_url, api_key)?))
        }
        BackendKind::Command => Ok(Box::new(CommandBackend::new(&config.command, config.args.clone()))),
    }
}

/// The user message: the prompt followed by the stop sequence
pub fn framed_prompt(prompt: &str) -> String {
    format!("{}\n{}", prompt, STOP_SEQUENCE)
}

// OpenAI-compatible chat completions

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stop: &'a str,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    id: String,
    model: String,
    created: i64,
    #[serde(default)]
    usage: Option<ChatUsage>,
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_request<'a>(user_message: &'a str, request: &'a CompletionConfig) -> ChatRequest<'a> {
    ChatRequest {
        model: &request.model,
        messages: vec![
            ChatMessage {
                role: "system",
                content: SYSTEM_MESSAGE,
            },
            ChatMessage {
                role: "user",
                content: user_message,
            },
        ],
        max_tokens: request.max_tokens,
        n: request.n,
        temperature: request.temperature,
        top_p: request.top_p,
        stop: STOP_SEQUENCE,
    }
}

impl ChatResponse {
    fn into_generation(self) -> Result<Generation, BackendError> {
        if self.choices.is_empty() {
            return Err(BackendError::EmptyResponse);
        }

        let text = self
            .choices
            .iter()
            .map(|choice| choice.message.content.as_deref().unwrap_or("").trim())
            .collect::<Vec<_>>()
            .join("\n");

        let usage = self
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            })
            .unwrap_or_default();

        let created_at = Utc
            .timestamp_opt(self.created, 0)
            .single()
            .unwrap_or_else(Utc::now);

        Ok(Generation {
            id: self.id,
            model: self.model,
            created_at,
            usage,
            text,
        })
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiBackend {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: String) -> Result<Self, BackendError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
        })
    }
}

impl Generator for OpenAiBackend {
    fn generate(&self, prompt: &str, request: &CompletionConfig) -> Result<Generation, BackendError> {
        let user_message = framed_prompt(prompt);
        let body = chat_request(&user_message, request);

        debug!(endpoint = %self.endpoint, model = %request.model, "sending completion request");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<ChatResponse>()?.into_generation()
    }
}

/// An external CLI tool that prints its answer on stdout
#[derive(Debug, Clone)]
pub struct CommandBackend {
    /// The command to run
    pub command: String,

    /// Argument template (use {prompt} as placeholder)
    pub args: Vec<String>,
}

impl CommandBackend {
    pub fn new(command: &str, args: Vec<String>) -> Self {
        Self {
            command: command.to_string(),
            args,
        }
    }
}

impl Generator for CommandBackend {
    fn generate(&self, prompt: &str, request: &CompletionConfig) -> Result<Generation, BackendError> {
        let mut cmd = Command::new(&self.command);

        for arg in &self.args {
            if arg == "{prompt}" {
                cmd.arg(prompt);
            } else {
                cmd.arg(arg);
            }
        }

        debug!(command = %self.command, "running backend command");

        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| BackendError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(BackendError::Exit {
                command: self.command.clone(),
                status: output.status.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();

        Ok(Generation {
            id: Uuid::new_v4().to_string(),
            model: request.model.clone(),
            created_at: Utc::now(),
            usage: Usage::default(),
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_framed_prompt() {
        assert_eq!(framed_prompt("Read the cards."), "Read the cards.\nEND-OF-TRANSMISSION");
    }

    #[test]
    fn test_chat_request_body() {
        let request = CompletionConfig {
            model: "gpt-test".to_string(),
            max_tokens: 2000,
            n: None,
            temperature: Some(0.5),
            top_p: None,
        };
        let message = framed_prompt("Tarot card reading for The Fool.");
        let json = serde_json::to_value(chat_request(&message, &request)).unwrap();

        assert_eq!(json["model"], "gpt-test");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["temperature"], 0.5);
        assert_eq!(json["stop"], STOP_SEQUENCE);
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], SYSTEM_MESSAGE);
        assert_eq!(
            json["messages"][1]["content"],
            "Tarot card reading for The Fool.\nEND-OF-TRANSMISSION"
        );
        assert!(json.get("n").is_none());
        assert!(json.get("top_p").is_none());
    }

    #[test]
    fn test_response_joins_choices() {
        let response: ChatResponse = serde_json::from_str(
            r#"{
                "id": "chatcmpl-444555",
                "object": "chat.completion",
                "created": 1681571451,
                "model": "gpt-test",
                "usage": {"prompt_tokens": 30, "completion_tokens": 200, "total_tokens": 230},
                "choices": [
                    {"index": 0, "message": {"role": "assistant", "content": "  Good things \n"}},
                    {"index": 1, "message": {"role": "assistant", "content": "Bad things"}}
                ]
            }"#,
        )
        .unwrap();

        let generation = response.into_generation().unwrap();
        assert_eq!(generation.id, "chatcmpl-444555");
        assert_eq!(generation.text, "Good things\nBad things");
        assert_eq!(generation.usage.total_tokens, 230);
        assert_eq!(generation.created_at.timestamp(), 1681571451);
    }

    #[test]
    fn test_response_without_choices() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"id": "x", "created": 0, "model": "m", "choices": []}"#).unwrap();
        assert!(matches!(response.into_generation(), Err(BackendError::EmptyResponse)));
    }

    #[test]
    fn test_missing_api_key() {
        let config = GenerationConfig::default();
        assert!(matches!(from_config(&config), Err(BackendError::MissingApiKey)));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_backend() {
        let backend = CommandBackend::new("echo", vec!["reading:".to_string(), "{prompt}".to_string()]);
        let generation = backend
            .generate("The Fool", &CompletionConfig::default())
            .unwrap();

        assert_eq!(generation.text, "reading: The Fool");
        assert_eq!(generation.model, "gpt-4o-mini");
        assert_eq!(generation.usage, Usage::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_backend_failure() {
        let backend = CommandBackend::new("false", Vec::new());
        let err = backend.generate("x", &CompletionConfig::default()).unwrap_err();
        assert!(matches!(err, BackendError::Exit { .. }));

        let backend = CommandBackend::new("/nonexistent/tarobot-backend", Vec::new());
        let err = backend.generate("x", &CompletionConfig::default()).unwrap_err();
        assert!(matches!(err, BackendError::Spawn { .. }));
    }
}
