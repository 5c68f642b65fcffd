//! Chat inference (consumed, not built here): `chat(context, system_context,
//! user_query) -> string`. Same HTTP-backend reasoning as `embedding.rs`;
//! grounded in `original_source/constants.h`'s `CHAT_URL`, an
//! OpenAI-compatible `/v1/chat/completions` endpoint.

use crate::config::{
    Config, CONNECT_TIMEOUT_SECONDS, MAX_RETRIES, REQUEST_TIMEOUT_SECONDS, RETRY_DELAY_MS,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

pub struct ChatContext {
    client: reqwest::blocking::Client,
    url: String,
    model_path: String,
}

pub trait ChatBackend: Send + Sync {
    fn create_context(&self) -> Result<ChatContext>;
    fn chat(&self, ctx: &ChatContext, system_context: &str, user_query: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

pub struct HttpChatBackend {
    url: String,
    model_path: String,
}

impl HttpChatBackend {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.chat_url.clone(),
            model_path: config.chat_model_path.clone(),
        }
    }
}

impl ChatBackend for HttpChatBackend {
    fn create_context(&self) -> Result<ChatContext> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .context("failed to build chat HTTP client")?;
        Ok(ChatContext {
            client,
            url: self.url.clone(),
            model_path: self.model_path.clone(),
        })
    }

    fn chat(&self, ctx: &ChatContext, system_context: &str, user_query: &str) -> Result<String> {
        let request = ChatRequest {
            model: &ctx.model_path,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_context,
                },
                ChatMessage {
                    role: "user",
                    content: user_query,
                },
            ],
        };

        let mut attempt = 0;
        loop {
            let result = ctx
                .client
                .post(&ctx.url)
                .json(&request)
                .send()
                .and_then(|r| r.error_for_status())
                .context("chat request failed")
                .and_then(|r| r.json::<ChatResponse>().context("failed to parse chat response"));

            match result {
                Ok(mut response) if !response.choices.is_empty() => {
                    return Ok(response.choices.remove(0).message.content);
                }
                Ok(_) => return Ok(String::new()),
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                    eprintln!("chat: retrying after error: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_configured_model_path() {
        let config = Config::default();
        let backend = HttpChatBackend::from_config(&config);
        let ctx = backend.create_context().unwrap();
        assert_eq!(ctx.model_path, config.chat_model_path);
        assert_eq!(ctx.url, config.chat_url);
    }
}
