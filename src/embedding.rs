//! Embedding inference (consumed, not built here): `embed(context, batch) ->
//! float[BATCH][D]`. Grounded in `original_source/constants.h`'s
//! `EMBEDDINGS_URL`/timeout constants; the original resolves this
//! interface over HTTP to a local inference server, which is what this
//! repo implements (the model kernels themselves are out of scope here).

use crate::config::{
    Config, CONNECT_TIMEOUT_SECONDS, MAX_RETRIES, REQUEST_TIMEOUT_SECONDS, RETRY_DELAY_MS,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Duration;

/// A prepared embedding context: an HTTP client connected to the
/// embedding backend, plus the model path it was configured for.
pub struct EmbeddingContext {
    client: reqwest::blocking::Client,
    url: String,
    model_path: String,
}

pub trait EmbeddingBackend: Send + Sync {
    fn create_context(&self) -> Result<EmbeddingContext>;
    fn embed_batch(&self, ctx: &EmbeddingContext, batch: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponseItem {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsResponseItem>,
}

pub struct HttpEmbeddingBackend {
    url: String,
    model_path: String,
}

impl HttpEmbeddingBackend {
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.embeddings_url.clone(),
            model_path: config.embeddings_model_path.clone(),
        }
    }
}

impl EmbeddingBackend for HttpEmbeddingBackend {
    fn create_context(&self) -> Result<EmbeddingContext> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECONDS))
            .build()
            .context("failed to build embedding HTTP client")?;
        Ok(EmbeddingContext {
            client,
            url: self.url.clone(),
            model_path: self.model_path.clone(),
        })
    }

    fn embed_batch(&self, ctx: &EmbeddingContext, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &ctx.model_path,
            input: batch,
        };

        let mut attempt = 0;
        loop {
            let result = ctx
                .client
                .post(&ctx.url)
                .json(&request)
                .send()
                .and_then(|r| r.error_for_status())
                .context("embedding request failed")
                .and_then(|r| {
                    r.json::<EmbeddingsResponse>()
                        .context("failed to parse embedding response")
                });

            match result {
                Ok(response) => {
                    let vectors: Vec<Vec<f32>> =
                        response.data.into_iter().map(|d| d.embedding).collect();
                    if vectors.len() != batch.len() {
                        bail!(
                            "embedding backend returned {} vectors for a batch of {}",
                            vectors.len(),
                            batch.len()
                        );
                    }
                    return Ok(vectors);
                }
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    thread::sleep(Duration::from_millis(RETRY_DELAY_MS));
                    eprintln!("embedding: retrying after error: {e}");
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
        let backend = HttpEmbeddingBackend::from_config(&config);
        let ctx = backend.create_context().unwrap();
        assert_eq!(ctx.model_path, config.embeddings_model_path);
        assert_eq!(ctx.url, config.embeddings_url);
    }
}
