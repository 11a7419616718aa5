use std::future::Future;

use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::metrics::MALFORMED_FRAGMENTS;
use crate::models::{Context, GenerateFragment, GenerateRequest};

/// One request/response cycle with a generation service.
///
/// Implementations send every fragment's text on `fragments` in the order it
/// was received and return the context of the final fragment. `fragments` is
/// dropped when the call returns, which is how the consumer learns the
/// response is over.
pub trait Transport {
    fn exchange(
        &self,
        request: &GenerateRequest,
        fragments: mpsc::Sender<String>,
    ) -> impl Future<Output = Result<Option<Context>, TransportError>> + Send;
}

// Talks to a single Ollama server
#[derive(Clone, Debug)]
pub struct OllamaClient {
    client: reqwest::Client,
    url: String,
}

impl OllamaClient {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            url: format!("{}/api/generate", base_url.trim_end_matches('/')),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for OllamaClient {
    async fn exchange(
        &self,
        request: &GenerateRequest,
        fragments: mpsc::Sender<String>,
    ) -> Result<Option<Context>, TransportError> {
        tracing::debug!(url = %self.url, model = %request.model, prompt_len = request.prompt.len(), "sending generate request");

        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: self.url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: self.url.clone(),
                status,
            });
        }

        let mut body = response.bytes_stream();
        let mut lines = LineBuffer::default();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(TransportError::Body)?;
            lines.extend(&chunk);

            while let Some(line) = lines.next_line() {
                if let Some(done) = forward(&line, &fragments).await? {
                    return Ok(done);
                }
            }
        }

        // body may end without a trailing newline
        if let Some(line) = lines.finish() {
            if let Some(done) = forward(&line, &fragments).await? {
                return Ok(done);
            }
        }

        tracing::warn!("response ended without a done fragment, context is lost");
        Ok(None)
    }
}

// Decodes one line and hands its text on. Some(..) once the done fragment is seen
async fn forward(
    line: &[u8],
    fragments: &mpsc::Sender<String>,
) -> Result<Option<Option<Context>>, TransportError> {
    let Some(fragment) = decode_line(line) else {
        return Ok(None);
    };

    fragments
        .send(fragment.response)
        .await
        .map_err(|_| TransportError::RelayClosed)?;

    if fragment.done {
        tracing::debug!(
            context_len = fragment.context.as_ref().map_or(0, Context::len),
            "final fragment received"
        );
        return Ok(Some(fragment.context));
    }
    Ok(None)
}

/// Decodes one NDJSON line. Blank lines are skipped; a line that doesn't
/// decode is logged, counted and dropped.
pub fn decode_line(line: &[u8]) -> Option<GenerateFragment> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    match serde_json::from_slice::<GenerateFragment>(line) {
        Ok(fragment) => Some(fragment),
        Err(e) => {
            MALFORMED_FRAGMENTS.inc();
            tracing::warn!(error = %e, "skipping malformed response fragment");
            None
        }
    }
}

/// Splits a chunked byte stream into newline terminated lines, carrying the
/// incomplete tail over to the next chunk.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line without its `\n`, if one is buffered.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let end = self.buffer.iter().position(|&b| b == b'\n')?;
        let mut line: Vec<u8> = self.buffer.drain(..=end).collect();
        line.pop();
        Some(line)
    }

    /// Whatever is left once the stream is over.
    pub fn finish(self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer)
        }
    }
}
