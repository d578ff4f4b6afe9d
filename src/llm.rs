use crate::error::{RagError, Result};
use crate::prompt::Prompt;
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::io::Write;
use std::pin::Pin;

/// Lazy, finite, non-restartable sequence of text increments
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A chat model that streams its answer
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn stream(&self, prompt: &Prompt) -> Result<TokenStream>;

    fn model_name(&self) -> &str;
}

/// Receives each increment as soon as it arrives
pub trait TokenSink {
    fn on_token(&mut self, token: &str) -> Result<()>;
}

/// Writes increments straight to a writer, flushing after each one
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TokenSink for WriterSink<W> {
    fn on_token(&mut self, token: &str) -> Result<()> {
        self.writer.write_all(token.as_bytes())?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Discards everything
pub struct NullSink;

impl TokenSink for NullSink {
    fn on_token(&mut self, _token: &str) -> Result<()> {
        Ok(())
    }
}

/// Drive a token stream to completion, forwarding every increment to `sink`
/// before polling for the next one. Returns the accumulated text.
pub async fn relay(mut stream: TokenStream, sink: &mut dyn TokenSink) -> Result<String> {
    let mut message = String::new();

    while let Some(token) = stream.next().await {
        let token = token?;
        sink.on_token(&token)?;
        message.push_str(&token);
    }

    Ok(message)
}

/// Map an HTTP-layer failure into a generation error
pub(crate) fn generation_error(context: &str, error: impl std::fmt::Display) -> RagError {
    RagError::Generation(format!("{}: {}", context, error))
}
