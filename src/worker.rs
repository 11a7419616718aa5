use tokio::io::AsyncWrite;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::client::Transport;
use crate::config::Config;
use crate::error::Error;
use crate::metrics::{BUFFERED_LINES, EMPTY_WINDOWS, EXCHANGES_TOTAL, EXCHANGE_LATENCY};
use crate::models::{Context, GenerateRequest};
use crate::relay::relay;

// fragments in flight between the transport and the relay
const FRAGMENT_BUFFER: usize = 32;

/// Runs one exchange while relaying its fragments to `sink`, and returns once
/// both are done. Relay (output) failures win over the transport error they
/// cause.
pub async fn run_exchange<T, W>(
    transport: &T,
    request: &GenerateRequest,
    sink: &mut W,
) -> Result<Option<Context>, Error>
where
    T: Transport,
    W: AsyncWrite + Unpin,
{
    let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);
    let timer = EXCHANGE_LATENCY.start_timer();

    let (exchanged, relayed) = tokio::join!(transport.exchange(request, tx), relay(rx, sink));

    timer.observe_duration();
    EXCHANGES_TOTAL.inc();

    let fragments = relayed.map_err(Error::Output)?;
    let context = exchanged?;
    tracing::debug!(
        fragments,
        context_len = context.as_ref().map_or(0, Context::len),
        "exchange complete"
    );
    Ok(context)
}

/// Follow-mode scheduler: buffers incoming lines and sends them as one
/// request per buffer window, threading the returned context through.
///
/// Exchanges run strictly one after another. The next window only starts
/// once the previous response has been fully written to the sink.
pub struct BatchWorker<T, W> {
    config: Config,
    transport: T,
    sink: W,
    buffer: Vec<String>,
    context: Option<Context>,
}

impl<T, W> BatchWorker<T, W>
where
    T: Transport,
    W: AsyncWrite + Unpin,
{
    pub fn new(config: Config, transport: T, sink: W) -> Self {
        Self {
            config,
            transport,
            sink,
            buffer: Vec::new(),
            context: None,
        }
    }

    /// Runs until `lines` closes. Hands the sink back when done.
    pub async fn run(mut self, mut lines: mpsc::UnboundedReceiver<String>) -> Result<W, Error> {
        let window = self.config.buffer_window;
        let tick = time::sleep(window);
        tokio::pin!(tick);

        tracing::info!(window = ?window, "batch worker started");

        loop {
            tokio::select! {
                line = lines.recv() => match line {
                    Some(line) => {
                        self.buffer.push(line);
                        BUFFERED_LINES.set(self.buffer.len() as f64);
                    }
                    None => break,
                },
                () = &mut tick => {
                    self.flush().await?;
                    // window restarts once the response has been written out
                    tick.as_mut().reset(Instant::now() + window);
                }
            }
        }

        if !self.buffer.is_empty() {
            if self.config.flush_on_close {
                self.flush().await?;
            } else {
                tracing::debug!(lines = self.buffer.len(), "input closed, dropping unflushed lines");
                self.buffer.clear();
                BUFFERED_LINES.set(0.0);
            }
        }

        tracing::info!("batch worker finished");
        Ok(self.sink)
    }

    async fn flush(&mut self) -> Result<(), Error> {
        if self.buffer.is_empty() {
            EMPTY_WINDOWS.inc();
            tracing::trace!("empty window, nothing to send");
            return Ok(());
        }

        let body = self.buffer.join("\n");
        tracing::debug!(lines = self.buffer.len(), "flushing batch");
        self.buffer.clear();
        BUFFERED_LINES.set(0.0);

        let request = match self.context.take() {
            Some(context) => GenerateRequest::continuation(body, &self.config, context),
            None => GenerateRequest::first(body, &self.config),
        };

        self.context = run_exchange(&self.transport, &request, &mut self.sink).await?;
        Ok(())
    }
}
