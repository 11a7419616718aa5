use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::client::Transport;
use crate::config::Config;
use crate::error::Error;
use crate::models::GenerateRequest;
use crate::stdin::{read_all, read_lines};
use crate::worker::{BatchWorker, run_exchange};

/// Reads the whole input, sends it as a single request and relays the answer.
pub async fn oneshot<R, W, T>(
    config: &Config,
    input: R,
    mut output: W,
    transport: &T,
) -> Result<W, Error>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    T: Transport,
{
    let lines = read_all(input).await?;
    tracing::debug!(lines = lines.len(), "read input");

    if lines.is_empty() {
        tracing::warn!("no input, nothing to send");
        return Ok(output);
    }

    let request = GenerateRequest::first(lines.join("\n"), config);
    run_exchange(transport, &request, &mut output).await?;
    Ok(output)
}

/// Follows the input, batching lines per buffer window until input closes.
///
/// Reader and worker failures both end up in the returned error; whichever
/// side fails first decides the outcome.
pub async fn stream<R, W, T>(
    config: &Config,
    input: R,
    output: W,
    transport: T,
) -> Result<W, Error>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin,
    T: Transport,
{
    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(read_lines(input, line_tx));

    let worker = BatchWorker::new(config.clone(), transport, output);
    match worker.run(line_rx).await {
        // lines closed, so the reader is done or about to be
        Ok(output) => match reader.await {
            Ok(Ok(())) => Ok(output),
            Ok(Err(e)) => Err(e),
            Err(e) => Err(Error::Reader(e)),
        },
        Err(e) => {
            reader.abort();
            Err(e)
        }
    }
}
