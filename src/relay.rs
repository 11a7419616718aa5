use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::metrics::FRAGMENTS_RELAYED;

/// Writes fragments to `sink` in arrival order until the sender side is
/// dropped. Resolves once everything has been written, with the fragment count.
pub async fn relay<W>(mut fragments: mpsc::Receiver<String>, sink: &mut W) -> io::Result<usize>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0;

    while let Some(text) = fragments.recv().await {
        sink.write_all(text.as_bytes()).await?;
        // token by token, so flush every time
        sink.flush().await?;
        FRAGMENTS_RELAYED.inc();
        count += 1;
    }

    Ok(count)
}
