use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::{Error, PartialRead};

/// Reads every line until end of input. Used by one-shot mode.
pub async fn read_all<R>(mut reader: R) -> Result<Vec<String>, PartialRead>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let mut buffer = Vec::new();

    loop {
        match next_line(&mut reader, &mut raw).await {
            Ok(Some(line)) => buffer.push(line),
            Ok(None) => return Ok(buffer),
            Err(source) => {
                return Err(PartialRead {
                    lines: buffer,
                    source,
                });
            }
        }
    }
}

/// Pushes lines onto `tx` as they arrive. The channel closes when this
/// returns, at end of input or on a read error.
pub async fn read_lines<R>(mut reader: R, tx: mpsc::UnboundedSender<String>) -> Result<(), Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut raw = Vec::new();
    let mut count = 0usize;

    while let Some(line) = next_line(&mut reader, &mut raw).await.map_err(Error::Input)? {
        if tx.send(line).is_err() {
            tracing::debug!("line consumer gone, stop reading");
            return Ok(());
        }
        count += 1;
    }

    tracing::debug!(lines = count, "input closed");
    Ok(())
}

// Input is raw text: bytes that aren't UTF-8 are replaced, not rejected
async fn next_line<R>(reader: &mut R, raw: &mut Vec<u8>) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    raw.clear();
    if reader.read_until(b'\n', raw).await? == 0 {
        return Ok(None);
    }

    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
    Ok(Some(String::from_utf8_lossy(&raw[..]).into_owned()))
}
