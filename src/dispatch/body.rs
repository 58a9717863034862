//! Request body staging.
//!
//! # Strategies
//! - Environment (default): the body travels in `REQBODY`, stdin is empty.
//!   Bounded by the platform's environment size and unable to carry NUL.
//! - Spool: the body is written to an anonymous file in the configured
//!   directory, rewound, and becomes the handler's stdin. Meant for a
//!   memory-backed filesystem such as `/dev/shm`.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::dispatch::exec::BODY_ENV;
use crate::dispatch::DispatchError;
use crate::resilience::BoundedRetry;

const SPOOL_WRITE_ATTEMPTS: u32 = 5;
const SPOOL_RETRY_BASE_MS: u64 = 10;
const SPOOL_RETRY_MAX_MS: u64 = 200;

/// A request body prepared for the handler.
#[derive(Debug)]
pub enum StagedBody<'a> {
    /// No body; stdin is empty and `REQBODY` is unset.
    Empty,
    /// Body passed through `REQBODY`.
    Environment(&'a [u8]),
    /// Body in an unlinked file positioned at offset 0.
    Spooled(std::fs::File),
}

/// Prepare `body` using the spool directory when one is configured.
pub async fn stage_body<'a>(
    body: &'a [u8],
    spool_dir: Option<&Path>,
) -> Result<StagedBody<'a>, DispatchError> {
    if body.is_empty() {
        return Ok(StagedBody::Empty);
    }

    match spool_dir {
        Some(dir) => spool(body, dir.to_path_buf()).await.map(StagedBody::Spooled),
        None if body.contains(&0) => Err(DispatchError::NulByte(BODY_ENV)),
        None => Ok(StagedBody::Environment(body)),
    }
}

async fn spool(body: &[u8], dir: PathBuf) -> Result<std::fs::File, DispatchError> {
    // O_TMPFILE where available, otherwise create-then-unlink.
    let file = tokio::task::spawn_blocking(move || tempfile::tempfile_in(dir))
        .await
        .map_err(|e| DispatchError::Spool(std::io::Error::other(e)))?
        .map_err(DispatchError::Spool)?;

    let mut file = tokio::fs::File::from_std(file);
    let mut retry = BoundedRetry::new(SPOOL_WRITE_ATTEMPTS, SPOOL_RETRY_BASE_MS, SPOOL_RETRY_MAX_MS);
    let mut written = 0;

    while written < body.len() {
        match file.write(&body[written..]).await {
            Ok(0) => {
                return Err(DispatchError::SpoolStalled {
                    written,
                    total: body.len(),
                })
            }
            Ok(n) => {
                written += n;
                retry.reset();
            }
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
                ) =>
            {
                match retry.next_delay() {
                    Some(delay) => tokio::time::sleep(delay).await,
                    None => return Err(DispatchError::Spool(e)),
                }
            }
            Err(e) => return Err(DispatchError::Spool(e)),
        }
    }

    file.flush().await.map_err(DispatchError::Spool)?;
    file.seek(SeekFrom::Start(0)).await.map_err(DispatchError::Spool)?;

    tracing::trace!(bytes = written, "Body spooled");
    Ok(file.into_std().await)
}
