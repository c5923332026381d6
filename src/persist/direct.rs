//! Direct registration into a media index.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use super::{Persister, RecordOptions};
use crate::error::SaveError;
use crate::platform::PlatformCapabilities;
use crate::request::{SaveRequest, SaveResult, SavedImage};
use crate::store::{MediaStore, MediaValues, RecordHandle};

const COPY_BUFFER: usize = 64 * 1024;

/// Inserts a record, streams the source bytes into it, then publishes it.
#[derive(Clone)]
pub struct DirectRegistration {
    store: Arc<dyn MediaStore>,
    options: RecordOptions,
    use_pending_flag: bool,
}

impl DirectRegistration {
    pub fn new(
        store: Arc<dyn MediaStore>,
        options: RecordOptions,
        capabilities: PlatformCapabilities,
    ) -> Self {
        Self {
            store,
            options,
            use_pending_flag: capabilities.uses_pending_media_flag,
        }
    }

    fn initial_values(&self, display_name: &str) -> MediaValues {
        let values = MediaValues::new()
            .display_name(display_name)
            .mime_type(self.options.mime_type.as_str());
        if self.use_pending_flag {
            values
                .relative_path(self.options.collection.as_str())
                .pending(true)
        } else {
            values
        }
    }

    /// Blocking body of a save. Streams are scoped so they are released on
    /// every return path.
    fn write_record(&self, source: &Path, display_name: &str) -> SaveResult {
        let mut input = File::open(source).map_err(|e| {
            warn!(path = %source.display(), error = %e, "Source image unreadable");
            SaveError::InvalidPath
        })?;

        let handle = self
            .store
            .insert(&self.initial_values(display_name))
            .map_err(SaveError::save_failed)?
            .ok_or_else(|| SaveError::save_failed("Failed to create new media store record"))?;
        debug!(%handle, display_name, "Created media record");

        let (bytes, sha256) = {
            let mut output = self
                .store
                .open_writer(&handle)
                .map_err(SaveError::save_failed)?;
            let copied = copy_hashed(&mut input, output.as_mut()).map_err(SaveError::save_failed)?;
            output.flush().map_err(SaveError::save_failed)?;
            copied
        };
        drop(input);
        debug!(%handle, bytes, "Copied image bytes");

        if self.use_pending_flag {
            self.publish(&handle)?;
        }

        Ok(SavedImage::MediaRecord {
            handle: handle.to_string(),
            display_name: display_name.to_string(),
            bytes,
            sha256,
        })
    }

    fn publish(&self, handle: &RecordHandle) -> Result<(), SaveError> {
        let values = MediaValues::new().pending(false);
        let rows = self
            .store
            .update(handle, &values)
            .map_err(SaveError::save_failed)?;
        if rows == 0 {
            return Err(SaveError::save_failed(format!(
                "Media record {handle} disappeared before it could be published"
            )));
        }
        debug!(%handle, "Cleared pending flag");
        Ok(())
    }
}

/// Copy everything from `reader` to `writer`, returning the byte count and
/// the hex SHA-256 of what was written.
fn copy_hashed(reader: &mut dyn Read, writer: &mut dyn Write) -> io::Result<(u64, String)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0_u8; COPY_BUFFER];
    let mut total = 0_u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        hasher.update(&buf[..n]);
        total += n as u64;
    }
    Ok((total, hex::encode(hasher.finalize())))
}

#[async_trait]
impl Persister for DirectRegistration {
    #[instrument(skip(self, request), fields(request_id = %request.id))]
    async fn persist(&self, request: &SaveRequest) -> SaveResult {
        let display_name = request.display_name().ok_or(SaveError::InvalidPath)?;
        let this = self.clone();
        let source = request.source.clone();

        let saved = tokio::task::spawn_blocking(move || this.write_record(&source, &display_name))
            .await
            .map_err(|e| SaveError::save_failed(format!("Save task failed: {e}")))??;

        if let SavedImage::MediaRecord { handle, bytes, .. } = &saved {
            info!(handle, bytes, "Saved image to media index");
        }
        Ok(saved)
    }
}
