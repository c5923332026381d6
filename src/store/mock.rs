//! In-memory media index for unit testing.
//!
//! Records every call for later assertion, tracks open write streams, and
//! supports failure injection at each step of a save.
//!
//! # Example
//!
//! ```rust,ignore
//! use image_saver::store::mock::{MockMediaStore, StoreOp};
//!
//! let store = MockMediaStore::new();
//! // ... run a save against it ...
//! store.assert_no_open_writers();
//! assert_eq!(store.visible_records().len(), 1);
//! ```

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{SecondsFormat, Utc};
use tracing::debug;

use super::{
    DEFAULT_COLLECTION, MediaQuery, MediaRecord, MediaStore, MediaValues, RecordHandle,
};
use crate::error::{Result, SaverError};

/// Recorded store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Insert {
        display_name: Option<String>,
        mime_type: Option<String>,
        relative_path: Option<String>,
        is_pending: Option<bool>,
    },
    OpenWriter {
        handle: String,
    },
    CloseWriter {
        handle: String,
        bytes: usize,
    },
    Update {
        handle: String,
        is_pending: Option<bool>,
    },
    Query,
}

/// Failure to inject into the next matching call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// `insert` returns `Ok(None)`.
    InsertRefused,
    /// `insert` fails.
    InsertError(String),
    /// `open_writer` fails.
    OpenWriterError(String),
    /// Writes fail once this many bytes have been accepted.
    WriteFailsAfter(usize),
    /// `update` fails.
    UpdateError(String),
}

/// A record held by the mock.
#[derive(Debug, Clone)]
pub struct MockRecord {
    pub handle: RecordHandle,
    pub display_name: String,
    pub mime_type: String,
    pub relative_path: String,
    pub is_pending: bool,
    pub bytes: Arc<Mutex<Vec<u8>>>,
    pub date_added: String,
}

impl MockRecord {
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<i64, MockRecord>,
    log: Vec<StoreOp>,
    faults: Vec<StoreFault>,
}

/// Mock media index.
#[derive(Clone, Default)]
pub struct MockMediaStore {
    inner: Arc<Mutex<Inner>>,
    open_writers: Arc<AtomicUsize>,
}

impl MockMediaStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a fault for the next call it applies to.
    pub fn inject(&self, fault: StoreFault) {
        self.lock().faults.push(fault);
    }

    fn take_fault(&self, pred: impl Fn(&StoreFault) -> bool) -> Option<StoreFault> {
        let mut inner = self.lock();
        let pos = inner.faults.iter().position(pred)?;
        Some(inner.faults.remove(pos))
    }

    pub fn operations(&self) -> Vec<StoreOp> {
        self.lock().log.clone()
    }

    pub fn records(&self) -> Vec<MockRecord> {
        self.lock().records.values().cloned().collect()
    }

    pub fn visible_records(&self) -> Vec<MockRecord> {
        self.records().into_iter().filter(|r| !r.is_pending).collect()
    }

    pub fn record(&self, handle: &RecordHandle) -> Option<MockRecord> {
        let id = handle.id().ok()?;
        self.lock().records.get(&id).cloned()
    }

    pub fn open_writer_count(&self) -> usize {
        self.open_writers.load(Ordering::SeqCst)
    }

    /// Assert every write stream handed out has been released.
    ///
    /// # Panics
    ///
    /// Panics if any writer is still open.
    pub fn assert_no_open_writers(&self) {
        assert_eq!(self.open_writer_count(), 0, "write stream leaked");
    }

    /// Assert no call mutated the store.
    ///
    /// # Panics
    ///
    /// Panics if any insert, open, or update was recorded.
    pub fn assert_untouched(&self) {
        let log = self.operations();
        assert!(
            log.iter().all(|op| matches!(op, StoreOp::Query)),
            "store was mutated: {log:?}"
        );
    }
}

struct MockWriter {
    handle: String,
    bytes: Arc<Mutex<Vec<u8>>>,
    written: usize,
    fail_after: Option<usize>,
    store: MockMediaStore,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let allowed = match self.fail_after {
            Some(limit) if self.written >= limit => {
                return Err(io::Error::other("simulated write failure"));
            }
            Some(limit) => buf.len().min(limit - self.written),
            None => buf.len(),
        };
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(&buf[..allowed]);
        self.written += allowed;
        Ok(allowed)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for MockWriter {
    fn drop(&mut self) {
        self.store.open_writers.fetch_sub(1, Ordering::SeqCst);
        self.store.lock().log.push(StoreOp::CloseWriter {
            handle: self.handle.clone(),
            bytes: self.written,
        });
    }
}

impl MediaStore for MockMediaStore {
    fn insert(&self, values: &MediaValues) -> Result<Option<RecordHandle>> {
        self.lock().log.push(StoreOp::Insert {
            display_name: values.display_name.clone(),
            mime_type: values.mime_type.clone(),
            relative_path: values.relative_path.clone(),
            is_pending: values.is_pending,
        });

        match self.take_fault(|f| {
            matches!(f, StoreFault::InsertRefused | StoreFault::InsertError(_))
        }) {
            Some(StoreFault::InsertRefused) => return Ok(None),
            Some(StoreFault::InsertError(msg)) => return Err(SaverError::MediaIndex(msg)),
            _ => {}
        }

        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        let handle = RecordHandle::from_id(id);
        inner.records.insert(
            id,
            MockRecord {
                handle: handle.clone(),
                display_name: values.display_name.clone().unwrap_or_default(),
                mime_type: values.mime_type.clone().unwrap_or_default(),
                relative_path: values
                    .relative_path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COLLECTION.to_string()),
                is_pending: values.is_pending.unwrap_or(false),
                bytes: Arc::new(Mutex::new(Vec::new())),
                date_added: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        );
        debug!(%handle, "Mock insert");
        Ok(Some(handle))
    }

    fn open_writer(&self, handle: &RecordHandle) -> Result<Box<dyn Write + Send>> {
        self.lock().log.push(StoreOp::OpenWriter {
            handle: handle.to_string(),
        });
        if let Some(StoreFault::OpenWriterError(msg)) =
            self.take_fault(|f| matches!(f, StoreFault::OpenWriterError(_)))
        {
            return Err(SaverError::Io(io::Error::other(msg)));
        }
        let fail_after = match self.take_fault(|f| matches!(f, StoreFault::WriteFailsAfter(_))) {
            Some(StoreFault::WriteFailsAfter(n)) => Some(n),
            _ => None,
        };

        let record = self.record(handle).ok_or_else(|| SaverError::RecordNotFound {
            handle: handle.to_string(),
        })?;
        record
            .bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        self.open_writers.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockWriter {
            handle: handle.to_string(),
            bytes: record.bytes,
            written: 0,
            fail_after,
            store: self.clone(),
        }))
    }

    fn update(&self, handle: &RecordHandle, values: &MediaValues) -> Result<usize> {
        self.lock().log.push(StoreOp::Update {
            handle: handle.to_string(),
            is_pending: values.is_pending,
        });
        if let Some(StoreFault::UpdateError(msg)) =
            self.take_fault(|f| matches!(f, StoreFault::UpdateError(_)))
        {
            return Err(SaverError::MediaIndex(msg));
        }

        let id = handle.id()?;
        let mut inner = self.lock();
        let Some(record) = inner.records.get_mut(&id) else {
            return Ok(0);
        };
        if let Some(name) = &values.display_name {
            record.display_name.clone_from(name);
        }
        if let Some(mime) = &values.mime_type {
            record.mime_type.clone_from(mime);
        }
        if let Some(pending) = values.is_pending {
            record.is_pending = pending;
        }
        Ok(1)
    }

    fn query(&self, query: &MediaQuery) -> Result<Vec<MediaRecord>> {
        self.lock().log.push(StoreOp::Query);
        Ok(self
            .records()
            .into_iter()
            .filter(|r| query.include_pending || !r.is_pending)
            .map(|r| {
                let size = r.bytes().len() as u64;
                MediaRecord {
                    handle: r.handle,
                    display_name: r.display_name,
                    mime_type: r.mime_type,
                    relative_path: r.relative_path,
                    is_pending: r.is_pending,
                    size,
                    date_added: r.date_added,
                    location: None,
                }
            })
            .collect())
    }
}
