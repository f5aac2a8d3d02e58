//! Local journal through libsystemd's `sd_journal` API.

use std::ffi::{CStr, CString};
use std::os::fd::{AsRawFd, RawFd};
use std::os::raw::{c_char, c_int, c_void};
use std::path::Path;
use std::ptr;

use tokio::io::unix::AsyncFd;
use tokio_util::sync::CancellationToken;

use super::cursor::{CursorStore, LOCAL_CURSOR_NAME};
use super::entry::{CURSOR, JournalEntry, REALTIME_TIMESTAMP};
use super::{EntrySink, EntrySource};
use crate::error::{Error, Result};

#[link(name = "systemd")]
unsafe extern "C" {
    fn sd_journal_open(ret: *mut *mut c_void, flags: c_int) -> c_int;
    fn sd_journal_close(j: *mut c_void);
    fn sd_journal_get_fd(j: *mut c_void) -> c_int;
    fn sd_journal_process(j: *mut c_void) -> c_int;
    fn sd_journal_seek_tail(j: *mut c_void) -> c_int;
    fn sd_journal_seek_cursor(j: *mut c_void, cursor: *const c_char) -> c_int;
    fn sd_journal_test_cursor(j: *mut c_void, cursor: *const c_char) -> c_int;
    fn sd_journal_previous(j: *mut c_void) -> c_int;
    fn sd_journal_next(j: *mut c_void) -> c_int;
    fn sd_journal_get_realtime_usec(j: *mut c_void, ret: *mut u64) -> c_int;
    fn sd_journal_get_cursor(j: *mut c_void, cursor: *mut *mut c_char) -> c_int;
    fn sd_journal_restart_data(j: *mut c_void);
    fn sd_journal_enumerate_data(j: *mut c_void, data: *mut *const c_void, length: *mut usize) -> c_int;
}

const SD_JOURNAL_LOCAL_ONLY: c_int = 1;

const SD_JOURNAL_NOP: c_int = 0;
const SD_JOURNAL_APPEND: c_int = 1;
const SD_JOURNAL_INVALIDATE: c_int = 2;

/// Splits one `NAME=value` data item. Items without `=` are skipped.
fn parse_data(bytes: &[u8]) -> Option<(String, String)> {
    let eq = bytes.iter().position(|b| *b == b'=')?;
    Some((
        String::from_utf8_lossy(&bytes[..eq]).into_owned(),
        String::from_utf8_lossy(&bytes[eq + 1..]).into_owned(),
    ))
}

/// Owned `sd_journal` handle.
struct Handle(*mut c_void);

impl Drop for Handle {
    fn drop(&mut self) {
        // SAFETY: the pointer came from a successful sd_journal_open.
        unsafe { sd_journal_close(self.0) }
    }
}

struct JournalFd(RawFd);

impl AsRawFd for JournalFd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

pub struct LocalJournal {
    // Deregistered before the handle closes the descriptor.
    fd: AsyncFd<JournalFd>,
    handle: Handle,
    cursors: CursorStore,
    resumed_from: Option<CString>,
}

impl LocalJournal {
    /// Opens the local journal and positions it after the stored cursor,
    /// or at the tail when there is none. Must be called inside a tokio
    /// runtime.
    pub fn open(cursor_dir: &Path) -> Result<Self> {
        let cursors = CursorStore::open(cursor_dir, LOCAL_CURSOR_NAME);

        let mut j: *mut c_void = ptr::null_mut();
        let rc = unsafe { sd_journal_open(&mut j as *mut *mut c_void, SD_JOURNAL_LOCAL_ONLY) };
        if rc < 0 || j.is_null() {
            return Err(Error::local_journal("sd_journal_open", rc));
        }
        let handle = Handle(j);

        let fd = unsafe { sd_journal_get_fd(handle.0) };
        if fd < 0 {
            return Err(Error::local_journal("sd_journal_get_fd", fd));
        }
        let fd = AsyncFd::new(JournalFd(fd)).map_err(|source| Error::LocalJournal {
            call: "AsyncFd::new",
            source,
        })?;

        let mut journal = Self {
            fd,
            handle,
            cursors,
            resumed_from: None,
        };
        journal.position();
        Ok(journal)
    }

    fn position(&mut self) {
        let j = self.handle.0;
        let stored = self
            .cursors
            .cursor()
            .and_then(|cursor| CString::new(cursor).ok());

        if let Some(cursor) = stored {
            let rc = unsafe { sd_journal_seek_cursor(j, cursor.as_ptr()) };
            if rc >= 0 {
                self.resumed_from = Some(cursor);
                return;
            }
            tracing::warn!(
                error = %std::io::Error::from_raw_os_error(-rc),
                "error seeking to last cursor, following from the tail"
            );
        }

        unsafe {
            sd_journal_seek_tail(j);
            sd_journal_previous(j);
        }
    }

    fn read_entry(&self) -> JournalEntry {
        let j = self.handle.0;
        let mut entry = JournalEntry::new();

        // SAFETY: data returned by enumerate_data stays valid until the
        // next call on the handle; it is copied out right away.
        unsafe {
            sd_journal_restart_data(j);
            let mut data: *const c_void = ptr::null();
            let mut len: usize = 0;
            while sd_journal_enumerate_data(j, &mut data, &mut len) > 0 {
                let bytes = std::slice::from_raw_parts(data as *const u8, len);
                if let Some((name, value)) = parse_data(bytes) {
                    entry.insert(name, value);
                }
            }
        }

        let mut usec = 0u64;
        let rc = unsafe { sd_journal_get_realtime_usec(j, &mut usec as *mut u64) };
        if rc >= 0 {
            entry.insert(REALTIME_TIMESTAMP, usec.to_string());
        }

        entry
    }

    fn current_cursor(&self) -> Option<String> {
        let mut raw: *mut c_char = ptr::null_mut();
        // SAFETY: on success the cursor is a malloc'd string owned by us.
        unsafe {
            if sd_journal_get_cursor(self.handle.0, &mut raw) < 0 || raw.is_null() {
                return None;
            }
            let cursor = CStr::from_ptr(raw).to_string_lossy().into_owned();
            libc::free(raw as *mut c_void);
            Some(cursor)
        }
    }

    /// True when the current entry is the one the stored cursor names.
    fn is_resumed_entry(&mut self) -> bool {
        let Some(cursor) = self.resumed_from.take() else {
            return false;
        };
        unsafe { sd_journal_test_cursor(self.handle.0, cursor.as_ptr()) > 0 }
    }

    /// Sends every entry after the current position. Returns `false` once
    /// the sink is closed.
    async fn drain(&mut self, sink: &EntrySink) -> bool {
        loop {
            let rc = unsafe { sd_journal_next(self.handle.0) };
            if rc < 0 {
                tracing::warn!(
                    error = %std::io::Error::from_raw_os_error(-rc),
                    "error calling sd_journal_next"
                );
                return true;
            }
            if rc == 0 {
                return true;
            }
            if self.is_resumed_entry() {
                continue;
            }

            let mut entry = self.read_entry();
            if let Some(cursor) = self.current_cursor() {
                if let Err(e) = self.cursors.update(&cursor) {
                    tracing::warn!(
                        path = %self.cursors.path().display(),
                        error = %e,
                        "failed to store cursor"
                    );
                }
                entry.insert(CURSOR, cursor);
            }

            if sink.send(entry).await.is_err() {
                return false;
            }
        }
    }
}

impl EntrySource for LocalJournal {
    fn label(&self) -> String {
        LOCAL_CURSOR_NAME.to_string()
    }

    async fn run(mut self, sink: EntrySink, shutdown: CancellationToken) -> Result<()> {
        if !self.drain(&sink).await {
            return Ok(());
        }

        loop {
            let ready = tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                ready = self.fd.readable() => ready,
            };
            match ready {
                Ok(mut guard) => guard.clear_ready(),
                Err(source) => {
                    tracing::error!(error = %source, "error polling journal file descriptor");
                    return Err(Error::LocalJournal {
                        call: "epoll",
                        source,
                    });
                }
            }

            let rc = unsafe { sd_journal_process(self.handle.0) };
            match rc {
                SD_JOURNAL_NOP => {}
                SD_JOURNAL_APPEND | SD_JOURNAL_INVALIDATE => {
                    if !self.drain(&sink).await {
                        return Ok(());
                    }
                }
                rc if rc < 0 => tracing::warn!(
                    error = %std::io::Error::from_raw_os_error(-rc),
                    "error calling sd_journal_process"
                ),
                rc => tracing::warn!(rc, "unexpected return code from sd_journal_process"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_splits_at_first_equals() {
        assert_eq!(
            parse_data(b"MESSAGE=a=b"),
            Some(("MESSAGE".to_string(), "a=b".to_string()))
        );
        assert_eq!(parse_data(b"EMPTY="), Some(("EMPTY".to_string(), String::new())));
    }

    #[test]
    fn data_without_equals_is_skipped() {
        assert_eq!(parse_data(b"GARBAGE"), None);
        assert_eq!(parse_data(b""), None);
    }

    #[test]
    fn data_with_invalid_utf8_is_kept_lossily() {
        let (name, value) = parse_data(b"BLOB=\xff\x00ok").unwrap();
        assert_eq!(name, "BLOB");
        assert_eq!(value, "\u{fffd}\u{0}ok");
    }
}
