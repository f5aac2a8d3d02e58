pub mod cursor;
pub mod entry;
pub mod export;
pub mod local;
pub mod remote;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

pub use entry::{JournalEntry, Level};

/// Where sources deliver fully parsed entries.
pub type EntrySink = mpsc::Sender<JournalEntry>;

pub const SINK_CAPACITY: usize = 1024;

/// Anything that produces journal entries and keeps track of its own
/// resume cursor.
#[allow(async_fn_in_trait)]
pub trait EntrySource {
    /// Name used in diagnostics.
    fn label(&self) -> String;

    /// Feeds `sink` until `shutdown` is cancelled, the sink is closed, or
    /// the source gives up.
    async fn run(self, sink: EntrySink, shutdown: CancellationToken) -> Result<()>;
}
