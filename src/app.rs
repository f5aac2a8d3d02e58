use anyhow::{Context as _, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use ratatui::backend::Backend;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::display::DisplayEngine;
use crate::journal::local::LocalJournal;
use crate::journal::remote::RemoteClient;
use crate::journal::{EntrySink, EntrySource, SINK_CAPACITY};

/// The configured journal sources, opened but not yet running.
pub struct Sources {
    local: Option<LocalJournal>,
    remotes: Vec<RemoteClient>,
}

impl Sources {
    /// Opens every configured source. Failing to open the local journal is
    /// fatal; remote hosts only connect once running.
    pub fn open(config: &Config) -> Result<Self> {
        let local = if config.local {
            Some(LocalJournal::open(&config.cursor_path).context("Fatal error with local journal")?)
        } else {
            None
        };

        let remotes = config
            .remote_hosts
            .iter()
            .map(|host| {
                RemoteClient::new(host.as_str(), config.port, &config.cursor_path)
                    .with_policy(config.reconnect)
            })
            .collect();

        Ok(Self { local, remotes })
    }

    pub fn count(&self) -> usize {
        usize::from(self.local.is_some()) + self.remotes.len()
    }
}

type SourceTasks = JoinSet<(String, crate::error::Result<()>)>;

fn spawn_source<S>(tasks: &mut SourceTasks, source: S, sink: EntrySink, shutdown: CancellationToken)
where
    S: EntrySource + 'static,
{
    let label = source.label();
    tracing::info!(source = %label, "starting source");
    tasks.spawn_local(async move { (label, source.run(sink, shutdown).await) });
}

fn source_finished(result: Result<(String, crate::error::Result<()>), tokio::task::JoinError>) {
    match result {
        Ok((label, Ok(()))) => tracing::info!(source = %label, "source finished"),
        Ok((label, Err(e))) => tracing::error!(source = %label, error = %e, "source stopped"),
        Err(e) => tracing::error!(error = %e, "source task failed"),
    }
}

enum Action {
    Continue,
    Quit,
}

fn handle_key(key: KeyEvent) -> Action {
    if key.kind != KeyEventKind::Press {
        return Action::Continue;
    }
    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Action::Quit,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Action::Quit,
        _ => Action::Continue,
    }
}

/// Owns the sources and the display, and runs them on the current
/// `LocalSet` until the user quits.
pub struct App<B: Backend> {
    sources: Sources,
    display: DisplayEngine<B>,
}

impl<B: Backend> App<B> {
    pub fn new(sources: Sources, display: DisplayEngine<B>) -> Self {
        Self { sources, display }
    }

    pub async fn run(self) -> Result<()> {
        let Self {
            sources,
            mut display,
        } = self;

        tracing::info!(sources = sources.count(), "starting");
        let (sink, mut entries) = mpsc::channel(SINK_CAPACITY);
        let shutdown = CancellationToken::new();
        let mut tasks = SourceTasks::new();

        if let Some(local) = sources.local {
            spawn_source(&mut tasks, local, sink.clone(), shutdown.clone());
        }
        for remote in sources.remotes {
            spawn_source(&mut tasks, remote, sink.clone(), shutdown.clone());
        }
        drop(sink);

        let mut keys = EventStream::new();
        let result = loop {
            tokio::select! {
                Some(entry) = entries.recv() => {
                    if let Err(e) = display.add_entry(&entry) {
                        break Err(e).context("drawing to terminal");
                    }
                }
                Some(row) = display.next_timeout() => {
                    display.on_timeout(row);
                }
                Some(done) = tasks.join_next() => source_finished(done),
                event = keys.next() => match event {
                    Some(Ok(Event::Key(key))) => {
                        if let Action::Quit = handle_key(key) {
                            break Ok(());
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break Err(e).context("reading terminal events"),
                    None => break Ok(()),
                },
            }
        };

        shutdown.cancel();
        while let Some(done) = tasks.join_next().await {
            source_finished(done);
        }
        result
    }
}
