//! Search execution and orchestration

use super::models::SearchKeys;
use crate::engines::{RecordStream, Source};
use crate::error::{Error, Result};
use crate::network::Session;
use crate::results::Record;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Search executor that fans every source into one delivery channel
pub struct Search {
    /// Rate-limited HTTP session shared by all sources
    session: Arc<Session>,
    /// Sources queried by this run
    sources: Vec<Source>,
    /// Keys shared read-only with every source
    keys: Arc<SearchKeys>,
    /// Delivery channel capacity
    buffer: usize,
}

impl Search {
    /// Create a new search executor
    pub fn new(session: Arc<Session>, sources: Vec<Source>, keys: SearchKeys) -> Self {
        Self {
            session,
            sources,
            keys: Arc::new(keys),
            buffer: crate::DEFAULT_CHANNEL_BUFFER,
        }
    }

    /// Set the delivery channel capacity
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Start every source and return the delivery channel.
    ///
    /// Must be called from within a Tokio runtime. The channel closes once
    /// every source has finished or `cancel` fires.
    pub fn execute(&self, cancel: CancellationToken) -> Result<mpsc::Receiver<Record>> {
        if self.sources.is_empty() {
            return Err(Error::NoProviders);
        }
        if self.keys.is_empty() {
            return Err(Error::NoKeys);
        }

        let (tx, rx) = mpsc::channel(self.buffer);
        let mut relays = Vec::with_capacity(self.sources.len());

        for source in &self.sources {
            match source.query(self.session.clone(), self.keys.clone()) {
                Ok(stream) => {
                    let name = source.name().to_string();
                    let handle = tokio::spawn(relay(stream, tx.clone(), cancel.clone()));
                    relays.push((name, handle));
                }
                Err(e) => warn!("[{}] not started: {}", source.name(), e),
            }
        }

        info!(
            "Executing search on {} of {} sources",
            relays.len(),
            self.sources.len()
        );
        tokio::spawn(supervise(relays, tx));

        Ok(rx)
    }

    /// Run the search, invoking `callback` for every record in arrival order.
    ///
    /// Returns once the delivery channel closes or `cancel` fires.
    pub async fn execute_with_callback<F>(
        &self,
        cancel: CancellationToken,
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(Record),
    {
        let mut rx = self.execute(cancel.clone())?;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Search cancelled");
                    break;
                }
                record = rx.recv() => match record {
                    Some(record) => callback(record),
                    None => break,
                },
            }
        }
        Ok(())
    }
}

/// Forward one source into the delivery channel, stamping arrival time
async fn relay(
    mut stream: RecordStream,
    tx: mpsc::Sender<Record>,
    cancel: CancellationToken,
) -> usize {
    let mut count = 0;
    loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            record = stream.next() => record,
        };
        let Some(mut record) = record else {
            break;
        };
        record.timestamp = chrono::Utc::now().timestamp();

        tokio::select! {
            _ = cancel.cancelled() => break,
            sent = tx.send(record) => {
                if sent.is_err() {
                    break;
                }
            }
        }
        count += 1;
    }
    count
}

/// Join every relay, then drop the last sender so the channel closes once
async fn supervise(relays: Vec<(String, JoinHandle<usize>)>, tx: mpsc::Sender<Record>) {
    let start = Instant::now();
    let mut total = 0;
    for (name, handle) in relays {
        match handle.await {
            Ok(count) => {
                debug!("[{}] delivered {} records", name, count);
                total += count;
            }
            Err(e) => error!("[{}] relay failed: {}", name, e),
        }
    }
    drop(tx);
    info!("Search finished: {} records in {:?}", total, start.elapsed());
}
