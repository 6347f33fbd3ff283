//! Lazy row and batch streams over `user_data`.
//!
//! A producer thread owns the connection and the cursor and hands rows over a
//! rendezvous channel, so each row is fetched only when the consumer asks for
//! it. Dropping a stream early disconnects the channel: the producer stops,
//! finalizes the cursor, releases the connection and is joined before `drop`
//! returns.
use crate::core::db::{ConnectionScope, DataSource};
use crate::core::{Result, RowscopeError};
use crate::users::{normalize_age, UserRecord, SELECT_USERS_SQL};
use rusqlite::Connection;
use std::iter::FusedIterator;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type ReleaseHook = Box<dyn FnOnce() + Send>;

/// Producer-side handle used to push items to the consumer
pub struct Emitter<T> {
    sender: SyncSender<Result<T>>,
}

impl<T> Emitter<T> {
    /// Hands one item to the consumer, blocking until it is taken.
    /// Returns `false` once the consumer has gone away.
    pub fn emit(&self, item: T) -> bool {
        self.sender.send(Ok(item)).is_ok()
    }
}

/// A lazy, finite, non-restartable sequence of query results
pub struct RowStream<T> {
    receiver: Option<Receiver<Result<T>>>,
    producer: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> RowStream<T> {
    /// Starts a stream whose items are produced by `pump` on its own connection.
    ///
    /// `pump` returns once it has emitted everything or `emit` reports that
    /// the consumer is gone. An error it returns is delivered as the last
    /// item of the stream.
    pub fn spawn<F>(source: &DataSource, pump: F) -> Result<Self>
    where
        F: FnOnce(&Connection, &Emitter<T>) -> Result<()> + Send + 'static,
    {
        Self::spawn_observed(source, None, pump)
    }

    pub(crate) fn spawn_observed<F>(
        source: &DataSource,
        on_release: Option<ReleaseHook>,
        pump: F,
    ) -> Result<Self>
    where
        F: FnOnce(&Connection, &Emitter<T>) -> Result<()> + Send + 'static,
    {
        let (sender, receiver) = sync_channel(0);
        let source = source.clone();

        let producer = thread::Builder::new()
            .name("rowscope-stream".to_string())
            .spawn(move || {
                let scope = match ConnectionScope::open(&source) {
                    Ok(scope) => match on_release {
                        Some(hook) => scope.on_release(hook),
                        None => scope,
                    },
                    Err(err) => {
                        let _ = sender.send(Err(err));
                        return;
                    }
                };

                let emitter = Emitter { sender };
                if let Err(err) = pump(&scope, &emitter) {
                    let _ = emitter.sender.send(Err(err));
                }
                drop(scope);
                debug!("Stream over {} finished", source);
            })?;

        Ok(RowStream {
            receiver: Some(receiver),
            producer: Some(producer),
        })
    }
}

impl<T> RowStream<T> {
    /// Disconnects from the producer and waits for it to release its connection
    fn finish(&mut self) -> Result<()> {
        self.receiver = None;
        match self.producer.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| RowscopeError::Worker("stream producer panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl<T> Iterator for RowStream<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let received = self.receiver.as_ref()?.recv();
        match received {
            Ok(Ok(item)) => Some(Ok(item)),
            Ok(Err(err)) => {
                let _ = self.finish();
                Some(Err(err))
            }
            Err(_) => self.finish().err().map(Err),
        }
    }
}

impl<T> FusedIterator for RowStream<T> {}

impl<T> Drop for RowStream<T> {
    fn drop(&mut self) {
        if let Err(err) = self.finish() {
            warn!("{}", err);
        }
    }
}

fn pump_users(conn: &Connection, emitter: &Emitter<UserRecord>) -> Result<()> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", SELECT_USERS_SQL))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        if !emitter.emit(UserRecord::from_row(row)?) {
            break;
        }
    }
    Ok(())
}

/// Streams every user, one row per advance
pub fn stream_users(source: &DataSource) -> Result<RowStream<UserRecord>> {
    RowStream::spawn(source, pump_users)
}

/// Streams users in batches of at most `batch_size`.
///
/// The last batch may be shorter; an empty table yields no batches at all.
pub fn stream_users_in_batches(
    source: &DataSource,
    batch_size: usize,
) -> Result<RowStream<Vec<UserRecord>>> {
    if batch_size == 0 {
        return Err(RowscopeError::InvalidArgument(
            "batch size must be greater than zero".to_string(),
        ));
    }

    RowStream::spawn(source, move |conn, emitter| {
        let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", SELECT_USERS_SQL))?;
        let mut rows = stmt.query([])?;
        let mut batch = Vec::with_capacity(batch_size);
        while let Some(row) = rows.next()? {
            batch.push(UserRecord::from_row(row)?);
            if batch.len() == batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if !emitter.emit(full) {
                    return Ok(());
                }
            }
        }
        if !batch.is_empty() {
            emitter.emit(batch);
        }
        Ok(())
    })
}

/// Collects users strictly older than `min_age`, one batch at a time
pub fn batch_processing(
    source: &DataSource,
    batch_size: usize,
    min_age: i64,
) -> Result<Vec<UserRecord>> {
    let mut selected = Vec::new();
    for batch in stream_users_in_batches(source, batch_size)? {
        selected.extend(batch?.into_iter().filter(|user| user.age > min_age));
    }
    Ok(selected)
}

/// Streams only the normalized `age` column
pub fn stream_user_ages(source: &DataSource) -> Result<RowStream<i64>> {
    RowStream::spawn(source, |conn, emitter| {
        let mut stmt = conn.prepare("SELECT age FROM user_data ORDER BY rowid")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            if !emitter.emit(normalize_age(row.get_ref(0)?)?) {
                break;
            }
        }
        Ok(())
    })
}

/// Average user age in one pass over the table; `0.0` when it is empty
pub fn average_age(source: &DataSource) -> Result<f64> {
    let mut total: i128 = 0;
    let mut count: u64 = 0;
    for age in stream_user_ages(source)? {
        total += i128::from(age?);
        count += 1;
    }
    if count == 0 {
        return Ok(0.0);
    }
    Ok(total as f64 / count as f64)
}
