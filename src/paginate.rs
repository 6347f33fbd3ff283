//! LIMIT/OFFSET pagination over `user_data`.
use crate::core::db::query::Param;
use crate::core::db::{with_connection, DataSource};
use crate::core::{Result, RowscopeError};
use crate::users::{query_users, UserRecord, SELECT_USERS_SQL};
use rusqlite::Connection;
use std::iter::FusedIterator;
use tracing::debug;

/// Fetches one page of users starting at `offset`.
///
/// Rows are ordered by `rowid` so consecutive pages neither overlap nor skip.
pub fn paginate_users(conn: &Connection, page_size: usize, offset: usize) -> Result<Vec<UserRecord>> {
    query_users(
        conn,
        &format!("{} ORDER BY rowid LIMIT ?1 OFFSET ?2", SELECT_USERS_SQL),
        &[to_param(page_size)?, to_param(offset)?],
    )
}

fn to_param(n: usize) -> Result<Param> {
    i64::try_from(n)
        .map(Param::Integer)
        .map_err(|_| RowscopeError::InvalidArgument(format!("{} does not fit a SQL integer", n)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageState {
    Active { offset: usize },
    Done,
}

/// Drives a page fetcher until it returns an empty page.
///
/// Each call to `next` fetches `page_size` items at the current offset. An
/// empty page, or a fetch error, ends the sequence for good. Meant for a
/// single consumer.
pub struct Paginator<T, F>
where
    F: FnMut(usize, usize) -> Result<Vec<T>>,
{
    fetch: F,
    page_size: usize,
    state: PageState,
}

impl<T, F> Paginator<T, F>
where
    F: FnMut(usize, usize) -> Result<Vec<T>>,
{
    /// `fetch(page_size, offset)` must return at most `page_size` items
    pub fn new(page_size: usize, fetch: F) -> Result<Self> {
        if page_size == 0 {
            return Err(RowscopeError::InvalidArgument(
                "page size must be greater than zero".to_string(),
            ));
        }
        Ok(Paginator {
            fetch,
            page_size,
            state: PageState::Active { offset: 0 },
        })
    }

    /// Offset of the next page, or `None` once exhausted
    pub fn offset(&self) -> Option<usize> {
        match self.state {
            PageState::Active { offset } => Some(offset),
            PageState::Done => None,
        }
    }
}

impl<T, F> Iterator for Paginator<T, F>
where
    F: FnMut(usize, usize) -> Result<Vec<T>>,
{
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = match self.state {
            PageState::Active { offset } => offset,
            PageState::Done => return None,
        };

        match (self.fetch)(self.page_size, offset) {
            Ok(page) if page.is_empty() => {
                debug!("Pagination exhausted at offset {}", offset);
                self.state = PageState::Done;
                None
            }
            Ok(page) => {
                self.state = match offset.checked_add(self.page_size) {
                    Some(offset) => PageState::Active { offset },
                    None => PageState::Done,
                };
                Some(Ok(page))
            }
            Err(err) => {
                self.state = PageState::Done;
                Some(Err(err))
            }
        }
    }
}

impl<T, F> FusedIterator for Paginator<T, F> where F: FnMut(usize, usize) -> Result<Vec<T>> {}

/// Lazily yields pages of users; every page opens its own connection
pub fn lazy_pagination(
    source: &DataSource,
    page_size: usize,
) -> Result<Paginator<UserRecord, impl FnMut(usize, usize) -> Result<Vec<UserRecord>>>> {
    let source = source.clone();
    Paginator::new(page_size, move |limit, offset| {
        with_connection(&source, |conn| paginate_users(conn, limit, offset))
    })
}
