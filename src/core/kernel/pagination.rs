use crate::core::errors::ExchangeError;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::debug;

/// Largest `limit` the exchange accepts. Not enforced client-side.
pub const MAX_PAGE_LIMIT: u32 = 100;

pub const BEFORE_HEADER: &str = "CB-BEFORE";
pub const AFTER_HEADER: &str = "CB-AFTER";

/// Opaque pagination token
///
/// `before` cursors walk toward newer records, `after` cursors toward older ones.
/// The value is passed back to the exchange verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Self(token)
    }
}

impl From<i64> for Cursor {
    fn from(token: i64) -> Self {
        Self(token.to_string())
    }
}

impl From<u64> for Cursor {
    fn from(token: u64) -> Self {
        Self(token.to_string())
    }
}

/// `limit` / `before` / `after` query parameters for a list endpoint
///
/// Absent values are omitted from the query. Setting both cursors is allowed
/// and passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u32>,
    pub before: Option<Cursor>,
    pub after: Option<Cursor>,
}

impl PageRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results per page. The exchange rejects values above [`MAX_PAGE_LIMIT`].
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn before(mut self, cursor: impl Into<Cursor>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    pub fn after(mut self, cursor: impl Into<Cursor>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Query pairs in `limit`, `before`, `after` order
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::with_capacity(3);
        if let Some(limit) = self.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(before) = &self.before {
            query.push(("before", before.to_string()));
        }
        if let Some(after) = &self.after {
            query.push(("after", after.to_string()));
        }
        query
    }

    /// Request for the next older page, keeping the limit
    pub fn next_after(&self, cursor: Cursor) -> Self {
        Self {
            limit: self.limit,
            before: None,
            after: Some(cursor),
        }
    }
}

/// One page of a list endpoint in server order
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    items: Vec<T>,
    before: Option<Cursor>,
    after: Option<Cursor>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, before: Option<Cursor>, after: Option<Cursor>) -> Self {
        Self {
            items,
            before,
            after,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Cursor for newer records, `None` when the server sent none
    pub fn before(&self) -> Option<&Cursor> {
        self.before.as_ref()
    }

    /// Cursor for older records, `None` at the end of the data
    pub fn after(&self) -> Option<&Cursor> {
        self.after.as_ref()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn into_parts(self) -> (Vec<T>, Option<Cursor>, Option<Cursor>) {
        (self.items, self.before, self.after)
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Build a page from a raw JSON array body and the response headers
pub fn parse_page<T: DeserializeOwned>(
    body: &[u8],
    headers: &HeaderMap,
) -> Result<Page<T>, ExchangeError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ExchangeError::malformed_page(body, format!("invalid JSON: {}", e)))?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            return Err(ExchangeError::malformed_page(
                body,
                format!("expected a JSON array, got {}", json_kind(&other)),
            ))
        }
    };

    let items = elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            serde_json::from_value(element).map_err(|e| {
                ExchangeError::malformed_page(body, format!("element {}: {}", index, e))
            })
        })
        .collect::<Result<Vec<T>, _>>()?;

    let before = cursor_header(headers, BEFORE_HEADER, body)?;
    let after = cursor_header(headers, AFTER_HEADER, body)?;

    Ok(Page::new(items, before, after))
}

fn cursor_header(
    headers: &HeaderMap,
    name: &str,
    body: &[u8],
) -> Result<Option<Cursor>, ExchangeError> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };

    let token = value.to_str().map_err(|_| {
        ExchangeError::malformed_page(body, format!("{} header is not visible ASCII", name))
    })?;

    let token = token.trim();
    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(Cursor::new(token)))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct PagerState<F> {
    fetch: F,
    next: Option<PageRequest>,
    fetched: usize,
    max_pages: Option<usize>,
}

/// Lazily walk a list endpoint from `first` toward older records
///
/// Each page after the first is requested with the previous page's `after`
/// cursor. The stream ends after `max_pages` pages, when a page carries no
/// `after` cursor, or after yielding the first error. Dropping the stream
/// stops further requests.
pub fn paginate<'a, T, F, Fut>(
    first: PageRequest,
    max_pages: Option<usize>,
    fetch: F,
) -> BoxStream<'a, Result<T, ExchangeError>>
where
    T: Send + 'a,
    F: FnMut(PageRequest) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, ExchangeError>> + Send + 'a,
{
    let state = PagerState {
        fetch,
        next: Some(first),
        fetched: 0,
        max_pages,
    };

    stream::try_unfold(state, |mut state| async move {
        let Some(request) = state.next.take() else {
            return Ok::<_, ExchangeError>(None);
        };
        if state.max_pages.is_some_and(|max| state.fetched >= max) {
            return Ok(None);
        }

        let page = (state.fetch)(request.clone()).await?;
        state.fetched += 1;

        let (items, _, after) = page.into_parts();
        debug!(
            page = state.fetched,
            items = items.len(),
            after = ?after,
            "fetched page"
        );
        state.next = after.map(|cursor| request.next_after(cursor));

        Ok(Some((items, state)))
    })
    .map_ok(|items| stream::iter(items.into_iter().map(Ok)))
    .try_flatten()
    .boxed()
}

/// [`paginate`] that stops requesting pages once `cancel` resolves
///
/// A page request in flight when `cancel` fires is dropped; items already
/// yielded are unaffected.
pub fn paginate_until<'a, T, F, Fut, C>(
    first: PageRequest,
    max_pages: Option<usize>,
    fetch: F,
    cancel: C,
) -> BoxStream<'a, Result<T, ExchangeError>>
where
    T: Send + 'a,
    F: FnMut(PageRequest) -> Fut + Send + 'a,
    Fut: Future<Output = Result<Page<T>, ExchangeError>> + Send + 'a,
    C: Future + Send + 'a,
    C::Output: Send,
{
    paginate(first, max_pages, fetch).take_until(cancel).boxed()
}
