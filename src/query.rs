//! Paginated dataset queries and global search.
//!
//! A [`Query`] is a lazy description of a result set. Nothing is fetched
//! until the results or the response metadata are read; pages are then
//! requested on demand as a [`QueryCursor`] walks through them.
//!
//! Every method that refines a query (filters, slices, options) returns a
//! new `Query` and leaves the receiver as it was.

use crate::{
    client::QuartzBioClient,
    error::{QuartzBioError, QuartzBioResult},
    filter::Filter,
    genomic::GenomicFilter,
    models::QueryResponse,
};
use futures_util::stream::{self, Stream};
use log::debug;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::fmt;
use std::ops::{Bound, RangeBounds};

pub const DEFAULT_PAGE_SIZE: u64 = 100;
pub const MAX_PAGE_SIZE: u64 = 10_000;

/// What a query runs against: the endpoint and its target-specific parameters
pub trait QueryTarget: Clone + fmt::Debug + Send + Sync {
    fn data_path(&self) -> String;

    fn write_params(&self, params: &mut Map<String, Value>);
}

/// Records of one dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetTarget {
    pub dataset_id: String,
    pub genome_build: Option<String>,
    pub fields: Option<Vec<String>>,
}

impl QueryTarget for DatasetTarget {
    fn data_path(&self) -> String {
        format!("/v1/datasets/{}/data", urlencoding::encode(&self.dataset_id))
    }

    fn write_params(&self, params: &mut Map<String, Value>) {
        if let Some(fields) = &self.fields {
            params.insert("fields".to_string(), json!(fields));
        }
        if let Some(build) = &self.genome_build {
            params.insert("genome_build".to_string(), json!(build));
        }
    }
}

/// Search across every dataset and object visible to the caller
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchTarget {
    pub query: Option<String>,
    /// `(entity_type, value)` pairs
    pub entities: Option<Vec<(String, String)>>,
    pub ordering: Option<Vec<String>>,
    pub debug: bool,
}

impl QueryTarget for SearchTarget {
    fn data_path(&self) -> String {
        "/v2/search".to_string()
    }

    fn write_params(&self, params: &mut Map<String, Value>) {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            params.insert("query".to_string(), json!(query));
        }
        if let Some(entities) = &self.entities {
            params.insert("entities".to_string(), json!(entities));
        }
        if let Some(ordering) = &self.ordering {
            params.insert("ordering".to_string(), json!(ordering));
        }
        if self.debug {
            params.insert("debug".to_string(), json!("True"));
        }
    }
}

/// Global search results, paginated like a dataset query
pub type GlobalSearch = Query<SearchTarget>;

/// Active slice of a result set: absolute `[start, stop)`, unbounded when
/// `stop` is `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub stop: Option<u64>,
}

/// Smaller of two optional ceilings, `None` being unbounded
fn min_ceiling(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn negative_index() -> QuartzBioError {
    QuartzBioError::invalid_param("Negative indexing is not supported")
}

/// Turn a range of indexes into `[start, stop)`, rejecting negative bounds
fn slice_bounds<R: RangeBounds<i64>>(range: &R) -> QuartzBioResult<(u64, Option<u64>)> {
    let start = match range.start_bound() {
        Bound::Included(&s) if s < 0 => return Err(negative_index()),
        Bound::Included(&s) => s as u64,
        Bound::Excluded(&s) if s < 0 => return Err(negative_index()),
        Bound::Excluded(&s) => s as u64 + 1,
        Bound::Unbounded => 0,
    };
    let stop = match range.end_bound() {
        Bound::Included(&e) if e < 0 => return Err(negative_index()),
        Bound::Included(&e) => Some(e as u64 + 1),
        Bound::Excluded(&e) if e < 0 => return Err(negative_index()),
        Bound::Excluded(&e) => Some(e as u64),
        Bound::Unbounded => None,
    };

    if stop.map_or(false, |stop| start > stop) {
        return Err(QuartzBioError::invalid_param(format!(
            "Slice start {} is past its stop {}",
            start,
            stop.unwrap_or_default()
        )));
    }
    Ok((start, stop))
}

/// A paginated, lazily executed query
#[derive(Clone)]
pub struct Query<T: QueryTarget = DatasetTarget> {
    client: QuartzBioClient,
    target: T,
    filters: Vec<Filter>,
    extra: Map<String, Value>,
    /// Total number of results returned across all pages, unbounded if `None`
    limit: Option<u64>,
    page_size: u64,
    /// Absolute offset of the buffered page; only `execute` sets it
    page_offset: Option<u64>,
    window: Option<Window>,
    response: Option<QueryResponse>,
}

impl<T: QueryTarget> fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("target", &self.target)
            .field("filters", &self.filters)
            .field("limit", &self.limit)
            .field("page_size", &self.page_size)
            .field("page_offset", &self.page_offset)
            .field("window", &self.window)
            .field("warm", &self.response.is_some())
            .finish()
    }
}

impl Query<DatasetTarget> {
    /// Query the records of a dataset
    pub fn new(client: QuartzBioClient, dataset_id: impl Into<String>) -> Self {
        Self::with_target(
            client,
            DatasetTarget {
                dataset_id: dataset_id.into(),
                genome_build: None,
                fields: None,
            },
        )
    }

    pub fn dataset_id(&self) -> &str {
        &self.target.dataset_id
    }

    pub fn with_genome_build(mut self, genome_build: impl Into<String>) -> Self {
        self.target.genome_build = Some(genome_build.into());
        self.reset();
        self
    }

    /// Only return these fields of each record
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.fields = Some(fields.into_iter().map(Into::into).collect());
        self.reset();
        self
    }

    /// Records overlapping a genomic range
    pub fn range(&self, chromosome: &str, start: u64, stop: u64, exact: bool) -> Self {
        self.filter(GenomicFilter::new(Some(chromosome), Some(start), Some(stop), exact))
    }

    /// Records at a single genomic position
    pub fn position(&self, chromosome: &str, position: u64, exact: bool) -> Self {
        self.filter(GenomicFilter::position(chromosome, position, exact))
    }
}

impl Query<SearchTarget> {
    /// Search across all datasets and objects
    pub fn global_search(client: QuartzBioClient) -> Self {
        Self::with_target(client, SearchTarget::default())
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.target.query = Some(query.into());
        self.reset();
        self
    }

    pub fn with_entities<I, K, V>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.target.entities = Some(
            entities
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self.reset();
        self
    }

    pub fn with_ordering<I, S>(mut self, ordering: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target.ordering = Some(ordering.into_iter().map(Into::into).collect());
        self.reset();
        self
    }

    /// Ask the server to attach debug information to the response
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.target.debug = debug;
        self.reset();
        self
    }
}

impl<T: QueryTarget> Query<T> {
    pub fn with_target(client: QuartzBioClient, target: T) -> Self {
        Self {
            client,
            target,
            filters: Vec::new(),
            extra: Map::new(),
            limit: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_offset: None,
            window: None,
            response: None,
        }
    }

    /// Maximum number of results over all pages
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self.reset();
        self
    }

    /// Number of results requested per page, in `[1, MAX_PAGE_SIZE]`
    pub fn with_page_size(mut self, page_size: u64) -> QuartzBioResult<Self> {
        if page_size == 0 || page_size > MAX_PAGE_SIZE {
            return Err(QuartzBioError::invalid_param(format!(
                "'page_size' parameter must be in range [1, {}], got {}",
                MAX_PAGE_SIZE, page_size
            )));
        }
        self.page_size = page_size;
        self.reset();
        Ok(self)
    }

    /// Extra request parameter sent with every page
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self.reset();
        self
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn page_offset(&self) -> Option<u64> {
        self.page_offset
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn client(&self) -> &QuartzBioClient {
        &self.client
    }

    fn reset(&mut self) {
        self.response = None;
        self.page_offset = None;
    }

    /// Unexecuted copy carrying the target, filters and options forward
    fn fresh(&self) -> Self {
        Self {
            client: self.client.clone(),
            target: self.target.clone(),
            filters: self.filters.clone(),
            extra: self.extra.clone(),
            limit: self.limit,
            page_size: self.page_size,
            page_offset: None,
            window: self.window,
            response: None,
        }
    }

    /// AND a filter onto the query
    pub fn filter(&self, filter: Filter) -> Self {
        let mut q = self.fresh();
        q.filters.push(filter);
        q
    }

    /// AND `field__op` conditions onto the query
    pub fn filter_by<I, K, V>(&self, conditions: I) -> QuartzBioResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        Ok(self.filter(Filter::from_conditions(conditions)?))
    }

    /// Request parameters shared by every page: filters, target parameters
    /// and extra parameters
    pub fn build_params(&self) -> Map<String, Value> {
        let mut params = Map::new();

        let clauses: Vec<Value> = self.filters.iter().flat_map(Filter::to_wire).collect();
        match clauses.len() {
            0 => {}
            1 => {
                params.insert("filters".to_string(), Value::Array(clauses));
            }
            _ => {
                params.insert("filters".to_string(), json!([{ "and": clauses }]));
            }
        }

        self.target.write_params(&mut params);

        for (key, value) in &self.extra {
            params.insert(key.clone(), value.clone());
        }
        params
    }

    /// Page size for a request at `offset`, capped by what is left of the limit
    fn page_limit(&self, offset: u64) -> u64 {
        let consumed = offset.saturating_sub(self.window.map_or(0, |w| w.start));
        let remaining = self.limit.map(|limit| limit.saturating_sub(consumed));
        min_ceiling(Some(self.page_size), remaining).unwrap_or(self.page_size)
    }

    /// Fetch one page starting at the absolute `offset`.
    ///
    /// Always hits the server; the page replaces the buffered one.
    pub async fn execute(&mut self, offset: u64) -> QuartzBioResult<&QueryResponse> {
        let mut params = self.build_params();
        let limit = self.page_limit(offset);
        params.insert("offset".to_string(), json!(offset));
        params.insert("limit".to_string(), json!(limit));

        debug!("executing query. from/limit: {:6}/{}", offset, limit);
        let response: QueryResponse = self
            .client
            .post(&self.target.data_path(), &params)
            .await?;
        debug!(
            "query response took: {} ms, total: {}",
            response.took, response.total
        );

        self.page_offset = Some(offset);
        Ok(&*self.response.insert(response))
    }

    async fn warmup(&mut self, reason: &str) -> QuartzBioResult<()> {
        if self.response.is_none() {
            debug!("warmup ({})", reason);
            let start = self.window.map_or(0, |w| w.start);
            self.execute(start).await?;
        }
        Ok(())
    }

    /// The buffered response, fetching the first page if needed
    pub async fn response(&mut self) -> QuartzBioResult<&QueryResponse> {
        self.warmup("response").await?;
        self.response
            .as_ref()
            .ok_or_else(|| QuartzBioError::InvalidResponse("query returned no response".to_string()))
    }

    pub async fn total(&mut self) -> QuartzBioResult<u64> {
        Ok(self.response().await?.total())
    }

    pub async fn took(&mut self) -> QuartzBioResult<u64> {
        Ok(self.response().await?.took())
    }

    /// Any other response metadata, by key
    pub async fn value(&mut self, key: &str) -> QuartzBioResult<Option<Value>> {
        Ok(self.response().await?.get(key).cloned())
    }

    /// Number of records matching the filters, ignoring the limit
    pub async fn count(&mut self) -> QuartzBioResult<u64> {
        self.total().await
    }

    /// Number of records iteration will yield: `min(limit, count)`, counted
    /// from the start of any active slice
    pub async fn len(&mut self) -> QuartzBioResult<u64> {
        if self.limit == Some(0) {
            return Ok(0);
        }
        self.warmup("len").await?;
        Ok(self.buffered_len())
    }

    pub async fn is_empty(&mut self) -> QuartzBioResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Records left to yield past the window start, from the buffered page
    /// and without fetching
    fn buffered_len(&self) -> u64 {
        let total = self.response.as_ref().map_or(0, |r| r.total);
        let available = total.saturating_sub(self.window.map_or(0, |w| w.start));
        min_ceiling(self.limit, Some(available)).unwrap_or(available)
    }

    /// Fetch the single record at `index`, relative to any active slice
    pub async fn get(&self, index: i64) -> QuartzBioResult<Value> {
        if index < 0 {
            return Err(negative_index());
        }
        let mut key = index as u64;

        if let Some(window) = self.window {
            key += window.start;
            if window.stop.map_or(false, |stop| key >= stop) {
                return Err(QuartzBioError::IndexOutOfRange(index as u64));
            }
        }

        let mut q = self.fresh();
        q.limit = min_ceiling(Some(1), self.limit);
        q.window = Some(Window {
            start: key,
            stop: Some(key + 1),
        });
        if q.limit == Some(0) {
            return Err(QuartzBioError::IndexOutOfRange(index as u64));
        }

        q.execute(key)
            .await?
            .results
            .first()
            .cloned()
            .ok_or(QuartzBioError::IndexOutOfRange(index as u64))
    }

    /// [`Query::get`], decoded into `R`
    pub async fn get_as<R: DeserializeOwned>(&self, index: i64) -> QuartzBioResult<R> {
        Ok(serde_json::from_value(self.get(index).await?)?)
    }

    /// Narrow the query to a range of results.
    ///
    /// Slices compose: on an already sliced query the range is relative to
    /// the active slice and can only narrow it. A range starting past the end
    /// of the active slice gives an empty query.
    pub fn slice<R: RangeBounds<i64>>(&self, range: R) -> QuartzBioResult<Self> {
        let (mut start, mut stop) = slice_bounds(&range)?;

        if let Some(window) = self.window {
            start += window.start;
            stop = min_ceiling(stop.map(|s| window.start + s), window.stop);
            if window.stop.map_or(false, |ws| start >= ws) {
                let mut q = self.fresh();
                q.limit = Some(0);
                q.window = Some(Window {
                    start,
                    stop: Some(start),
                });
                return Ok(q);
            }
        }

        let mut q = self.fresh();
        q.limit = min_ceiling(stop.map(|stop| stop - start), self.limit);
        q.window = Some(Window { start, stop });
        Ok(q)
    }

    /// Start iterating from the beginning of the query (or its slice).
    ///
    /// The first page is always re-fetched, so a query can be iterated again
    /// after a previous cursor was exhausted.
    pub async fn cursor(&mut self) -> QuartzBioResult<QueryCursor<'_, T>> {
        if self.limit != Some(0) {
            let start = self.window.map_or(0, |w| w.start);
            self.execute(start).await?;
        }
        Ok(QueryCursor {
            query: self,
            position: 0,
            buffer_idx: 0,
            exhausted: false,
        })
    }

    /// Fetch every result, page by page
    pub async fn fetch_all(&mut self) -> QuartzBioResult<Vec<Value>> {
        let mut cursor = self.cursor().await?;
        let mut results = Vec::new();
        while let Some(record) = cursor.next().await? {
            results.push(record);
        }
        Ok(results)
    }
}

/// Position within a query's results.
///
/// Yields at most `min(limit, count)` records, fetching the next page when
/// the buffered one runs out. `next` returns `None` once exhausted.
pub struct QueryCursor<'a, T: QueryTarget> {
    query: &'a mut Query<T>,
    /// Number of records returned so far
    position: u64,
    /// Position within the buffered page
    buffer_idx: usize,
    exhausted: bool,
}

impl<'a, T: QueryTarget> QueryCursor<'a, T> {
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub async fn next(&mut self) -> QuartzBioResult<Option<Value>> {
        if self.exhausted || self.query.limit == Some(0) {
            self.exhausted = true;
            return Ok(None);
        }
        if self.position >= self.query.buffered_len() {
            self.exhausted = true;
            return Ok(None);
        }

        let buffered = self.query.response.as_ref().map_or(0, |r| r.results.len());
        if self.buffer_idx == buffered {
            let offset = self.query.page_offset.unwrap_or(0) + self.buffer_idx as u64;
            self.query.execute(offset).await?;
            self.buffer_idx = 0;
        }

        let record = self
            .query
            .response
            .as_ref()
            .and_then(|r| r.results.get(self.buffer_idx))
            .cloned();

        match record {
            Some(record) => {
                self.position += 1;
                self.buffer_idx += 1;
                Ok(Some(record))
            }
            None => {
                // The server ran out before `total` said it would
                self.exhausted = true;
                Ok(None)
            }
        }
    }

    /// Next record decoded into `R`
    pub async fn next_as<R: DeserializeOwned>(&mut self) -> QuartzBioResult<Option<R>> {
        match self.next().await? {
            Some(record) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    /// The remaining records as a stream
    pub fn into_stream(self) -> impl Stream<Item = QuartzBioResult<Value>> + 'a {
        stream::try_unfold(self, |mut cursor| async move {
            let next = cursor.next().await?;
            Ok::<_, QuartzBioError>(next.map(|record| (record, cursor)))
        })
    }
}

/// Several dataset queries sent in one request
#[derive(Debug, Clone)]
pub struct BatchQuery {
    queries: Vec<Query<DatasetTarget>>,
}

impl BatchQuery {
    pub fn new(queries: Vec<Query<DatasetTarget>>) -> Self {
        Self { queries }
    }

    pub fn push(mut self, query: Query<DatasetTarget>) -> Self {
        self.queries.push(query);
        self
    }

    pub fn queries(&self) -> &[Query<DatasetTarget>] {
        &self.queries
    }

    /// One entry per query, in order, each with its dataset, offset and limit
    pub fn build_params(&self) -> Map<String, Value> {
        let queries: Vec<Value> = self
            .queries
            .iter()
            .map(|q| {
                let offset = q
                    .page_offset
                    .unwrap_or_else(|| q.window.map_or(0, |w| w.start));
                let mut params = q.build_params();
                params.insert("dataset".to_string(), json!(q.target.dataset_id));
                params.insert("offset".to_string(), json!(offset));
                params.insert("limit".to_string(), json!(q.page_limit(offset)));
                Value::Object(params)
            })
            .collect();

        let mut body = Map::new();
        body.insert("queries".to_string(), Value::Array(queries));
        body
    }

    /// Run every query in one request. The response lists results in
    /// request order.
    pub async fn execute(&self, extra: Map<String, Value>) -> QuartzBioResult<Value> {
        let client = self
            .queries
            .first()
            .map(|q| q.client.clone())
            .ok_or_else(|| QuartzBioError::invalid_param("BatchQuery needs at least one query"))?;

        let mut body = self.build_params();
        body.extend(extra);

        debug!("executing batch query of {} queries", self.queries.len());
        client.post("/v1/batch_query", &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;

    fn client() -> QuartzBioClient {
        QuartzBioClient::new("http://localhost:8080", NoAuth).unwrap()
    }

    #[test]
    fn test_build_params_single_filter() {
        let q = Query::new(client(), "123").filter(Filter::eq("gene", "BRCA2"));
        let params = q.build_params();
        assert_eq!(params["filters"], json!([["gene", "BRCA2"]]));
        assert!(!params.contains_key("fields"));
    }

    #[test]
    fn test_build_params_wraps_several_filters() {
        let q = Query::new(client(), "123")
            .with_fields(["gene", "start"])
            .with_genome_build("GRCh38")
            .filter(Filter::eq("gene", "BRCA2"))
            .filter(Filter::gt("start", 10));

        let params = q.build_params();
        assert_eq!(
            params["filters"],
            json!([{"and": [["gene", "BRCA2"], ["start__gt", 10]]}])
        );
        assert_eq!(params["fields"], json!(["gene", "start"]));
        assert_eq!(params["genome_build"], json!("GRCh38"));
    }

    #[test]
    fn test_empty_filters_are_skipped() {
        let q = Query::new(client(), "123").filter(Filter::empty());
        assert!(!q.build_params().contains_key("filters"));
    }

    #[test]
    fn test_filter_does_not_mutate_receiver() {
        let base = Query::new(client(), "123");
        let narrowed = base.filter(Filter::eq("a", 1));
        assert!(base.filters().is_empty());
        assert_eq!(narrowed.filters().len(), 1);
    }

    #[test]
    fn test_page_size_bounds() {
        assert!(Query::new(client(), "1").with_page_size(0).unwrap_err().is_validation());
        assert!(Query::new(client(), "1").with_page_size(MAX_PAGE_SIZE + 1).is_err());
        assert!(Query::new(client(), "1").with_page_size(MAX_PAGE_SIZE).is_ok());
    }

    #[test]
    fn test_negative_slices_are_rejected() {
        let q = Query::new(client(), "1");
        assert!(q.slice(-1..3).unwrap_err().is_validation());
        assert!(q.slice(0..-3).unwrap_err().is_validation());
        assert!(q.slice(..=-1).unwrap_err().is_validation());
        assert!(q.slice(5..2).unwrap_err().is_validation());
    }

    #[test]
    fn test_slice_sets_window_and_limit() {
        let q = Query::new(client(), "1").slice(2..5).unwrap();
        assert_eq!(q.window(), Some(Window { start: 2, stop: Some(5) }));
        assert_eq!(q.limit(), Some(3));

        let open = Query::new(client(), "1").slice(10..).unwrap();
        assert_eq!(open.window(), Some(Window { start: 10, stop: None }));
        assert_eq!(open.limit(), None);
    }

    #[test]
    fn test_nested_slices_compose() {
        let q = Query::new(client(), "1").slice(10..20).unwrap();

        let inner = q.slice(2..4).unwrap();
        assert_eq!(inner.window(), Some(Window { start: 12, stop: Some(14) }));
        assert_eq!(inner.limit(), Some(2));

        // narrowed to the outer window
        let clipped = q.slice(5..50).unwrap();
        assert_eq!(clipped.window(), Some(Window { start: 15, stop: Some(20) }));
        assert_eq!(clipped.limit(), Some(5));

        let past_end = q.slice(10..12).unwrap();
        assert_eq!(past_end.limit(), Some(0));
    }

    #[test]
    fn test_slice_respects_smaller_limit() {
        let q = Query::new(client(), "1").with_limit(2).slice(0..10).unwrap();
        assert_eq!(q.limit(), Some(2));
    }

    #[test]
    fn test_page_limit_uses_remaining_limit() {
        let q = Query::new(client(), "1")
            .with_limit(150)
            .with_page_size(100)
            .unwrap();
        assert_eq!(q.page_limit(0), 100);
        assert_eq!(q.page_limit(100), 50);

        let sliced = q.slice(40..45).unwrap();
        assert_eq!(sliced.page_limit(40), 5);
        assert_eq!(sliced.page_limit(43), 2);
    }

    #[test]
    fn test_search_params() {
        let q = Query::global_search(client())
            .with_query("BRCA2")
            .with_entities([("gene", "BRCA2")])
            .with_ordering(["-created_at"])
            .with_debug(true)
            .filter(Filter::eq("type", "dataset"));

        let params = q.build_params();
        assert_eq!(params["query"], json!("BRCA2"));
        assert_eq!(params["entities"], json!([["gene", "BRCA2"]]));
        assert_eq!(params["ordering"], json!(["-created_at"]));
        assert_eq!(params["debug"], json!("True"));
        assert_eq!(params["filters"], json!([["type", "dataset"]]));
        assert_eq!(q.target().data_path(), "/v2/search");
    }

    #[test]
    fn test_batch_params_in_order() {
        let a = Query::new(client(), "1").filter(Filter::eq("gene", "BRCA1"));
        let b = Query::new(client(), "2").with_limit(5);
        let body = BatchQuery::new(vec![a]).push(b).build_params();

        assert_eq!(
            body["queries"],
            json!([
                {"filters": [["gene", "BRCA1"]], "dataset": "1", "offset": 0, "limit": 100},
                {"dataset": "2", "offset": 0, "limit": 5}
            ])
        );
    }
}
