//! # Parent/child to nested reindexing
//!
//! Rewrites a document store that models calls as child documents of their
//! variant into one nested document per variant. Parents are read page by page
//! through a scroll cursor; each parent is written to the sink with its
//! children embedded as an ordered list.
//!
//! ```text
//!  Initial ──search──▶ Scrolling ──scroll──▶ Scrolling ── … ──▶ Exhausted
//!     │                                                          ▲
//!     └──────────────── empty first page ────────────────────────┘
//! ```
//!
//! Any error from the source or the sink ends the run and moves the pipeline
//! to [`ScrollState::Failed`]. The pipeline does not retry or skip; after
//! remediation it must be [reset](ReindexPipeline::reset) and run again from
//! the start.

use std::fmt;

use auto_impl::auto_impl;
use log::{debug, info};

use crate::codec::{Info, Value};
use crate::error::{ReindexError, Result};
use crate::monitor::ThroughputCounter;

/// The default number of parents requested per page
pub const DEFAULT_PAGE_SIZE: usize = 500;

/// The default type tag nested documents are written under
pub const DEFAULT_TYPE_TAG: &str = "variant";

/// The default field holding the embedded children
pub const DEFAULT_CHILDREN_FIELD: &str = "calls";

/// A schemaless document as exchanged with the source and the sink
pub type Document = Info;

/// A parent document returned together with its children
#[derive(Debug, Clone, PartialEq)]
pub struct ParentRecord {
    pub id: String,
    pub fields: Document,
    pub children: Vec<Document>,
}

/// One page of a scroll
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScrollPage {
    pub records: Vec<ParentRecord>,
    /// Continuation token for the next page, if the source has one
    pub cursor: Option<String>,
}

/// The query issued to open a scroll: parents with at least one child,
/// children returned inline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentChildQuery {
    pub page_size: usize,
    pub min_children: usize,
}

/// The paginated search surface of the source store
#[auto_impl(&mut, Box)]
pub trait ScrollSource {
    /// Opens a scroll and returns its first page
    fn search(&mut self, query: &ParentChildQuery) -> anyhow::Result<ScrollPage>;

    /// Returns the page following `cursor`
    fn scroll(&mut self, cursor: &str) -> anyhow::Result<ScrollPage>;
}

/// The bulk document sink nested records are written to
#[auto_impl(&mut, Box)]
pub trait DocumentSink {
    fn write(&mut self, key: u64, type_tag: &str, document: &Document) -> anyhow::Result<()>;
}

/// Settings for a [`ReindexPipeline`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexConfig {
    page_size: usize,
    type_tag: String,
    children_field: String,
    first_key: u64,
}
impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            type_tag: DEFAULT_TYPE_TAG.to_string(),
            children_field: DEFAULT_CHILDREN_FIELD.to_string(),
            first_key: 0,
        }
    }
}
impl ReindexConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    #[must_use]
    pub fn type_tag(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = type_tag.into();
        self
    }

    #[must_use]
    pub fn children_field(mut self, field: impl Into<String>) -> Self {
        self.children_field = field.into();
        self
    }

    /// Output key of the first nested record; later records count up from it
    #[must_use]
    pub fn first_key(mut self, key: u64) -> Self {
        self.first_key = key;
        self
    }

    fn query(&self) -> ParentChildQuery {
        ParentChildQuery {
            page_size: self.page_size,
            min_children: 1,
        }
    }
}

/// Where the pipeline is in its scroll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrollState {
    Initial,
    Scrolling { cursor: String },
    Exhausted,
    /// A source or sink error ended the run; only a reset leaves this state
    Failed,
}
impl fmt::Display for ScrollState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Scrolling { .. } => write!(f, "scrolling"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Totals of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReindexSummary {
    /// Non-empty pages processed
    pub pages: u64,
    /// Nested records written
    pub records: u64,
}

type Transform = Box<dyn FnMut(Document) -> Document + Send>;

/// Drives a [`ScrollSource`] to exhaustion, writing nested records to a [`DocumentSink`]
pub struct ReindexPipeline<Src, Snk> {
    source: Src,
    sink: Snk,
    config: ReindexConfig,
    transform: Option<Transform>,
    counter: Option<ThroughputCounter>,
    state: ScrollState,
    next_key: u64,
    summary: ReindexSummary,
}
impl<Src: ScrollSource, Snk: DocumentSink> ReindexPipeline<Src, Snk> {
    pub fn new(source: Src, sink: Snk, config: ReindexConfig) -> Result<Self> {
        if config.page_size == 0 {
            return Err(ReindexError::InvalidPageSize.into());
        }
        Ok(Self {
            source,
            sink,
            next_key: config.first_key,
            config,
            transform: None,
            counter: None,
            state: ScrollState::Initial,
            summary: ReindexSummary::default(),
        })
    }

    /// Applies `transform` to every child before it is embedded
    #[must_use]
    pub fn with_transform<F>(mut self, transform: F) -> Self
    where
        F: FnMut(Document) -> Document + Send + 'static,
    {
        self.transform = Some(Box::new(transform));
        self
    }

    /// Bumps `counter` once per nested record written
    #[must_use]
    pub fn with_counter(mut self, counter: ThroughputCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    #[must_use]
    pub fn state(&self) -> &ScrollState {
        &self.state
    }

    #[must_use]
    pub fn summary(&self) -> ReindexSummary {
        self.summary
    }

    #[must_use]
    pub fn config(&self) -> &ReindexConfig {
        &self.config
    }

    /// Fetches and writes one page; returns the number of records written.
    ///
    /// Once exhausted, further steps write nothing. Any error moves the
    /// pipeline to [`ScrollState::Failed`], after which every step fails with
    /// [`ReindexError::NeedsReset`] until [`reset`](Self::reset) is called.
    pub fn step(&mut self) -> Result<usize> {
        let result = self.advance();
        if result.is_err() {
            self.state = ScrollState::Failed;
        }
        result
    }

    fn advance(&mut self) -> Result<usize> {
        let page = match &self.state {
            ScrollState::Initial => self
                .source
                .search(&self.config.query())
                .map_err(ReindexError::Query)?,
            ScrollState::Scrolling { cursor } => self
                .source
                .scroll(cursor)
                .map_err(ReindexError::Query)?,
            ScrollState::Exhausted => return Ok(0),
            ScrollState::Failed => {
                return Err(ReindexError::NeedsReset {
                    written: self.summary.records,
                }
                .into())
            }
        };

        if page.records.is_empty() {
            debug!("Scroll exhausted after {} pages", self.summary.pages);
            self.state = ScrollState::Exhausted;
            return Ok(0);
        }

        let written = page.records.len();
        for record in page.records {
            self.write_nested(record)?;
        }
        self.summary.pages += 1;

        self.state = match page.cursor {
            Some(cursor) => ScrollState::Scrolling { cursor },
            // a page without a continuation token is the last one
            None => ScrollState::Exhausted,
        };
        Ok(written)
    }

    /// Steps until the scroll is exhausted
    pub fn run(&mut self) -> Result<ReindexSummary> {
        while self.state != ScrollState::Exhausted {
            self.step()?;
        }
        info!(
            "Reindexed {} records from {} pages",
            self.summary.records, self.summary.pages
        );
        Ok(self.summary)
    }

    /// Returns to the initial state so the run can be repeated from the start
    pub fn reset(&mut self) {
        self.state = ScrollState::Initial;
        self.next_key = self.config.first_key;
        self.summary = ReindexSummary::default();
    }

    fn write_nested(&mut self, record: ParentRecord) -> Result<()> {
        let children = record
            .children
            .into_iter()
            .map(|child| match self.transform.as_mut() {
                Some(transform) => Value::Map(transform(child)),
                None => Value::Map(child),
            })
            .collect();

        let mut document = record.fields;
        document.insert(self.config.children_field.clone(), Value::List(children));

        let key = self.next_key;
        self.sink
            .write(key, &self.config.type_tag, &document)
            .map_err(|source| ReindexError::Write { key, source })?;

        self.next_key += 1;
        self.summary.records += 1;
        if let Some(counter) = &self.counter {
            counter.incr();
        }
        Ok(())
    }

    pub fn into_parts(self) -> (Src, Snk) {
        (self.source, self.sink)
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::Error;

    /// Serves `parents` in pages, tracking the queries it receives
    struct MockSource {
        parents: Vec<ParentRecord>,
        fail_at_page: Option<usize>,
        searches: usize,
        last_query: Option<ParentChildQuery>,
        page_size: usize,
    }
    impl MockSource {
        fn new(n: usize) -> Self {
            let parents = (0..n)
                .map(|i| ParentRecord {
                    id: format!("v{i}"),
                    fields: Document::from([("start".to_string(), Value::Int(i as i64))]),
                    children: vec![
                        Document::from([("call_set".to_string(), Value::from("a"))]),
                        Document::from([("call_set".to_string(), Value::from("b"))]),
                    ],
                })
                .collect();
            Self {
                parents,
                fail_at_page: None,
                searches: 0,
                last_query: None,
                page_size: 0,
            }
        }

        fn page(&self, index: usize) -> anyhow::Result<ScrollPage> {
            if self.fail_at_page == Some(index) {
                anyhow::bail!("scroll context expired");
            }
            let start = (index * self.page_size).min(self.parents.len());
            let end = (start + self.page_size).min(self.parents.len());
            Ok(ScrollPage {
                records: self.parents[start..end].to_vec(),
                cursor: Some((index + 1).to_string()),
            })
        }
    }
    impl ScrollSource for MockSource {
        fn search(&mut self, query: &ParentChildQuery) -> anyhow::Result<ScrollPage> {
            self.searches += 1;
            self.last_query = Some(*query);
            self.page_size = query.page_size;
            self.page(0)
        }

        fn scroll(&mut self, cursor: &str) -> anyhow::Result<ScrollPage> {
            self.page(cursor.parse()?)
        }
    }

    #[derive(Default)]
    struct MockSink {
        written: Vec<(u64, String, Document)>,
        reject_key: Option<u64>,
    }
    impl DocumentSink for MockSink {
        fn write(&mut self, key: u64, type_tag: &str, document: &Document) -> anyhow::Result<()> {
            if self.reject_key == Some(key) {
                anyhow::bail!("mapping conflict");
            }
            self.written
                .push((key, type_tag.to_string(), document.clone()));
            Ok(())
        }
    }

    #[test]
    fn test_writes_each_parent_once() -> Result<()> {
        let counter = ThroughputCounter::new();
        let config = ReindexConfig::new().page_size(5);
        let mut pipeline = ReindexPipeline::new(MockSource::new(12), MockSink::default(), config)?
            .with_counter(counter.clone());
        let summary = pipeline.run()?;
        assert_eq!(summary, ReindexSummary { pages: 3, records: 12 });
        assert_eq!(pipeline.state(), &ScrollState::Exhausted);
        assert_eq!(counter.get(), 12);

        let (source, sink) = pipeline.into_parts();
        assert_eq!(source.searches, 1);
        assert_eq!(
            source.last_query,
            Some(ParentChildQuery {
                page_size: 5,
                min_children: 1
            })
        );
        let keys: Vec<_> = sink.written.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(keys, (0..12).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_nested_document_shape() -> Result<()> {
        let config = ReindexConfig::new()
            .type_tag("variant_nested")
            .children_field("samples")
            .first_key(100);
        let mut pipeline = ReindexPipeline::new(MockSource::new(1), MockSink::default(), config)?;
        pipeline.run()?;
        let (_, sink) = pipeline.into_parts();
        let (key, tag, document) = &sink.written[0];
        assert_eq!(*key, 100);
        assert_eq!(tag, "variant_nested");
        assert_eq!(document.get("start"), Some(&Value::Int(0)));
        let samples = document
            .get("samples")
            .and_then(Value::as_list)
            .unwrap_or_default();
        assert_eq!(samples.len(), 2);
        assert_eq!(
            samples[1].as_map().and_then(|m| m.get("call_set")),
            Some(&Value::from("b"))
        );
        Ok(())
    }

    #[test]
    fn test_empty_source_exhausts_immediately() -> Result<()> {
        let mut pipeline =
            ReindexPipeline::new(MockSource::new(0), MockSink::default(), ReindexConfig::new())?;
        assert_eq!(pipeline.step()?, 0);
        assert_eq!(pipeline.state(), &ScrollState::Exhausted);
        // exhausted is terminal
        assert_eq!(pipeline.step()?, 0);
        assert_eq!(pipeline.summary().records, 0);
        Ok(())
    }

    #[test]
    fn test_step_by_step() -> Result<()> {
        let mut pipeline = ReindexPipeline::new(
            MockSource::new(3),
            MockSink::default(),
            ReindexConfig::new().page_size(2),
        )?;
        assert_eq!(pipeline.step()?, 2);
        assert_eq!(
            pipeline.state(),
            &ScrollState::Scrolling {
                cursor: "1".to_string()
            }
        );
        assert_eq!(pipeline.step()?, 1);
        assert_eq!(pipeline.step()?, 0);
        assert_eq!(pipeline.state(), &ScrollState::Exhausted);
        Ok(())
    }

    #[test]
    fn test_transform_applies_to_children() -> Result<()> {
        let mut pipeline =
            ReindexPipeline::new(MockSource::new(2), MockSink::default(), ReindexConfig::new())?
                .with_transform(|mut child| {
                    child.insert("nested".to_string(), Value::Bool(true));
                    child
                });
        pipeline.run()?;
        let (_, sink) = pipeline.into_parts();
        for (_, _, document) in &sink.written {
            for child in document["calls"].as_list().unwrap_or_default() {
                let nested = child.as_map().and_then(|m| m.get("nested"));
                assert_eq!(nested, Some(&Value::Bool(true)));
            }
        }
        Ok(())
    }

    #[test]
    fn test_write_error_is_fatal() -> Result<()> {
        let sink = MockSink {
            reject_key: Some(3),
            ..MockSink::default()
        };
        let mut pipeline =
            ReindexPipeline::new(MockSource::new(10), sink, ReindexConfig::new().page_size(4))?;
        let err = pipeline.run().unwrap_err();
        assert!(matches!(
            err,
            Error::ReindexError(ReindexError::Write { key: 3, .. })
        ));
        assert_eq!(pipeline.summary().records, 3);
        assert_eq!(pipeline.state(), &ScrollState::Failed);
        Ok(())
    }

    #[test]
    fn test_failed_run_requires_reset() -> Result<()> {
        let sink = MockSink {
            reject_key: Some(3),
            ..MockSink::default()
        };
        let mut pipeline =
            ReindexPipeline::new(MockSource::new(10), sink, ReindexConfig::new().page_size(4))?;
        assert!(pipeline.run().is_err());

        // the sink recovers, but the half-finished run must not continue
        pipeline.sink.reject_key = None;
        assert!(matches!(
            pipeline.run(),
            Err(Error::ReindexError(ReindexError::NeedsReset { written: 3 }))
        ));
        assert!(pipeline.step().is_err());
        assert_eq!(pipeline.sink.written.len(), 3);
        assert_eq!(pipeline.source.searches, 1);

        pipeline.reset();
        pipeline.sink.written.clear();
        let summary = pipeline.run()?;
        assert_eq!(summary.records, 10);
        let keys: Vec<_> = pipeline.sink.written.iter().map(|(k, _, _)| *k).collect();
        assert_eq!(keys, (0..10).collect::<Vec<_>>());
        Ok(())
    }

    #[test]
    fn test_query_error_is_fatal_and_reset_reruns() -> Result<()> {
        let mut source = MockSource::new(6);
        source.fail_at_page = Some(1);
        let mut pipeline =
            ReindexPipeline::new(source, MockSink::default(), ReindexConfig::new().page_size(3))?;
        let err = pipeline.run().unwrap_err();
        assert!(matches!(err, Error::ReindexError(ReindexError::Query(_))));
        assert_eq!(pipeline.summary().records, 3);
        assert_eq!(pipeline.state(), &ScrollState::Failed);

        pipeline.source.fail_at_page = None;
        pipeline.reset();
        assert_eq!(pipeline.state(), &ScrollState::Initial);
        let summary = pipeline.run()?;
        assert_eq!(summary.records, 6);
        assert_eq!(pipeline.source.searches, 2);
        Ok(())
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let result = ReindexPipeline::new(
            MockSource::new(1),
            MockSink::default(),
            ReindexConfig::new().page_size(0),
        );
        assert!(matches!(
            result,
            Err(Error::ReindexError(ReindexError::InvalidPageSize))
        ));
    }
}
