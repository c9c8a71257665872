use std::collections::VecDeque;
use std::time::Duration;

use varidx::reindex::{Document, ParentChildQuery, ParentRecord, ScrollPage};
use varidx::{
    DocumentSink, ReindexConfig, ReindexPipeline, Result, ScrollSource, ScrollState,
    ThroughputCounter, ThroughputMonitor, Value,
};

/// Pre-paged parents; the cursor is simply the index of the next page
struct PagedSource {
    pages: VecDeque<Vec<ParentRecord>>,
    issued: usize,
}
impl PagedSource {
    fn new(parents: usize, page_size: usize) -> Self {
        let records: Vec<_> = (0..parents)
            .map(|i| ParentRecord {
                id: format!("variant-{i}"),
                fields: Document::from([("reference_name".to_string(), Value::from("1"))]),
                children: (0..=i % 3)
                    .map(|c| Document::from([("call_set_id".to_string(), Value::from(c as i64))]))
                    .collect(),
            })
            .collect();
        Self {
            pages: records.chunks(page_size).map(<[_]>::to_vec).collect(),
            issued: 0,
        }
    }

    fn next_page(&mut self) -> ScrollPage {
        self.issued += 1;
        ScrollPage {
            records: self.pages.pop_front().unwrap_or_default(),
            cursor: Some(format!("c{}", self.issued)),
        }
    }
}
impl ScrollSource for PagedSource {
    fn search(&mut self, _query: &ParentChildQuery) -> anyhow::Result<ScrollPage> {
        Ok(self.next_page())
    }

    fn scroll(&mut self, cursor: &str) -> anyhow::Result<ScrollPage> {
        anyhow::ensure!(cursor == format!("c{}", self.issued), "stale cursor {cursor}");
        Ok(self.next_page())
    }
}

#[derive(Default)]
struct VecSink(Vec<(u64, Document)>);
impl DocumentSink for VecSink {
    fn write(&mut self, key: u64, _type_tag: &str, document: &Document) -> anyhow::Result<()> {
        self.0.push((key, document.clone()));
        Ok(())
    }
}

#[test]
fn reindex_writes_every_parent_once() -> Result<()> {
    let counter = ThroughputCounter::new();
    let mut monitor =
        ThroughputMonitor::new("reindex", counter.clone()).interval(Duration::from_millis(1));
    monitor.start()?;

    let mut sink = VecSink::default();
    let mut pipeline = ReindexPipeline::new(
        PagedSource::new(1_234, 100),
        &mut sink,
        ReindexConfig::new().page_size(100).first_key(1),
    )?
    .with_counter(counter.clone());
    let summary = pipeline.run()?;
    assert_eq!(pipeline.state(), &ScrollState::Exhausted);
    drop(pipeline);
    monitor.stop();

    assert_eq!(summary.records, 1_234);
    assert_eq!(summary.pages, 13);
    assert_eq!(monitor.report().count, 1_234);

    let keys: Vec<_> = sink.0.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys, (1..=1_234).collect::<Vec<_>>());
    let calls = sink.0[5].1.get("calls").and_then(Value::as_list).unwrap_or_default();
    assert_eq!(calls.len(), 3);
    Ok(())
}
