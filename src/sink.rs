use tokio::sync::Mutex;

use crate::model::DeckRecord;

/// Append-only accumulator shared by every deck branch of one run.
///
/// Insertion order carries no meaning; branches complete in whatever order
/// their pages load.
#[derive(Debug, Default)]
pub(crate) struct DeckSink {
    records: Mutex<Vec<DeckRecord>>,
}

impl DeckSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn push(&self, record: DeckRecord) {
        self.records.lock().await.push(record);
    }

    pub(crate) fn into_records(self) -> Vec<DeckRecord> {
        self.records.into_inner()
    }
}
