use reqwest::Url;
use serde::Serialize;

/// Link into the host CMS backend that opens the record a finding came from.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RecordEditLink {
    pub uri: String,
    pub label: String,
}

impl RecordEditLink {
    /// Build a link restricted to a single field of `table`/`uid`.
    ///
    /// `base` is the backend record-edit route; any query string it already
    /// carries is kept.
    pub fn new(base: &Url, table: &str, uid: u32, field: &str) -> Self {
        let mut uri = base.clone();
        uri.query_pairs_mut()
            .append_pair(&format!("edit[{table}][{uid}]"), "edit")
            .append_pair(&format!("columnsOnly[{table}]"), field);

        Self {
            uri: uri.into(),
            label: format!("{table}:{uid} ({field})"),
        }
    }
}
