/// One record, keyed by column title.
pub type Row = serde_json::Map<String, serde_json::Value>;
