/// Entity primary keys as issued by the back office (BIGSERIAL).
pub type DbId = i64;

/// A plain entity record as supplied by the data layer.
pub type Record = serde_json::Map<String, serde_json::Value>;
