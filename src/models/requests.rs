use serde::Deserialize;
use serde_json::Value;

use crate::models::records::RecordId;

/// Body of a bulk delete: `{"ids": [...]}`
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteRecordsRequest {
    pub ids: Vec<Value>,
}

impl DeleteRecordsRequest {
    /// Ids that are neither strings nor integers are dropped.
    pub fn record_ids(&self) -> Vec<RecordId> {
        self.ids.iter().filter_map(RecordId::from_value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_ids_skip_invalid_values() {
        let request: DeleteRecordsRequest =
            serde_json::from_value(json!({"ids": [1, "2", null, {"x": 1}]})).unwrap();
        assert_eq!(request.record_ids(), vec![RecordId::Int(1), RecordId::Int(2)]);
    }
}
