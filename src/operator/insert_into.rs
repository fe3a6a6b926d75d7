//! `insert_into` operator: the pipeline's terminal write — forwards each
//! document into a named stream via the shared `StreamManager`. If the
//! target stream doesn't exist at runtime, the document is logged to
//! `_log` with an error code and dropped rather than silently creating the
//! stream.

use super::Operator;
use crate::document::Document;
use crate::stream::StreamManager;

#[derive(Debug)]
pub struct InsertIntoOperator {
    stream: String,
    manager: StreamManager,
}

impl InsertIntoOperator {
    pub fn new(stream: String, manager: StreamManager) -> Self {
        Self { stream, manager }
    }
}

impl Operator for InsertIntoOperator {
    fn push(&mut self, doc: Document) {
        if let Err(err) = self.manager.insert(&self.stream, doc.clone()) {
            tracing::warn!(stream = %self.stream, %err, "insert_into failed, logging to _log");
            let mut extra = serde_json::Map::new();
            extra.insert("stream".to_string(), Document::String(self.stream.clone()));
            extra.insert("document".to_string(), doc);
            self.manager
                .log_diagnostic("error", err.code(), err.to_string(), extra);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_into_existing_stream_delivers() {
        let manager = StreamManager::new();
        manager.create_stream("processed").unwrap();
        let mut op = InsertIntoOperator::new("processed".to_string(), manager.clone());
        op.push(json!({"a": 1}));
    }

    #[test]
    fn test_insert_into_missing_stream_logs_and_drops() {
        let manager = StreamManager::new();
        let mut op = InsertIntoOperator::new("ghost".to_string(), manager.clone());
        op.push(json!({"a": 1}));
        assert!(!manager.stream_exists("ghost"));
    }
}
