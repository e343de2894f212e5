//! The structured display artifact `OutputFormatter` produces (spec §4.7):
//! a mapping with required fields `{summary, content_blocks, key_insights,
//! recommendations, metadata}`, where `content_blocks` is a list of
//! tagged items with variants `{metric, table, chart, comparison,
//! insight, text}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One tagged item of the structured artifact's `content_blocks` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Metric {
        label: String,
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        change: Option<String>,
    },
    Table {
        title: String,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Chart {
        title: String,
        chart_type: String,
        data: Value,
    },
    Comparison {
        title: String,
        items: Vec<Value>,
    },
    Insight {
        text: String,
    },
    Text {
        text: String,
    },
}

/// The required-fields artifact itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredOutput {
    pub summary: String,
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub key_insights: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl StructuredOutput {
    /// A single-`text`-block wrapping of whatever raw text is on hand,
    /// used when the LLM's structured response fails to parse (spec
    /// §4.7 point 1) or when no reliable data was obtainable (spec §7).
    pub fn fallback_text(summary: impl Into<String>, text: impl Into<String>) -> Self {
        StructuredOutput {
            summary: summary.into(),
            content_blocks: vec![ContentBlock::Text { text: text.into() }],
            key_insights: Vec::new(),
            recommendations: Vec::new(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_produces_exactly_one_text_block() {
        let output = StructuredOutput::fallback_text("s", "t");
        assert_eq!(output.content_blocks.len(), 1);
        assert!(matches!(output.content_blocks[0], ContentBlock::Text { .. }));
    }

    #[test]
    fn content_block_round_trips_through_json() {
        let block = ContentBlock::Metric {
            label: "Price".into(),
            value: "$150".into(),
            change: Some("+2%".into()),
        };
        let json = serde_json::to_string(&block).unwrap();
        let back: ContentBlock = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, ContentBlock::Metric { .. }));
    }
}
