//! Platform component tags.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Subsystem an operation belongs to, used for log fields and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentType {
    RagAsk,
    RagSearch,
    Summarize,
    Aggregate,
    CsvInsights,
    AgentRun,
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RagAsk => "rag_ask",
            Self::RagSearch => "rag_search",
            Self::Summarize => "summarize",
            Self::Aggregate => "aggregate",
            Self::CsvInsights => "csv_insights",
            Self::AgentRun => "agent_run",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
