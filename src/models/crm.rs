//! Read-only mirrors of the vendor's CRM shapes. Never persisted;
//! re-fetched per request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityStatus {
    Open,
    Won,
    Lost,
    Abandoned,
}

impl OpportunityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpportunityStatus::Open => "open",
            OpportunityStatus::Won => "won",
            OpportunityStatus::Lost => "lost",
            OpportunityStatus::Abandoned => "abandoned",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "dueDate", default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(rename = "assignedTo", default)]
    pub assigned_to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
    #[serde(rename = "pipelineStageId", default)]
    pub stage_id: Option<String>,
    /// Human-readable stage name when the vendor includes it.
    #[serde(rename = "pipelineStageName", default)]
    pub stage_name: Option<String>,
    #[serde(rename = "monetaryValue", default)]
    pub monetary_value: Option<f64>,
    #[serde(rename = "contactId", default)]
    pub contact_id: Option<String>,
    #[serde(rename = "pipelineId", default)]
    pub pipeline_id: Option<String>,
    /// Present only when the search was issued with getTasks=true.
    #[serde(default)]
    pub tasks: Option<Vec<Task>>,
}

/// A task flattened together with its parent opportunity's identifying
/// fields. A new record, not a reference — the raw Task is never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTask {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub completed: bool,
    pub assigned_to: Option<String>,
    pub opportunity_id: String,
    pub opportunity_title: String,
    pub opportunity_status: Option<OpportunityStatus>,
    pub opportunity_stage: Option<String>,
    pub opportunity_value: Option<f64>,
}
