use serde::{Deserialize, Serialize};

use super::crm::OpportunityStatus;

/// Structured filters extracted from a natural-language query.
///
/// Replaces the free-form JSON object the upstream classifier returns with
/// explicit optional fields; the classifier itself is a swappable
/// collaborator behind `interpret::Interpreter`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryInterpretation {
    #[serde(default)]
    pub opportunity_names: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline_name: Option<String>,
    #[serde(default)]
    pub task_limit: Option<usize>,
    #[serde(default)]
    pub status: Option<OpportunityStatus>,
}

impl QueryInterpretation {
    pub fn is_empty(&self) -> bool {
        self.opportunity_names.is_none()
            && self.pipeline_name.is_none()
            && self.task_limit.is_none()
            && self.status.is_none()
    }
}
