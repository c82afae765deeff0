//! Natural-language query interpretation seam.
//!
//! The mapping from free text to `QueryInterpretation` is an external
//! collaborator (typically an LLM classifier), so it lives behind a
//! trait. The crate ships `NullInterpreter`, which extracts
//! nothing; the HTTP surface also accepts a structured interpretation
//! directly, bypassing interpretation entirely.

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::crm::Opportunity;
use crate::models::interpretation::QueryInterpretation;

#[async_trait]
pub trait Interpreter: Send + Sync {
    async fn interpret(&self, query: &str) -> Result<QueryInterpretation, AppError>;
}

/// Default interpreter: no classifier configured, every query maps to the
/// empty interpretation (default pipeline, all opportunities).
pub struct NullInterpreter;

#[async_trait]
impl Interpreter for NullInterpreter {
    async fn interpret(&self, _query: &str) -> Result<QueryInterpretation, AppError> {
        Ok(QueryInterpretation::default())
    }
}

/// Apply an interpretation's opportunity filters to a fetched set:
/// case-insensitive substring match on opportunity name, incomplete tasks
/// only, and a per-opportunity task cap.
pub fn apply_filters(
    interp: &QueryInterpretation,
    opportunities: Vec<Opportunity>,
) -> Vec<Opportunity> {
    let name_needles: Option<Vec<String>> = interp
        .opportunity_names
        .as_ref()
        .map(|names| names.iter().map(|n| n.to_lowercase()).collect());

    opportunities
        .into_iter()
        .filter(|opp| match &name_needles {
            Some(needles) => {
                let name = opp.name.to_lowercase();
                needles.iter().any(|n| name.contains(n))
            }
            None => true,
        })
        .map(|mut opp| {
            if let Some(tasks) = opp.tasks.take() {
                let mut incomplete: Vec<_> =
                    tasks.into_iter().filter(|t| !t.completed).collect();
                if let Some(limit) = interp.task_limit {
                    incomplete.truncate(limit);
                }
                opp.tasks = Some(incomplete);
            }
            opp
        })
        .collect()
}
