//! Pure pipeline-name resolution. No I/O; deterministic for a given input.

use crate::models::crm::Pipeline;

#[derive(Debug, PartialEq)]
pub struct NotFound {
    pub query: String,
    pub available: Vec<String>,
}

/// Resolve a human-readable query to a pipeline. Policy, first match wins:
/// 1. exact case-insensitive name equality
/// 2. exact id equality
/// 3. case-insensitive substring containment, either direction
pub fn resolve<'a>(query: &str, pipelines: &'a [Pipeline]) -> Result<&'a Pipeline, NotFound> {
    let needle = query.trim().to_lowercase();

    if !needle.is_empty() {
        if let Some(p) = pipelines.iter().find(|p| p.name.to_lowercase() == needle) {
            return Ok(p);
        }
        if let Some(p) = pipelines.iter().find(|p| p.id == query.trim()) {
            return Ok(p);
        }
        if let Some(p) = pipelines.iter().find(|p| {
            let name = p.name.to_lowercase();
            name.contains(&needle) || needle.contains(&name)
        }) {
            return Ok(p);
        }
    }

    Err(NotFound {
        query: query.to_string(),
        available: pipelines.iter().map(|p| p.name.clone()).collect(),
    })
}
