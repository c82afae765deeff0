//! Terminal rendering of enriched task lists, plus presentation-layer
//! duplicate suppression. Dedup is a display heuristic only — the vendor
//! does not guarantee the key tuple is unique, so the core enricher never
//! applies it.

use std::collections::HashSet;

use crate::models::crm::EnrichedTask;

/// Idempotency key for display dedup.
fn dedupe_key(task: &EnrichedTask) -> (String, String, String, String, String) {
    (
        task.title.clone(),
        task.description.clone().unwrap_or_default(),
        task.due_date.clone().unwrap_or_default(),
        task.assigned_to.clone().unwrap_or_default(),
        task.opportunity_id.clone(),
    )
}

/// Drop repeated tasks, keeping first occurrence. Order is preserved.
pub fn dedupe_tasks(tasks: Vec<EnrichedTask>) -> Vec<EnrichedTask> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|t| seen.insert(dedupe_key(t)))
        .collect()
}

/// Render tasks grouped by opportunity, in the dashboard's checklist style.
pub fn render_tasks(tasks: &[EnrichedTask]) -> String {
    if tasks.is_empty() {
        return "No incomplete tasks found for the given criteria.".to_string();
    }

    let mut out = String::from("--- Tasks from Opportunities ---\n");
    let mut current_opp: Option<&str> = None;

    for task in tasks {
        if current_opp != Some(task.opportunity_id.as_str()) {
            current_opp = Some(task.opportunity_id.as_str());
            out.push_str(&format!("\nOpportunity: {}", task.opportunity_title));
            if let Some(stage) = &task.opportunity_stage {
                out.push_str(&format!(" (Stage: {stage})"));
            }
            out.push('\n');
        }
        let marker = if task.completed { "x" } else { " " };
        out.push_str(&format!("  - [{marker}] Task: {}\n", task.title));
        out.push_str(&format!(
            "    > Due: {}\n",
            task.due_date.as_deref().unwrap_or("N/A")
        ));
    }

    out
}
