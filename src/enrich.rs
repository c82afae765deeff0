//! Pure opportunity → task flattening. Output order is opportunity order,
//! then task order within each opportunity; nothing is re-sorted or
//! deduplicated here (dedup is a presentation concern, see `console`).

use crate::models::crm::{EnrichedTask, Opportunity};

pub fn enrich(opportunities: &[Opportunity]) -> Vec<EnrichedTask> {
    opportunities
        .iter()
        .flat_map(|opp| {
            opp.tasks
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(move |task| EnrichedTask {
                    id: task.id.clone(),
                    title: task.title.clone(),
                    description: task.description.clone(),
                    due_date: task.due_date.clone(),
                    completed: task.completed,
                    assigned_to: task.assigned_to.clone(),
                    opportunity_id: opp.id.clone(),
                    opportunity_title: opp.name.clone(),
                    opportunity_status: opp.status,
                    opportunity_stage: opp.stage_name.clone().or_else(|| opp.stage_id.clone()),
                    opportunity_value: opp.monetary_value,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::crm::{OpportunityStatus, Task};

    fn task(id: &str, title: &str) -> Task {
        Task {
            id: id.into(),
            title: title.into(),
            description: None,
            due_date: None,
            completed: false,
            assigned_to: None,
        }
    }

    fn opportunity(id: &str, tasks: Option<Vec<Task>>) -> Opportunity {
        Opportunity {
            id: id.into(),
            name: format!("Opp {id}"),
            status: Some(OpportunityStatus::Open),
            stage_id: None,
            stage_name: None,
            monetary_value: None,
            contact_id: None,
            pipeline_id: None,
            tasks,
        }
    }

    #[test]
    fn one_record_per_task_carrying_parent_id() {
        let opp = opportunity("o1", Some(vec![task("t1", "Call"), task("t2", "Email")]));
        let enriched = enrich(&[opp]);
        assert_eq!(enriched.len(), 2);
        assert!(enriched.iter().all(|t| t.opportunity_id == "o1"));
    }

    #[test]
    fn empty_or_missing_tasks_contribute_nothing() {
        let opps = vec![opportunity("o1", None), opportunity("o2", Some(vec![]))];
        assert!(enrich(&opps).is_empty());
    }

    #[test]
    fn concatenation_homomorphism() {
        let a = vec![opportunity("o1", Some(vec![task("t1", "Call")]))];
        let b = vec![
            opportunity("o2", None),
            opportunity("o3", Some(vec![task("t2", "Email"), task("t3", "Ship")])),
        ];

        let mut combined: Vec<Opportunity> = a.clone();
        combined.extend(b.clone());

        let mut piecewise = enrich(&a);
        piecewise.extend(enrich(&b));

        assert_eq!(enrich(&combined), piecewise);
    }

    #[test]
    fn carries_opportunity_context_fields() {
        let opp = Opportunity {
            id: "o1".into(),
            name: "Proj A".into(),
            status: Some(OpportunityStatus::Open),
            stage_id: Some("stage_9".into()),
            stage_name: Some("Proposal".into()),
            monetary_value: Some(5000.0),
            contact_id: None,
            pipeline_id: None,
            tasks: Some(vec![task("t1", "Call")]),
        };

        let enriched = enrich(&[opp]);
        assert_eq!(enriched.len(), 1);
        let t = &enriched[0];
        assert_eq!(t.id, "t1");
        assert_eq!(t.title, "Call");
        assert_eq!(t.opportunity_id, "o1");
        assert_eq!(t.opportunity_title, "Proj A");
        assert_eq!(t.opportunity_stage.as_deref(), Some("Proposal"));
        assert_eq!(t.opportunity_value, Some(5000.0));
    }

    #[test]
    fn output_preserves_input_order() {
        let opps = vec![
            opportunity("o1", Some(vec![task("t1", "a"), task("t2", "b")])),
            opportunity("o2", Some(vec![task("t3", "c")])),
        ];
        let ids: Vec<_> = enrich(&opps).into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["t1", "t2", "t3"]);
    }
}
