//! Opportunity/task fetching with an ordered fallback chain.
//!
//! Tier 1 asks the opportunity search to embed tasks (getTasks=true).
//! Tier 2 re-runs the search without nesting and walks contacts one
//! request at a time, capped. Tiers run strictly in sequence through a
//! first-success combinator; every tier failure is recorded and only
//! exhaustion of the whole chain surfaces to the caller.

use futures::future::BoxFuture;
use serde::Serialize;

use crate::enrich::enrich;
use crate::errors::AppError;
use crate::ghl::VendorClient;
use crate::models::crm::{EnrichedTask, Opportunity};

#[derive(Debug, Serialize)]
pub struct FetchOutcome {
    pub opportunities: Vec<Opportunity>,
    pub tasks: Vec<EnrichedTask>,
    /// Which tier produced the result.
    pub source: &'static str,
}

pub struct Fetcher {
    vendor: VendorClient,
    /// Cap on per-contact requests in tier 2. Deliberate hardcoded
    /// backpressure, not a rate limiter.
    contact_cap: usize,
}

struct FetchQuery<'a> {
    access_token: &'a str,
    location_id: &'a str,
    pipeline_id: &'a str,
    status: &'a str,
    limit: u32,
}

impl Fetcher {
    pub fn new(vendor: VendorClient, contact_cap: usize) -> Self {
        Self {
            vendor,
            contact_cap,
        }
    }

    pub async fn fetch_tasks_for_pipeline(
        &self,
        access_token: &str,
        location_id: &str,
        pipeline_id: &str,
        status: &str,
        limit: u32,
    ) -> Result<FetchOutcome, AppError> {
        let query = FetchQuery {
            access_token,
            location_id,
            pipeline_id,
            status,
            limit,
        };

        let tiers: Vec<(&'static str, BoxFuture<'_, Result<FetchOutcome, AppError>>)> = vec![
            ("nested-search", Box::pin(self.nested_search(&query))),
            ("contact-walk", Box::pin(self.contact_walk(&query))),
        ];

        let mut attempts = Vec::new();
        for (tier, attempt) in tiers {
            match attempt.await {
                Ok(outcome) => {
                    if !attempts.is_empty() {
                        tracing::info!(
                            tier,
                            failed_tiers = attempts.len(),
                            "fallback tier succeeded"
                        );
                    }
                    return Ok(outcome);
                }
                Err(e) => {
                    tracing::warn!(tier, "fetch tier failed: {}", e);
                    attempts.push((tier.to_string(), e.to_string()));
                }
            }
        }

        Err(AppError::FallbackExhausted { attempts })
    }

    /// Tier 1: single search with nested task inclusion.
    async fn nested_search(&self, q: &FetchQuery<'_>) -> Result<FetchOutcome, AppError> {
        let opportunities = self
            .vendor
            .search_opportunities(
                q.access_token,
                q.location_id,
                q.pipeline_id,
                q.status,
                true,
                q.limit,
            )
            .await?;

        let tasks = enrich(&opportunities);
        Ok(FetchOutcome {
            opportunities,
            tasks,
            source: "nested-search",
        })
    }

    /// Tier 2: search without nesting, then one task request per distinct
    /// contact, sequentially, capped at `contact_cap`.
    async fn contact_walk(&self, q: &FetchQuery<'_>) -> Result<FetchOutcome, AppError> {
        let mut opportunities = self
            .vendor
            .search_opportunities(
                q.access_token,
                q.location_id,
                q.pipeline_id,
                q.status,
                false,
                q.limit,
            )
            .await?;

        let mut seen = std::collections::HashSet::new();
        let contacts: Vec<String> = opportunities
            .iter()
            .filter_map(|o| o.contact_id.clone())
            .filter(|c| seen.insert(c.clone()))
            .take(self.contact_cap)
            .collect();

        for contact_id in &contacts {
            let tasks = self.vendor.contact_tasks(q.access_token, contact_id).await?;
            // Attach to the first opportunity owned by this contact; a task
            // belongs to at most one opportunity in this model.
            if let Some(opp) = opportunities
                .iter_mut()
                .find(|o| o.contact_id.as_deref() == Some(contact_id.as_str()))
            {
                opp.tasks = Some(tasks);
            }
        }

        let tasks = enrich(&opportunities);
        Ok(FetchOutcome {
            opportunities,
            tasks,
            source: "contact-walk",
        })
    }
}
