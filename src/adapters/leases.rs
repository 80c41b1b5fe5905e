//! Leases adapter: relational fetch with joined property and tenant data

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{Lease, RetrievalFilters, SourceType};

use super::{num_field, text_field, truncate_to_token_budget, SourceAdapter, SourceItem, TOKEN_BUDGET};

pub struct LeasesAdapter {
    db: Arc<Database>,
}

impl LeasesAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn lease_to_item(&self, lease: &Lease) -> Result<SourceItem> {
        let property = self.db.get_property(lease.property_id)?;
        let tenant = self.db.get_tenant(lease.tenant_id)?;

        let title = match (&property, &tenant) {
            (Some(p), Some(t)) => format!("Lease - {} ({})", p.name, t.name),
            (Some(p), None) => format!("Lease - {}", p.name),
            _ => format!("Lease {}", lease.id),
        };

        Ok(SourceItem {
            id: lease.id.to_string(),
            title,
            data: json!({
                "lease": lease,
                "property": property,
                "tenant": tenant,
            }),
            score: 1.0,
        })
    }
}

#[async_trait]
impl SourceAdapter for LeasesAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Leases
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        _query: &str,
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let mut leases = self.db.list_leases(
            organization_id,
            filters.lease_ids.as_deref(),
            limit,
        )?;

        if let Some(property_ids) = &filters.property_ids {
            leases.retain(|l| property_ids.contains(&l.property_id));
        }

        leases.iter().map(|l| self.lease_to_item(l)).collect()
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let lease = &item.data["lease"];
        let property = &item.data["property"];
        let tenant = &item.data["tenant"];

        let mut formatted = format!(
            "# Lease: {title}\n\n\
             ## Terms\n\
             - **Type**: {lease_type}\n\
             - **Start date**: {start}\n\
             - **End date**: {end}\n\
             - **Monthly rent**: {rent:.0}\n\
             - **Monthly charges**: {charges:.0}\n\
             - **Deposit**: {deposit:.0}\n\
             - **Indexation rate**: {indexation}\n",
            title = item.title,
            lease_type = text_field(lease, "lease_type"),
            start = text_field(lease, "start_date"),
            end = lease
                .get("end_date")
                .and_then(|v| v.as_str())
                .unwrap_or("open-ended"),
            rent = num_field(lease, "monthly_rent"),
            charges = num_field(lease, "charges"),
            deposit = num_field(lease, "deposit"),
            indexation = lease
                .get("indexation_rate")
                .and_then(|v| v.as_f64())
                .map(|r| format!("{:.2}%", r))
                .unwrap_or_else(|| "none".to_string()),
        );

        if !property.is_null() {
            formatted.push_str(&format!(
                "\n## Property\n\
                 - **Name**: {name}\n\
                 - **Address**: {address}, {postal} {city}\n\
                 - **Type**: {ptype}\n\
                 - **Surface**: {surface:.0} m²\n",
                name = text_field(property, "name"),
                address = text_field(property, "address"),
                postal = text_field(property, "postal_code"),
                city = text_field(property, "city"),
                ptype = text_field(property, "property_type"),
                surface = num_field(property, "surface_area"),
            ));
        }

        if !tenant.is_null() {
            formatted.push_str(&format!(
                "\n## Tenant\n\
                 - **Name**: {name}\n\
                 - **Type**: {ttype}\n\
                 - **Email**: {email}\n",
                name = text_field(tenant, "name"),
                ttype = text_field(tenant, "tenant_type"),
                email = text_field(tenant, "email"),
            ));
        }

        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
