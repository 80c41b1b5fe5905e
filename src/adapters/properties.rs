//! Properties adapter: relational fetch with joined leases and tenants

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{Property, RetrievalFilters, SourceType};

use super::{num_field, text_field, truncate_to_token_budget, yes_no, SourceAdapter, SourceItem, TOKEN_BUDGET};

pub struct PropertiesAdapter {
    db: Arc<Database>,
}

impl PropertiesAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn property_to_item(&self, property: &Property) -> Result<SourceItem> {
        let leases = self.db.leases_for_property(property.id)?;
        let mut lease_entries = Vec::with_capacity(leases.len());
        for lease in &leases {
            let tenant = self.db.get_tenant(lease.tenant_id)?;
            lease_entries.push(json!({ "lease": lease, "tenant": tenant }));
        }

        Ok(SourceItem {
            id: property.id.to_string(),
            title: property.name.clone(),
            data: json!({ "property": property, "leases": lease_entries }),
            score: 1.0,
        })
    }
}

#[async_trait]
impl SourceAdapter for PropertiesAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Properties
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        _query: &str,
        filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let properties = self.db.list_properties(
            organization_id,
            filters.property_ids.as_deref(),
            limit,
        )?;
        properties.iter().map(|p| self.property_to_item(p)).collect()
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let property = &item.data["property"];

        let mut formatted = format!(
            "# Property: {name}\n\n\
             ## Location\n\
             - **Address**: {address}\n\
             - **City**: {city} {postal}\n\
             - **Country**: {country}\n\n\
             ## Characteristics\n\
             - **Type**: {ptype}\n\
             - **Surface**: {surface:.0} m²\n\
             - **Estimated value**: {value:.0}\n\
             - **Rooms**: {rooms}\n\
             - **Elevator**: {elevator}\n\
             - **Parking**: {parking}\n\
             - **Balcony/terrace**: {balcony}\n\
             - **Condition**: {condition}\n",
            name = item.title,
            address = text_field(property, "address"),
            city = text_field(property, "city"),
            postal = text_field(property, "postal_code"),
            country = text_field(property, "country"),
            ptype = text_field(property, "property_type"),
            surface = num_field(property, "surface_area"),
            value = num_field(property, "estimated_value"),
            rooms = property
                .get("rooms")
                .and_then(|v| v.as_u64())
                .map(|r| r.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            elevator = yes_no(property, "has_elevator"),
            parking = yes_no(property, "has_parking"),
            balcony = yes_no(property, "has_balcony"),
            condition = text_field(property, "condition"),
        );

        if let Some(leases) = item.data["leases"].as_array() {
            if !leases.is_empty() {
                formatted.push_str(&format!("\n## Leases ({})\n", leases.len()));
                for (i, entry) in leases.iter().enumerate() {
                    let lease = &entry["lease"];
                    let tenant = &entry["tenant"];
                    formatted.push_str(&format!(
                        "\n### Lease {n}\n\
                         - **Tenant**: {tenant_name}\n\
                         - **Monthly rent**: {rent:.0} (+ {charges:.0} charges)\n\
                         - **Period**: {start} to {end}\n",
                        n = i + 1,
                        tenant_name = text_field(tenant, "name"),
                        rent = num_field(lease, "monthly_rent"),
                        charges = num_field(lease, "charges"),
                        start = text_field(lease, "start_date"),
                        end = lease
                            .get("end_date")
                            .and_then(|v| v.as_str())
                            .unwrap_or("open-ended"),
                    ));
                }
            }
        }

        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
