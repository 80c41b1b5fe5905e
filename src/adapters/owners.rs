//! Owners adapter: relational fetch with owned properties, their leases and
//! tenant names

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{Owner, RetrievalFilters, SourceType};

use super::{num_field, text_field, truncate_to_token_budget, SourceAdapter, SourceItem, TOKEN_BUDGET};

pub struct OwnersAdapter {
    db: Arc<Database>,
}

impl OwnersAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn owner_to_item(&self, owner: &Owner) -> Result<SourceItem> {
        let properties = self.db.properties_for_owner(owner.id)?;
        let mut property_entries = Vec::with_capacity(properties.len());
        for property in &properties {
            let leases = self.db.leases_for_property(property.id)?;
            let mut lease_entries = Vec::with_capacity(leases.len());
            for lease in &leases {
                let tenant_name = self
                    .db
                    .get_tenant(lease.tenant_id)?
                    .map(|t| t.name)
                    .unwrap_or_else(|| "N/A".to_string());
                lease_entries.push(json!({ "lease": lease, "tenant_name": tenant_name }));
            }
            property_entries.push(json!({ "property": property, "leases": lease_entries }));
        }

        Ok(SourceItem {
            id: owner.id.to_string(),
            title: owner.name.clone(),
            data: json!({ "owner": owner, "properties": property_entries }),
            score: 1.0,
        })
    }
}

#[async_trait]
impl SourceAdapter for OwnersAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Owners
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        _query: &str,
        _filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let owners = self.db.list_owners(organization_id, None, limit)?;
        owners.iter().map(|o| self.owner_to_item(o)).collect()
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let owner = &item.data["owner"];

        let mut formatted = format!(
            "# Owner: {name}\n\n\
             ## Identity\n\
             - **Type**: {otype}\n\
             - **Email**: {email}\n\
             - **Phone**: {phone}\n\
             - **Address**: {address}, {postal} {city}\n\n\
             ## Legal\n\
             - **Company number**: {company}\n\
             - **Legal form**: {legal_form}\n\
             - **Legal representative**: {representative}\n",
            name = item.title,
            otype = text_field(owner, "owner_type"),
            email = text_field(owner, "email"),
            phone = text_field(owner, "phone"),
            address = text_field(owner, "address"),
            postal = text_field(owner, "postal_code"),
            city = text_field(owner, "city"),
            company = text_field(owner, "company_number"),
            legal_form = text_field(owner, "legal_form"),
            representative = text_field(owner, "legal_representative"),
        );

        if let Some(properties) = item.data["properties"].as_array() {
            if !properties.is_empty() {
                let total_value: f64 = properties
                    .iter()
                    .map(|e| num_field(&e["property"], "estimated_value"))
                    .sum();
                formatted.push_str(&format!(
                    "\n## Portfolio ({} properties, estimated value {:.0})\n",
                    properties.len(),
                    total_value
                ));

                for entry in properties {
                    let property = &entry["property"];
                    formatted.push_str(&format!(
                        "\n### {pname}\n\
                         - **Address**: {address}, {city}\n\
                         - **Type**: {ptype}, {surface:.0} m²\n\
                         - **Estimated value**: {value:.0}\n",
                        pname = text_field(property, "name"),
                        address = text_field(property, "address"),
                        city = text_field(property, "city"),
                        ptype = text_field(property, "property_type"),
                        surface = num_field(property, "surface_area"),
                        value = num_field(property, "estimated_value"),
                    ));
                    if let Some(leases) = entry["leases"].as_array() {
                        for lease_entry in leases {
                            let lease = &lease_entry["lease"];
                            formatted.push_str(&format!(
                                "- **Leased to**: {tenant} at {rent:.0}/month\n",
                                tenant = text_field(lease_entry, "tenant_name"),
                                rent = num_field(lease, "monthly_rent"),
                            ));
                        }
                    }
                }
            }
        }

        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
