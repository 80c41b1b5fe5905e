//! Tenants adapter: relational fetch with current leases and their
//! properties

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{RetrievalFilters, SourceType, Tenant};

use super::{num_field, text_field, truncate_to_token_budget, SourceAdapter, SourceItem, TOKEN_BUDGET};

pub struct TenantsAdapter {
    db: Arc<Database>,
}

impl TenantsAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn tenant_to_item(&self, tenant: &Tenant) -> Result<SourceItem> {
        let leases = self.db.leases_for_tenant(tenant.id)?;
        let mut lease_entries = Vec::with_capacity(leases.len());
        for lease in &leases {
            let property = self.db.get_property(lease.property_id)?;
            lease_entries.push(json!({ "lease": lease, "property": property }));
        }

        Ok(SourceItem {
            id: tenant.id.to_string(),
            title: tenant.name.clone(),
            data: json!({ "tenant": tenant, "leases": lease_entries }),
            score: 1.0,
        })
    }
}

#[async_trait]
impl SourceAdapter for TenantsAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Tenants
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        _query: &str,
        _filters: &RetrievalFilters,
        limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let tenants = self.db.list_tenants(organization_id, None, limit)?;
        tenants.iter().map(|t| self.tenant_to_item(t)).collect()
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let tenant = &item.data["tenant"];

        let mut formatted = format!(
            "# Tenant: {name}\n\n\
             ## Identity\n\
             - **Type**: {ttype}\n\
             - **Email**: {email}\n\
             - **Phone**: {phone}\n\
             - **Profession**: {profession}\n\
             - **Monthly income**: {income}\n\
             - **Household size**: {household}\n\n\
             ## Guarantor\n\
             - **Name**: {guarantor}\n\
             - **Contact**: {guarantor_contact}\n",
            name = item.title,
            ttype = text_field(tenant, "tenant_type"),
            email = text_field(tenant, "email"),
            phone = text_field(tenant, "phone"),
            profession = text_field(tenant, "profession"),
            income = tenant
                .get("monthly_income")
                .and_then(|v| v.as_f64())
                .map(|i| format!("{:.0}", i))
                .unwrap_or_else(|| "N/A".to_string()),
            household = tenant
                .get("household_size")
                .and_then(|v| v.as_u64())
                .map(|h| h.to_string())
                .unwrap_or_else(|| "N/A".to_string()),
            guarantor = text_field(tenant, "guarantor_name"),
            guarantor_contact = text_field(tenant, "guarantor_contact"),
        );

        if let Some(leases) = item.data["leases"].as_array() {
            if !leases.is_empty() {
                let total_rent: f64 = leases
                    .iter()
                    .map(|e| num_field(&e["lease"], "monthly_rent") + num_field(&e["lease"], "charges"))
                    .sum();
                formatted.push_str(&format!("\n## Current Rentals ({})\n", leases.len()));
                for (i, entry) in leases.iter().enumerate() {
                    let lease = &entry["lease"];
                    let property = &entry["property"];
                    formatted.push_str(&format!(
                        "\n### Rental {n}\n\
                         - **Property**: {pname}\n\
                         - **Address**: {address}, {postal} {city}\n\
                         - **Surface**: {surface:.0} m²\n\
                         - **Monthly rent**: {rent:.0} (+ {charges:.0} charges)\n",
                        n = i + 1,
                        pname = text_field(property, "name"),
                        address = text_field(property, "address"),
                        postal = text_field(property, "postal_code"),
                        city = text_field(property, "city"),
                        surface = num_field(property, "surface_area"),
                        rent = num_field(lease, "monthly_rent"),
                        charges = num_field(lease, "charges"),
                    ));
                }
                formatted.push_str(&format!(
                    "\n**Total monthly payment**: {:.0}\n",
                    total_rent
                ));
            }
        }

        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
