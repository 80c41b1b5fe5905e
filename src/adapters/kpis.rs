//! KPI adapter.
//!
//! Structurally different from the other adapters: instead of searching an
//! index it recomputes a full portfolio aggregate (occupancy, gross yield,
//! expiring leases, revenue) from current relational data on every call.
//! A live, comparatively expensive aggregation folded into the same result
//! abstraction as the others.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::Database;
use crate::types::{RetrievalFilters, SourceType};

use super::{num_field, truncate_to_token_budget, SourceAdapter, SourceItem, TOKEN_BUDGET};

/// Fetch enough records to aggregate the whole portfolio
const AGGREGATION_FETCH_LIMIT: usize = 10_000;

pub struct KpisAdapter {
    db: Arc<Database>,
}

impl KpisAdapter {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn compute_report(&self, organization_id: Uuid) -> Result<serde_json::Value> {
        let now = Utc::now();
        let properties = self
            .db
            .list_properties(organization_id, None, AGGREGATION_FETCH_LIMIT)?;
        let leases = self
            .db
            .list_leases(organization_id, None, AGGREGATION_FETCH_LIMIT)?;
        let tenants = self
            .db
            .list_tenants(organization_id, None, AGGREGATION_FETCH_LIMIT)?;

        let total_properties = properties.len();
        let active_leases: Vec<_> = leases.iter().filter(|l| l.is_active(now)).collect();

        let occupied: HashSet<Uuid> = active_leases.iter().map(|l| l.property_id).collect();
        let occupied_properties = occupied.len();
        let vacant_properties = total_properties.saturating_sub(occupied_properties);
        let occupancy_rate = if total_properties > 0 {
            occupied_properties as f64 / total_properties as f64 * 100.0
        } else {
            0.0
        };

        let monthly_rent: f64 = active_leases.iter().map(|l| l.monthly_rent).sum();
        let monthly_charges: f64 = active_leases.iter().map(|l| l.charges).sum();
        let monthly_revenue = monthly_rent + monthly_charges;
        let annual_revenue = monthly_revenue * 12.0;

        let portfolio_value: f64 = properties.iter().map(|p| p.estimated_value).sum();
        let gross_yield = if portfolio_value > 0.0 {
            annual_revenue / portfolio_value * 100.0
        } else {
            0.0
        };

        let horizon = now + Duration::days(90);
        let expiring: Vec<_> = active_leases
            .iter()
            .filter(|l| l.end_date.is_some_and(|end| end <= horizon))
            .collect();

        let mut property_types: BTreeMap<String, usize> = BTreeMap::new();
        for property in &properties {
            *property_types.entry(property.property_type.clone()).or_default() += 1;
        }

        let avg_rent = if active_leases.is_empty() {
            0.0
        } else {
            monthly_rent / active_leases.len() as f64
        };
        let total_surface: f64 = properties.iter().map(|p| p.surface_area).sum();
        let avg_price_per_sqm = if total_surface > 0.0 {
            portfolio_value / total_surface
        } else {
            0.0
        };

        let individuals = tenants.iter().filter(|t| t.tenant_type == "individual").count();

        Ok(json!({
            "generated_at": now.to_rfc3339(),
            "portfolio": {
                "total_properties": total_properties,
                "occupied_properties": occupied_properties,
                "vacant_properties": vacant_properties,
                "occupancy_rate": occupancy_rate,
                "total_surface": total_surface,
                "total_value": portfolio_value,
                "avg_price_per_sqm": avg_price_per_sqm,
                "property_types": property_types,
            },
            "financial": {
                "monthly_rent": monthly_rent,
                "monthly_charges": monthly_charges,
                "monthly_revenue": monthly_revenue,
                "annual_revenue": annual_revenue,
                "gross_yield": gross_yield,
                "avg_rent": avg_rent,
            },
            "leases": {
                "total_active": active_leases.len(),
                "expiring_soon": expiring.len(),
                "expiring_details": expiring
                    .iter()
                    .map(|l| json!({
                        "lease_id": l.id,
                        "end_date": l.end_date,
                        "monthly_rent": l.monthly_rent,
                    }))
                    .collect::<Vec<_>>(),
            },
            "tenants": {
                "total": tenants.len(),
                "individuals": individuals,
                "companies": tenants.len() - individuals,
            },
        }))
    }
}

fn occupancy_assessment(rate: f64) -> &'static str {
    if rate >= 95.0 {
        "Excellent - portfolio nearly fully occupied"
    } else if rate >= 85.0 {
        "Good - satisfactory occupancy"
    } else if rate >= 70.0 {
        "Average - room for improvement"
    } else {
        "Low - attention required"
    }
}

fn yield_assessment(gross_yield: f64) -> &'static str {
    if gross_yield >= 6.0 {
        "Excellent - very attractive yield"
    } else if gross_yield >= 4.0 {
        "Good - satisfactory yield"
    } else if gross_yield >= 2.0 {
        "Average - moderate yield"
    } else {
        "Low - yield needs improvement"
    }
}

#[async_trait]
impl SourceAdapter for KpisAdapter {
    fn source_type(&self) -> SourceType {
        SourceType::Kpis
    }

    async fn fetch(
        &self,
        organization_id: Uuid,
        _query: &str,
        _filters: &RetrievalFilters,
        _limit: usize,
    ) -> Result<Vec<SourceItem>> {
        let report = self.compute_report(organization_id)?;
        Ok(vec![SourceItem {
            // One comprehensive report per call, under a stable id
            id: "kpis-report".to_string(),
            title: "Portfolio KPI report".to_string(),
            data: report,
            score: 1.0,
        }])
    }

    fn format_for_llm(&self, item: &SourceItem) -> String {
        let portfolio = &item.data["portfolio"];
        let financial = &item.data["financial"];
        let leases = &item.data["leases"];
        let tenants = &item.data["tenants"];

        let occupancy_rate = num_field(portfolio, "occupancy_rate");
        let gross_yield = num_field(financial, "gross_yield");
        let vacant = num_field(portfolio, "vacant_properties") as usize;
        let expiring = num_field(leases, "expiring_soon") as usize;

        let mut formatted = format!(
            "# Portfolio KPI Report\n\n\
             **Generated at**: {generated}\n\n\
             ## Portfolio\n\
             - **Total properties**: {total}\n\
             - **Occupied**: {occupied}\n\
             - **Vacant**: {vacant}\n\
             - **Occupancy rate**: {occupancy:.1}%\n\
             - **Total surface**: {surface:.0} m²\n\
             - **Portfolio value**: {value:.0}\n\
             - **Average price per m²**: {sqm:.0}\n",
            generated = item.data["generated_at"].as_str().unwrap_or("N/A"),
            total = num_field(portfolio, "total_properties") as usize,
            occupied = num_field(portfolio, "occupied_properties") as usize,
            vacant = vacant,
            occupancy = occupancy_rate,
            surface = num_field(portfolio, "total_surface"),
            value = num_field(portfolio, "total_value"),
            sqm = num_field(portfolio, "avg_price_per_sqm"),
        );

        if let Some(types) = portfolio["property_types"].as_object() {
            if !types.is_empty() {
                formatted.push_str("\n### Property types\n");
                for (ptype, count) in types {
                    formatted.push_str(&format!("- **{}**: {}\n", ptype, count));
                }
            }
        }

        formatted.push_str(&format!(
            "\n## Financials\n\
             - **Monthly rent**: {rent:.0}\n\
             - **Monthly charges**: {charges:.0}\n\
             - **Monthly revenue**: {revenue:.0}\n\
             - **Annual revenue**: {annual:.0}\n\
             - **Gross yield**: {gross:.2}%\n\
             - **Average rent**: {avg:.0}\n\n\
             ## Leases\n\
             - **Active leases**: {active}\n\
             - **Expiring within 90 days**: {expiring}\n",
            rent = num_field(financial, "monthly_rent"),
            charges = num_field(financial, "monthly_charges"),
            revenue = num_field(financial, "monthly_revenue"),
            annual = num_field(financial, "annual_revenue"),
            gross = gross_yield,
            avg = num_field(financial, "avg_rent"),
            active = num_field(leases, "total_active") as usize,
            expiring = expiring,
        ));

        if let Some(details) = leases["expiring_details"].as_array() {
            if !details.is_empty() {
                formatted.push_str("\n### Leases to renew soon\n");
                for lease in details {
                    formatted.push_str(&format!(
                        "- Lease {}: expires {} (rent {:.0})\n",
                        lease["lease_id"].as_str().unwrap_or("?"),
                        lease["end_date"].as_str().unwrap_or("?"),
                        num_field(lease, "monthly_rent"),
                    ));
                }
            }
        }

        formatted.push_str(&format!(
            "\n## Tenants\n\
             - **Total**: {total}\n\
             - **Individuals**: {individuals}\n\
             - **Companies**: {companies}\n\n\
             ## Assessment\n\
             - **Occupancy**: {occupancy_note} ({occupancy:.1}%)\n\
             - **Yield**: {yield_note} ({gross:.2}%)\n",
            total = num_field(tenants, "total") as usize,
            individuals = num_field(tenants, "individuals") as usize,
            companies = num_field(tenants, "companies") as usize,
            occupancy_note = occupancy_assessment(occupancy_rate),
            occupancy = occupancy_rate,
            yield_note = yield_assessment(gross_yield),
            gross = gross_yield,
        ));

        let mut recommendations = Vec::new();
        if vacant > 0 {
            recommendations.push(format!(
                "- **Vacancy**: {} vacant propertie(s) - prioritize finding tenants",
                vacant
            ));
        }
        if expiring > 0 {
            recommendations.push(format!(
                "- **Renewals**: {} lease(s) expiring within 90 days - start negotiations early",
                expiring
            ));
        }
        if occupancy_rate < 85.0 {
            recommendations.push(format!(
                "- **Occupancy**: {:.1}% occupancy - consider marketing actions",
                occupancy_rate
            ));
        }
        if gross_yield < 4.0 {
            recommendations.push(format!(
                "- **Profitability**: {:.2}% gross yield - review rent levels",
                gross_yield
            ));
        }
        if recommendations.is_empty() {
            recommendations.push("- **Healthy portfolio** - keep up the current management".to_string());
        }

        formatted.push_str("\n## Recommendations\n");
        for recommendation in recommendations {
            formatted.push_str(&recommendation);
            formatted.push('\n');
        }

        truncate_to_token_budget(&formatted, TOKEN_BUDGET)
    }
}
