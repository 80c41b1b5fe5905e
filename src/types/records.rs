//! Relational records the source adapters fetch and format.
//!
//! These mirror what the upstream application manages; the RAG system only
//! reads them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A property in the portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub owner_id: Option<Uuid>,
    pub name: String,
    pub property_type: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub surface_area: f64,
    pub estimated_value: f64,
    pub rooms: Option<u32>,
    pub floor: Option<i32>,
    pub has_elevator: bool,
    pub has_parking: bool,
    pub has_balcony: bool,
    pub condition: Option<String>,
}

/// A lease contract linking a tenant to a property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lease {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub property_id: Uuid,
    pub tenant_id: Uuid,
    /// "residential" or "commercial"
    pub lease_type: String,
    pub start_date: DateTime<Utc>,
    /// Open-ended leases have no end date
    pub end_date: Option<DateTime<Utc>>,
    pub monthly_rent: f64,
    pub charges: f64,
    pub deposit: f64,
    pub indexation_rate: Option<f64>,
}

impl Lease {
    /// A lease is active when it has no end date or the end date is in the
    /// future.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.end_date.map_or(true, |end| end > now)
    }
}

/// A tenant (individual or company)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// "individual" or "company"
    pub tenant_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub profession: Option<String>,
    pub monthly_income: Option<f64>,
    pub household_size: Option<u32>,
    pub guarantor_name: Option<String>,
    pub guarantor_contact: Option<String>,
}

/// A property owner (individual or company)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    /// "individual" or "company"
    pub owner_type: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub company_number: Option<String>,
    pub legal_form: Option<String>,
    pub legal_representative: Option<String>,
}
