//! SQLite metadata store.
//!
//! Holds document records (the vectorization pipeline's source of truth),
//! vectorization jobs, the relational records the source adapters read, and
//! persisted chat turns.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{
    Document, JobStatus, Lease, Owner, Property, SourceType, Tenant, VectorizationJob,
    VectorizationStatus,
};

/// SQLite-backed metadata store
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| Error::Database(format!("Failed to open database: {}", e)))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// In-memory database for tests and local experiments
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("Failed to open in-memory database: {}", e)))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
        "#,
        )?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                content TEXT NOT NULL,
                content_hash TEXT,
                vectorization_status TEXT NOT NULL DEFAULT 'not_planned',
                vectorization_error TEXT,
                chunk_count INTEGER NOT NULL DEFAULT 0,
                collection_name TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                vectorization_started_at TEXT,
                vectorization_completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_documents_org ON documents(organization_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status ON documents(vectorization_status);

            CREATE TABLE IF NOT EXISTS vectorization_jobs (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                status TEXT NOT NULL,
                chunks_total INTEGER NOT NULL DEFAULT 0,
                chunks_processed INTEGER NOT NULL DEFAULT 0,
                error TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_jobs_document ON vectorization_jobs(document_id);
            CREATE INDEX IF NOT EXISTS idx_jobs_org ON vectorization_jobs(organization_id);

            CREATE TABLE IF NOT EXISTS properties (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                owner_id TEXT,
                name TEXT NOT NULL,
                property_type TEXT NOT NULL,
                address TEXT NOT NULL,
                city TEXT NOT NULL,
                postal_code TEXT NOT NULL,
                country TEXT NOT NULL,
                surface_area REAL NOT NULL DEFAULT 0,
                estimated_value REAL NOT NULL DEFAULT 0,
                rooms INTEGER,
                floor INTEGER,
                has_elevator INTEGER NOT NULL DEFAULT 0,
                has_parking INTEGER NOT NULL DEFAULT 0,
                has_balcony INTEGER NOT NULL DEFAULT 0,
                condition TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_properties_org ON properties(organization_id);

            CREATE TABLE IF NOT EXISTS leases (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                property_id TEXT NOT NULL,
                tenant_id TEXT NOT NULL,
                lease_type TEXT NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                monthly_rent REAL NOT NULL DEFAULT 0,
                charges REAL NOT NULL DEFAULT 0,
                deposit REAL NOT NULL DEFAULT 0,
                indexation_rate REAL
            );
            CREATE INDEX IF NOT EXISTS idx_leases_org ON leases(organization_id);
            CREATE INDEX IF NOT EXISTS idx_leases_property ON leases(property_id);
            CREATE INDEX IF NOT EXISTS idx_leases_tenant ON leases(tenant_id);

            CREATE TABLE IF NOT EXISTS tenants (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                tenant_type TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                profession TEXT,
                monthly_income REAL,
                household_size INTEGER,
                guarantor_name TEXT,
                guarantor_contact TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tenants_org ON tenants(organization_id);

            CREATE TABLE IF NOT EXISTS owners (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                name TEXT NOT NULL,
                owner_type TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                address TEXT,
                city TEXT,
                postal_code TEXT,
                country TEXT,
                company_number TEXT,
                legal_form TEXT,
                legal_representative TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_owners_org ON owners(organization_id);

            CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                citations TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
                ON chat_messages(conversation_id);
        "#,
        )?;

        Ok(())
    }

    // -----------------------------------------------------------------------
    // Documents
    // -----------------------------------------------------------------------

    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO documents (
                id, organization_id, title, category, content, content_hash,
                vectorization_status, vectorization_error, chunk_count,
                collection_name, created_at, updated_at,
                vectorization_started_at, vectorization_completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"#,
            params![
                doc.id.to_string(),
                doc.organization_id.to_string(),
                doc.title,
                doc.category.as_str(),
                doc.content,
                doc.content_hash,
                doc.vectorization_status.as_str(),
                doc.vectorization_error,
                doc.chunk_count,
                doc.collection_name,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
                doc.vectorization_started_at.map(|t| t.to_rfc3339()),
                doc.vectorization_completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM documents WHERE id = ?1",
            params![id.to_string()],
            row_to_document,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn mark_vectorization_started(&self, id: Uuid) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            r#"UPDATE documents SET
                vectorization_status = 'in_progress',
                vectorization_error = NULL,
                vectorization_started_at = ?2,
                updated_at = ?2
            WHERE id = ?1"#,
            params![id.to_string(), now],
        )?;
        Ok(())
    }

    pub fn mark_vectorized(
        &self,
        id: Uuid,
        content_hash: &str,
        chunk_count: u32,
        collection_name: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            r#"UPDATE documents SET
                vectorization_status = 'vectorized',
                vectorization_error = NULL,
                content_hash = ?2,
                chunk_count = ?3,
                collection_name = ?4,
                vectorization_completed_at = ?5,
                updated_at = ?5
            WHERE id = ?1"#,
            params![id.to_string(), content_hash, chunk_count, collection_name, now],
        )?;
        Ok(())
    }

    pub fn mark_vectorization_error(&self, id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            r#"UPDATE documents SET
                vectorization_status = 'error',
                vectorization_error = ?2,
                vectorization_completed_at = ?3,
                updated_at = ?3
            WHERE id = ?1"#,
            params![id.to_string(), error, now],
        )?;
        Ok(())
    }

    pub fn mark_vectors_deleted(&self, id: Uuid) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            r#"UPDATE documents SET
                vectorization_status = 'not_planned',
                chunk_count = 0,
                updated_at = ?2
            WHERE id = ?1"#,
            params![id.to_string(), now],
        )?;
        Ok(())
    }

    /// Document counts grouped by vectorization status
    pub fn document_status_counts(
        &self,
        organization_id: Uuid,
    ) -> Result<std::collections::BTreeMap<String, usize>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT vectorization_status, COUNT(*) FROM documents
               WHERE organization_id = ?1 GROUP BY vectorization_status"#,
        )?;
        let mut counts = std::collections::BTreeMap::new();
        let rows = stmt.query_map(params![organization_id.to_string()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            counts.insert(status, count as usize);
        }
        Ok(counts)
    }

    // -----------------------------------------------------------------------
    // Vectorization jobs
    // -----------------------------------------------------------------------

    pub fn insert_job(&self, job: &VectorizationJob) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO vectorization_jobs (
                id, document_id, organization_id, status, chunks_total,
                chunks_processed, error, created_at, started_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"#,
            params![
                job.id.to_string(),
                job.document_id.to_string(),
                job.organization_id.to_string(),
                job.status.as_str(),
                job.chunks_total,
                job.chunks_processed,
                job.error,
                job.created_at.to_rfc3339(),
                job.started_at.map(|t| t.to_rfc3339()),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn update_job(&self, job: &VectorizationJob) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"UPDATE vectorization_jobs SET
                status = ?2, chunks_total = ?3, chunks_processed = ?4,
                error = ?5, started_at = ?6, completed_at = ?7
            WHERE id = ?1"#,
            params![
                job.id.to_string(),
                job.status.as_str(),
                job.chunks_total,
                job.chunks_processed,
                job.error,
                job.started_at.map(|t| t.to_rfc3339()),
                job.completed_at.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn get_job(&self, id: Uuid) -> Result<Option<VectorizationJob>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM vectorization_jobs WHERE id = ?1",
            params![id.to_string()],
            row_to_job,
        )
        .optional()
        .map_err(Into::into)
    }

    // -----------------------------------------------------------------------
    // Relational records
    // -----------------------------------------------------------------------

    pub fn insert_property(&self, property: &Property) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO properties (
                id, organization_id, owner_id, name, property_type, address,
                city, postal_code, country, surface_area, estimated_value,
                rooms, floor, has_elevator, has_parking, has_balcony, condition
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"#,
            params![
                property.id.to_string(),
                property.organization_id.to_string(),
                property.owner_id.map(|id| id.to_string()),
                property.name,
                property.property_type,
                property.address,
                property.city,
                property.postal_code,
                property.country,
                property.surface_area,
                property.estimated_value,
                property.rooms,
                property.floor,
                property.has_elevator,
                property.has_parking,
                property.has_balcony,
                property.condition,
            ],
        )?;
        Ok(())
    }

    pub fn insert_lease(&self, lease: &Lease) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO leases (
                id, organization_id, property_id, tenant_id, lease_type,
                start_date, end_date, monthly_rent, charges, deposit,
                indexation_rate
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                lease.id.to_string(),
                lease.organization_id.to_string(),
                lease.property_id.to_string(),
                lease.tenant_id.to_string(),
                lease.lease_type,
                lease.start_date.to_rfc3339(),
                lease.end_date.map(|t| t.to_rfc3339()),
                lease.monthly_rent,
                lease.charges,
                lease.deposit,
                lease.indexation_rate,
            ],
        )?;
        Ok(())
    }

    pub fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO tenants (
                id, organization_id, name, tenant_type, email, phone,
                profession, monthly_income, household_size, guarantor_name,
                guarantor_contact
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            params![
                tenant.id.to_string(),
                tenant.organization_id.to_string(),
                tenant.name,
                tenant.tenant_type,
                tenant.email,
                tenant.phone,
                tenant.profession,
                tenant.monthly_income,
                tenant.household_size,
                tenant.guarantor_name,
                tenant.guarantor_contact,
            ],
        )?;
        Ok(())
    }

    pub fn insert_owner(&self, owner: &Owner) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO owners (
                id, organization_id, name, owner_type, email, phone, address,
                city, postal_code, country, company_number, legal_form,
                legal_representative
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"#,
            params![
                owner.id.to_string(),
                owner.organization_id.to_string(),
                owner.name,
                owner.owner_type,
                owner.email,
                owner.phone,
                owner.address,
                owner.city,
                owner.postal_code,
                owner.country,
                owner.company_number,
                owner.legal_form,
                owner.legal_representative,
            ],
        )?;
        Ok(())
    }

    pub fn list_properties(
        &self,
        organization_id: Uuid,
        ids: Option<&[Uuid]>,
        limit: usize,
    ) -> Result<Vec<Property>> {
        self.list_records("properties", organization_id, ids, limit, row_to_property)
    }

    pub fn list_leases(
        &self,
        organization_id: Uuid,
        ids: Option<&[Uuid]>,
        limit: usize,
    ) -> Result<Vec<Lease>> {
        self.list_records("leases", organization_id, ids, limit, row_to_lease)
    }

    pub fn list_tenants(
        &self,
        organization_id: Uuid,
        ids: Option<&[Uuid]>,
        limit: usize,
    ) -> Result<Vec<Tenant>> {
        self.list_records("tenants", organization_id, ids, limit, row_to_tenant)
    }

    pub fn list_owners(
        &self,
        organization_id: Uuid,
        ids: Option<&[Uuid]>,
        limit: usize,
    ) -> Result<Vec<Owner>> {
        self.list_records("owners", organization_id, ids, limit, row_to_owner)
    }

    fn list_records<T>(
        &self,
        table: &str,
        organization_id: Uuid,
        ids: Option<&[Uuid]>,
        limit: usize,
        mapper: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Vec<T>> {
        let conn = self.conn.lock();
        let mut values: Vec<String> = vec![organization_id.to_string()];

        let sql = match ids {
            Some(ids) if !ids.is_empty() => {
                let placeholders = (2..ids.len() + 2)
                    .map(|i| format!("?{}", i))
                    .collect::<Vec<_>>()
                    .join(", ");
                values.extend(ids.iter().map(|id| id.to_string()));
                format!(
                    "SELECT * FROM {} WHERE organization_id = ?1 AND id IN ({}) LIMIT {}",
                    table, placeholders, limit
                )
            }
            _ => format!(
                "SELECT * FROM {} WHERE organization_id = ?1 LIMIT {}",
                table, limit
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), mapper)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    pub fn leases_for_property(&self, property_id: Uuid) -> Result<Vec<Lease>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM leases WHERE property_id = ?1")?;
        let rows = stmt.query_map(params![property_id.to_string()], row_to_lease)?;
        let mut leases = Vec::new();
        for row in rows {
            leases.push(row?);
        }
        Ok(leases)
    }

    pub fn leases_for_tenant(&self, tenant_id: Uuid) -> Result<Vec<Lease>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM leases WHERE tenant_id = ?1")?;
        let rows = stmt.query_map(params![tenant_id.to_string()], row_to_lease)?;
        let mut leases = Vec::new();
        for row in rows {
            leases.push(row?);
        }
        Ok(leases)
    }

    pub fn properties_for_owner(&self, owner_id: Uuid) -> Result<Vec<Property>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT * FROM properties WHERE owner_id = ?1")?;
        let rows = stmt.query_map(params![owner_id.to_string()], row_to_property)?;
        let mut properties = Vec::new();
        for row in rows {
            properties.push(row?);
        }
        Ok(properties)
    }

    pub fn get_property(&self, id: Uuid) -> Result<Option<Property>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM properties WHERE id = ?1",
            params![id.to_string()],
            row_to_property,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT * FROM tenants WHERE id = ?1",
            params![id.to_string()],
            row_to_tenant,
        )
        .optional()
        .map_err(Into::into)
    }

    // -----------------------------------------------------------------------
    // Chat persistence
    // -----------------------------------------------------------------------

    pub fn insert_chat_message(
        &self,
        conversation_id: Uuid,
        role: &str,
        content: &str,
        citations: &serde_json::Value,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let conn = self.conn.lock();
        conn.execute(
            r#"INSERT INTO chat_messages (id, conversation_id, role, content, citations, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![
                id.to_string(),
                conversation_id.to_string(),
                role,
                content,
                citations.to_string(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(id)
    }

    /// Conversation history as (role, content) pairs, oldest first
    pub fn conversation_history(
        &self,
        conversation_id: Uuid,
        limit: usize,
    ) -> Result<Vec<(String, String)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            r#"SELECT role, content FROM chat_messages
               WHERE conversation_id = ?1 ORDER BY created_at LIMIT ?2"#,
        )?;
        let rows = stmt.query_map(params![conversation_id.to_string(), limit], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut history = Vec::new();
        for row in rows {
            history.push(row?);
        }
        Ok(history)
    }
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn get_uuid(row: &Row<'_>, column: &str) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(column)?;
    Uuid::parse_str(&raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn get_opt_uuid(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        Uuid::parse_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

fn get_time(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn get_opt_time(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let category: String = row.get("category")?;
    let status: String = row.get("vectorization_status")?;
    Ok(Document {
        id: get_uuid(row, "id")?,
        organization_id: get_uuid(row, "organization_id")?,
        title: row.get("title")?,
        category: SourceType::parse(&category).unwrap_or(SourceType::Documents),
        content: row.get("content")?,
        content_hash: row.get("content_hash")?,
        vectorization_status: VectorizationStatus::parse(&status),
        vectorization_error: row.get("vectorization_error")?,
        chunk_count: row.get("chunk_count")?,
        collection_name: row.get("collection_name")?,
        created_at: get_time(row, "created_at")?,
        updated_at: get_time(row, "updated_at")?,
        vectorization_started_at: get_opt_time(row, "vectorization_started_at")?,
        vectorization_completed_at: get_opt_time(row, "vectorization_completed_at")?,
    })
}

fn row_to_job(row: &Row<'_>) -> rusqlite::Result<VectorizationJob> {
    let status: String = row.get("status")?;
    Ok(VectorizationJob {
        id: get_uuid(row, "id")?,
        document_id: get_uuid(row, "document_id")?,
        organization_id: get_uuid(row, "organization_id")?,
        status: JobStatus::parse(&status),
        chunks_total: row.get("chunks_total")?,
        chunks_processed: row.get("chunks_processed")?,
        error: row.get("error")?,
        created_at: get_time(row, "created_at")?,
        started_at: get_opt_time(row, "started_at")?,
        completed_at: get_opt_time(row, "completed_at")?,
    })
}

fn row_to_property(row: &Row<'_>) -> rusqlite::Result<Property> {
    Ok(Property {
        id: get_uuid(row, "id")?,
        organization_id: get_uuid(row, "organization_id")?,
        owner_id: get_opt_uuid(row, "owner_id")?,
        name: row.get("name")?,
        property_type: row.get("property_type")?,
        address: row.get("address")?,
        city: row.get("city")?,
        postal_code: row.get("postal_code")?,
        country: row.get("country")?,
        surface_area: row.get("surface_area")?,
        estimated_value: row.get("estimated_value")?,
        rooms: row.get("rooms")?,
        floor: row.get("floor")?,
        has_elevator: row.get("has_elevator")?,
        has_parking: row.get("has_parking")?,
        has_balcony: row.get("has_balcony")?,
        condition: row.get("condition")?,
    })
}

fn row_to_lease(row: &Row<'_>) -> rusqlite::Result<Lease> {
    Ok(Lease {
        id: get_uuid(row, "id")?,
        organization_id: get_uuid(row, "organization_id")?,
        property_id: get_uuid(row, "property_id")?,
        tenant_id: get_uuid(row, "tenant_id")?,
        lease_type: row.get("lease_type")?,
        start_date: get_time(row, "start_date")?,
        end_date: get_opt_time(row, "end_date")?,
        monthly_rent: row.get("monthly_rent")?,
        charges: row.get("charges")?,
        deposit: row.get("deposit")?,
        indexation_rate: row.get("indexation_rate")?,
    })
}

fn row_to_tenant(row: &Row<'_>) -> rusqlite::Result<Tenant> {
    Ok(Tenant {
        id: get_uuid(row, "id")?,
        organization_id: get_uuid(row, "organization_id")?,
        name: row.get("name")?,
        tenant_type: row.get("tenant_type")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        profession: row.get("profession")?,
        monthly_income: row.get("monthly_income")?,
        household_size: row.get("household_size")?,
        guarantor_name: row.get("guarantor_name")?,
        guarantor_contact: row.get("guarantor_contact")?,
    })
}

fn row_to_owner(row: &Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: get_uuid(row, "id")?,
        organization_id: get_uuid(row, "organization_id")?,
        name: row.get("name")?,
        owner_type: row.get("owner_type")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
        address: row.get("address")?,
        city: row.get("city")?,
        postal_code: row.get("postal_code")?,
        country: row.get("country")?,
        company_number: row.get("company_number")?,
        legal_form: row.get("legal_form")?,
        legal_representative: row.get("legal_representative")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_round_trip_with_status_updates() {
        let db = Database::in_memory().unwrap();
        let org = Uuid::new_v4();
        let doc = Document::new(org, "Lease agreement", SourceType::Documents, "rent is 1500");
        db.insert_document(&doc).unwrap();

        db.mark_vectorization_started(doc.id).unwrap();
        let loaded = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded.vectorization_status, VectorizationStatus::InProgress);
        assert!(loaded.vectorization_started_at.is_some());

        db.mark_vectorized(doc.id, "abc123", 4, "org_x_documents").unwrap();
        let loaded = db.get_document(doc.id).unwrap().unwrap();
        assert_eq!(loaded.vectorization_status, VectorizationStatus::Vectorized);
        assert_eq!(loaded.content_hash.as_deref(), Some("abc123"));
        assert_eq!(loaded.chunk_count, 4);

        let counts = db.document_status_counts(org).unwrap();
        assert_eq!(counts.get("vectorized"), Some(&1));
    }

    #[test]
    fn record_listing_honors_id_filter_and_limit() {
        let db = Database::in_memory().unwrap();
        let org = Uuid::new_v4();
        let mut ids = Vec::new();
        for i in 0..5 {
            let tenant = Tenant {
                id: Uuid::new_v4(),
                organization_id: org,
                name: format!("Tenant {}", i),
                tenant_type: "individual".into(),
                email: None,
                phone: None,
                profession: None,
                monthly_income: None,
                household_size: None,
                guarantor_name: None,
                guarantor_contact: None,
            };
            ids.push(tenant.id);
            db.insert_tenant(&tenant).unwrap();
        }

        assert_eq!(db.list_tenants(org, None, 10).unwrap().len(), 5);
        assert_eq!(db.list_tenants(org, None, 2).unwrap().len(), 2);
        assert_eq!(db.list_tenants(org, Some(&ids[..2]), 10).unwrap().len(), 2);
        // Foreign organization sees nothing
        assert!(db.list_tenants(Uuid::new_v4(), None, 10).unwrap().is_empty());
    }

    #[test]
    fn conversation_history_round_trips() {
        let db = Database::in_memory().unwrap();
        let conversation = Uuid::new_v4();
        db.insert_chat_message(conversation, "user", "hello", &serde_json::json!([]))
            .unwrap();
        db.insert_chat_message(conversation, "assistant", "hi", &serde_json::json!([]))
            .unwrap();
        let history = db.conversation_history(conversation, 50).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], ("user".to_string(), "hello".to_string()));
    }
}
