//! Patient contact lookup: Firemetrics PostgreSQL or the demo fixture table

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, warn};

use super::BackendMode;
use crate::config::FiremetricsConfig;
use crate::error::IntegrationError;
use crate::fixtures::find_patient;

pub const DEMO_NOTE: &str = "Using demo data - set FIREMETRICS_* env vars for real connection";

/// Contact details for one patient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    pub patient_id: String,
    pub preferred_name: Option<String>,
    pub phone_number: Option<String>,
    pub preferred_language: Option<String>,
    pub best_contact_time: Option<String>,
    pub mode: BackendMode,
}

#[async_trait]
pub trait PatientDirectory: Send + Sync {
    fn mode(&self) -> BackendMode;

    /// `Ok(None)` when no patient has this id
    async fn get(&self, patient_id: &str) -> Result<Option<PatientRecord>, IntegrationError>;
}

#[derive(Debug, Clone, Default)]
pub struct MockPatientStore;

#[async_trait]
impl PatientDirectory for MockPatientStore {
    fn mode(&self) -> BackendMode {
        BackendMode::Demo
    }

    async fn get(&self, patient_id: &str) -> Result<Option<PatientRecord>, IntegrationError> {
        Ok(find_patient(patient_id).map(|p| PatientRecord {
            patient_id: p.patient_id.to_string(),
            preferred_name: Some(p.preferred_name.to_string()),
            phone_number: Some(p.phone_number.to_string()),
            preferred_language: Some(p.preferred_language.to_string()),
            best_contact_time: Some(p.best_contact_time.to_string()),
            mode: BackendMode::Demo,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PatientRow {
    id: String,
    preferred_name: Option<String>,
    phone_number: Option<String>,
    preferred_language: Option<String>,
}

/// Live lookup against the FHIR `patient` table in Firemetrics.
///
/// The pool connects lazily, so a server with an unreachable database still
/// starts and reports the failure per call.
#[derive(Debug, Clone)]
pub struct FiremetricsStore {
    pool: Result<PgPool, String>,
}

impl FiremetricsStore {
    pub fn new(config: &FiremetricsConfig) -> Self {
        let pool = Self::lazy_pool(config);
        if let Err(reason) = &pool {
            warn!(%reason, "Firemetrics adapter is incomplete; lookups will fail");
        }
        Self { pool }
    }

    fn lazy_pool(config: &FiremetricsConfig) -> Result<PgPool, String> {
        let host = config
            .host
            .as_deref()
            .ok_or_else(|| "FIREMETRICS_DB_HOST must be set".to_string())?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(config.port)
            .database(&config.database);
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }

        Ok(PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options))
    }
}

#[async_trait]
impl PatientDirectory for FiremetricsStore {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn get(&self, patient_id: &str) -> Result<Option<PatientRecord>, IntegrationError> {
        let pool = self
            .pool
            .as_ref()
            .map_err(|reason| IntegrationError::Misconfigured(reason.clone()))?;
        debug!(patient_id = %patient_id, "Looking up patient in Firemetrics");

        let row = sqlx::query_as::<_, PatientRow>(
            r#"
            SELECT
                p.id::text AS id,
                p.name->0->'given'->>0 AS preferred_name,
                t.phone AS phone_number,
                COALESCE(
                    p.communication->0->'language'->'coding'->0->>'display',
                    'English'
                ) AS preferred_language
            FROM patient p
            LEFT JOIN LATERAL (
                SELECT elem->>'value' AS phone
                FROM jsonb_array_elements(COALESCE(p.telecom, '[]'::jsonb)) elem
                WHERE elem->>'system' = 'phone'
                LIMIT 1
            ) t ON true
            WHERE p.id::text = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|row| PatientRecord {
            patient_id: row.id,
            preferred_name: row.preferred_name,
            phone_number: row.phone_number,
            preferred_language: row.preferred_language,
            best_contact_time: None,
            mode: BackendMode::Live,
        }))
    }
}
