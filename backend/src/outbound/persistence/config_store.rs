//! Program configuration persistence.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde_json::Value;

use crate::domain::StoreError;

use super::error::map_diesel_error;
use super::models::NewProgramConfigRow;
use super::schema::program_configs;

/// Fetch the configuration document for `(tenant, program_id)`.
pub async fn get(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    program_id: &str,
) -> Result<Option<Value>, StoreError> {
    program_configs::table
        .filter(program_configs::tenant.eq(tenant))
        .filter(program_configs::program_id.eq(program_id))
        .select(program_configs::config)
        .first(conn)
        .await
        .optional()
        .map_err(map_diesel_error)
}

/// Upsert the configuration document.
pub async fn put(
    conn: &mut AsyncPgConnection,
    tenant: &str,
    program_id: &str,
    config: &Value,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    diesel::insert_into(program_configs::table)
        .values(&NewProgramConfigRow {
            tenant,
            program_id,
            config,
            updated_at: now,
        })
        .on_conflict((program_configs::tenant, program_configs::program_id))
        .do_update()
        .set((
            program_configs::config.eq(config),
            program_configs::updated_at.eq(now),
        ))
        .execute(conn)
        .await
        .map(|_| ())
        .map_err(map_diesel_error)
}
