//! UAS zone persistence and the zone query engine.
//!
//! A zone is stored as its JSON document plus indexed columns: the
//! applicability window and watermark in epoch milliseconds, and one
//! `zone_volumes` row per airspace volume with its band in meters and the
//! bounding box of its footprint. Queries narrow candidates in SQL using only
//! necessary conditions of the match predicate, then refine each candidate
//! with the predicate itself.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use geofencing_core::{PreparedFilter, UasZone};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

use super::authorities::find_or_insert_authority;

/// A zone with this identifier is already stored.
#[derive(Debug, Error)]
#[error("zone {0} already exists")]
pub struct DuplicateZone(pub String);

/// Store a new zone owned by `owner` and return it as stored.
///
/// Stamps `created_at`, defaults `updated_at` to it, and swaps the embedded
/// authority for the canonical record with the same name.
pub async fn create_zone(
    pool: &SqlitePool,
    zone: &UasZone,
    owner: &str,
    circle_edges: usize,
) -> Result<UasZone> {
    let mut stored = zone.clone();
    let now = Utc::now();
    stored.created_at = Some(now);
    stored.updated_at = Some(zone.updated_at.unwrap_or(now));

    let mut volumes = Vec::with_capacity(stored.geometry.len());
    for volume in &stored.geometry {
        let bbox = volume
            .footprint(circle_edges)
            .context("Invalid zone geometry")?
            .bounding_box();
        volumes.push((volume.lower_limit_m(), volume.upper_limit_m(), bbox));
    }

    let mut tx = pool.begin().await?;
    stored.zone_authority = find_or_insert_authority(&mut tx, &zone.zone_authority).await?;
    let zone_json = serde_json::to_string(&stored)?;

    sqlx::query(
        r#"
        INSERT INTO uas_zones (identifier, owner, region, authority_name, start_ms, end_ms, updated_ms, zone_json)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&stored.identifier)
    .bind(owner)
    .bind(i64::from(stored.region))
    .bind(&stored.zone_authority.name)
    .bind(stored.applicability.start_date_time.timestamp_millis())
    .bind(stored.applicability.end_date_time.timestamp_millis())
    .bind(stored.updated_at.map(|t| t.timestamp_millis()))
    .bind(&zone_json)
    .execute(&mut *tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            anyhow::Error::new(DuplicateZone(stored.identifier.clone()))
        }
        other => anyhow::Error::new(other).context(format!("Failed to insert zone {}", stored.identifier)),
    })?;

    for (position, (lower_m, upper_m, bbox)) in volumes.into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO zone_volumes (zone_identifier, position, lower_m, upper_m, min_lon, min_lat, max_lon, max_lat)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&stored.identifier)
        .bind(position as i64)
        .bind(lower_m)
        .bind(upper_m)
        .bind(bbox.min_lon)
        .bind(bbox.min_lat)
        .bind(bbox.max_lon)
        .bind(bbox.max_lat)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(stored)
}

/// All zones matching the filter, ordered by identifier.
pub async fn get_zones(
    pool: &SqlitePool,
    filter: &PreparedFilter,
    owner: Option<&str>,
) -> Result<Vec<UasZone>> {
    let bbox = filter.footprint.bounding_box();

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT DISTINCT z.identifier, z.zone_json FROM uas_zones z \
         JOIN zone_volumes v ON v.zone_identifier = z.identifier WHERE v.upper_m <= ",
    );
    query.push_bind(filter.upper_limit_m);
    query.push(" AND v.lower_m >= ").push_bind(filter.lower_limit_m);
    query.push(" AND v.min_lon <= ").push_bind(bbox.max_lon);
    query.push(" AND v.max_lon >= ").push_bind(bbox.min_lon);
    query.push(" AND v.min_lat <= ").push_bind(bbox.max_lat);
    query.push(" AND v.max_lat >= ").push_bind(bbox.min_lat);
    query.push(" AND z.start_ms >= ").push_bind(filter.start.timestamp_millis());
    query.push(" AND z.end_ms <= ").push_bind(filter.end.timestamp_millis());

    if !filter.regions.is_empty() {
        query.push(" AND z.region IN (");
        let mut regions = query.separated(", ");
        for region in &filter.regions {
            regions.push_bind(i64::from(*region));
        }
        regions.push_unseparated(")");
    }
    if let Some(updated_after) = filter.updated_after {
        query.push(" AND z.updated_ms >= ").push_bind(updated_after.timestamp_millis());
    }
    if let Some(owner) = owner {
        query.push(" AND z.owner = ").push_bind(owner.to_string());
    }
    query.push(" ORDER BY z.identifier");

    let rows = query.build_query_as::<ZoneRow>().fetch_all(pool).await?;

    let mut zones = Vec::with_capacity(rows.len());
    for row in rows {
        let zone = UasZone::try_from(row)?;
        if filter.matches(&zone) {
            zones.push(zone);
        }
    }
    Ok(zones)
}

pub async fn get_zone_by_identifier(
    pool: &SqlitePool,
    identifier: &str,
    owner: Option<&str>,
) -> Result<Option<UasZone>> {
    let row = sqlx::query_as::<_, ZoneRow>(
        "SELECT identifier, zone_json FROM uas_zones WHERE identifier = ?1 AND (?2 IS NULL OR owner = ?2)",
    )
    .bind(identifier)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    row.map(UasZone::try_from).transpose()
}

/// Delete a zone by identifier.
pub async fn delete_zone(pool: &SqlitePool, identifier: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM zone_volumes WHERE zone_identifier = ?1")
        .bind(identifier)
        .execute(&mut *tx)
        .await?;
    let result = sqlx::query("DELETE FROM uas_zones WHERE identifier = ?1")
        .bind(identifier)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(result.rows_affected() > 0)
}

#[derive(sqlx::FromRow)]
struct ZoneRow {
    identifier: String,
    zone_json: String,
}

impl TryFrom<ZoneRow> for UasZone {
    type Error = anyhow::Error;

    fn try_from(row: ZoneRow) -> Result<Self> {
        serde_json::from_str(&row.zone_json)
            .map_err(|e| anyhow!("Corrupt zone record {}: {}", row.identifier, e))
    }
}
