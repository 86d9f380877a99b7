//! Subscription persistence operations.

use anyhow::{anyhow, Result};
use geofencing_core::{SmSubscriptionLink, UasZonesFilter, UasZonesSubscription};
use sqlx::SqlitePool;

const SELECT_COLUMNS: &str =
    "SELECT id, owner, filter_json, sm_subscription_id, sm_queue, topic_name, active FROM subscriptions";

pub async fn insert_subscription(pool: &SqlitePool, subscription: &UasZonesSubscription) -> Result<()> {
    let filter_json = serde_json::to_string(&subscription.uas_zones_filter)?;
    let link = &subscription.sm_subscription;

    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, owner, filter_json, sm_subscription_id, sm_queue, topic_name, active)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&subscription.id)
    .bind(&subscription.owner)
    .bind(&filter_json)
    .bind(link.id)
    .bind(&link.queue)
    .bind(&link.topic_name)
    .bind(link.active)
    .execute(pool)
    .await?;

    Ok(())
}

/// Set the active flag. Returns false when the subscription does not exist.
pub async fn set_subscription_active(pool: &SqlitePool, id: &str, active: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE subscriptions SET active = ?2 WHERE id = ?1")
        .bind(id)
        .bind(active)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn delete_subscription(pool: &SqlitePool, id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of stored subscriptions, active or not, publishing on `topic_name`.
pub async fn count_by_topic(pool: &SqlitePool, topic_name: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE topic_name = ?1")
        .bind(topic_name)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

pub async fn get_subscription(
    pool: &SqlitePool,
    id: &str,
    owner: Option<&str>,
) -> Result<Option<UasZonesSubscription>> {
    let sql = format!("{} WHERE id = ?1 AND (?2 IS NULL OR owner = ?2)", SELECT_COLUMNS);
    let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
        .bind(id)
        .bind(owner)
        .fetch_optional(pool)
        .await?;

    row.map(UasZonesSubscription::try_from).transpose()
}

/// Subscriptions visible to `owner` (all of them when `None`), oldest first.
pub async fn list_subscriptions(
    pool: &SqlitePool,
    owner: Option<&str>,
) -> Result<Vec<UasZonesSubscription>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR owner = ?1) ORDER BY rowid",
        SELECT_COLUMNS
    );
    let rows = sqlx::query_as::<_, SubscriptionRow>(&sql)
        .bind(owner)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

pub async fn load_active_subscriptions(pool: &SqlitePool) -> Result<Vec<UasZonesSubscription>> {
    let sql = format!("{} WHERE active = 1 ORDER BY rowid", SELECT_COLUMNS);
    let rows = sqlx::query_as::<_, SubscriptionRow>(&sql)
        .fetch_all(pool)
        .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

#[derive(sqlx::FromRow)]
struct SubscriptionRow {
    id: String,
    owner: String,
    filter_json: String,
    sm_subscription_id: i64,
    sm_queue: String,
    topic_name: String,
    active: bool,
}

impl TryFrom<SubscriptionRow> for UasZonesSubscription {
    type Error = anyhow::Error;

    fn try_from(row: SubscriptionRow) -> Result<Self> {
        let filter: UasZonesFilter = serde_json::from_str(&row.filter_json)
            .map_err(|e| anyhow!("Corrupt filter for subscription {}: {}", row.id, e))?;

        Ok(UasZonesSubscription {
            id: row.id,
            owner: row.owner,
            uas_zones_filter: filter,
            sm_subscription: SmSubscriptionLink {
                id: row.sm_subscription_id,
                queue: row.sm_queue,
                topic_name: row.topic_name,
                active: row.active,
            },
        })
    }
}
