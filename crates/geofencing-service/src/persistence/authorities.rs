//! Zone authority persistence. Authorities are keyed by name.

use anyhow::{anyhow, Result};
use geofencing_core::{Authority, AuthorityPurpose};
use sqlx::{Executor, Sqlite, SqliteConnection};

/// Return the stored authority with this name, inserting `authority` first if absent.
///
/// An existing record wins: later zones naming the same authority reuse it as-is.
/// Runs on `conn` so the caller's transaction covers the insert.
pub async fn find_or_insert_authority(conn: &mut SqliteConnection, authority: &Authority) -> Result<Authority> {
    sqlx::query(
        r#"
        INSERT INTO authorities (name, service, contact_name, email, site_url, phone, purpose, interval_before)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(name) DO NOTHING
        "#,
    )
    .bind(&authority.name)
    .bind(&authority.service)
    .bind(&authority.contact_name)
    .bind(&authority.email)
    .bind(&authority.site_url)
    .bind(&authority.phone)
    .bind(purpose_to_str(authority.purpose))
    .bind(&authority.interval_before)
    .execute(&mut *conn)
    .await?;

    get_authority(&mut *conn, &authority.name)
        .await?
        .ok_or_else(|| anyhow!("Authority {} vanished after insert", authority.name))
}

pub async fn get_authority<'e, E>(executor: E, name: &str) -> Result<Option<Authority>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query_as::<_, AuthorityRow>(
        "SELECT name, service, contact_name, email, site_url, phone, purpose, interval_before FROM authorities WHERE name = ?1",
    )
    .bind(name)
    .fetch_optional(executor)
    .await?;

    row.map(Authority::try_from).transpose()
}

fn purpose_to_str(purpose: AuthorityPurpose) -> &'static str {
    match purpose {
        AuthorityPurpose::Authorization => "AUTHORIZATION",
        AuthorityPurpose::Notification => "NOTIFICATION",
        AuthorityPurpose::Information => "INFORMATION",
    }
}

#[derive(sqlx::FromRow)]
struct AuthorityRow {
    name: String,
    service: Option<String>,
    contact_name: Option<String>,
    email: Option<String>,
    site_url: Option<String>,
    phone: Option<String>,
    purpose: String,
    interval_before: Option<String>,
}

impl TryFrom<AuthorityRow> for Authority {
    type Error = anyhow::Error;

    fn try_from(row: AuthorityRow) -> Result<Self> {
        let purpose = match row.purpose.as_str() {
            "AUTHORIZATION" => AuthorityPurpose::Authorization,
            "NOTIFICATION" => AuthorityPurpose::Notification,
            "INFORMATION" => AuthorityPurpose::Information,
            other => return Err(anyhow!("Unknown authority purpose '{}'", other)),
        };

        Ok(Authority {
            name: row.name,
            service: row.service,
            contact_name: row.contact_name,
            email: row.email,
            site_url: row.site_url,
            phone: row.phone,
            purpose,
            interval_before: row.interval_before,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    fn authority(email: &str) -> Authority {
        Authority {
            name: "Skeyes".to_string(),
            service: Some("ATM".to_string()),
            contact_name: None,
            email: Some(email.to_string()),
            site_url: None,
            phone: None,
            purpose: AuthorityPurpose::Notification,
            interval_before: Some("PT2H".to_string()),
        }
    }

    #[tokio::test]
    async fn first_insert_wins() {
        let db = init_database(":memory:", 1).await.unwrap();
        let mut conn = db.pool().acquire().await.unwrap();

        let stored = find_or_insert_authority(&mut conn, &authority("first@skeyes.be"))
            .await
            .unwrap();
        assert_eq!(stored, authority("first@skeyes.be"));

        let again = find_or_insert_authority(&mut conn, &authority("second@skeyes.be"))
            .await
            .unwrap();
        assert_eq!(again.email.as_deref(), Some("first@skeyes.be"));
    }

    #[tokio::test]
    async fn rolled_back_insert_leaves_nothing() {
        let db = init_database(":memory:", 1).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        find_or_insert_authority(&mut tx, &authority("first@skeyes.be"))
            .await
            .unwrap();
        assert!(get_authority(&mut *tx, "Skeyes").await.unwrap().is_some());
        tx.rollback().await.unwrap();

        assert!(get_authority(db.pool(), "Skeyes").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_authority_is_none() {
        let db = init_database(":memory:", 1).await.unwrap();
        assert!(get_authority(db.pool(), "nobody").await.unwrap().is_none());
    }
}
