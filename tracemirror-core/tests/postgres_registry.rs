#![cfg(feature = "e2e")]

use anyhow::Result;
use chrono::{TimeDelta, TimeZone, Utc};
use sqlx::PgPool;
use tracemirror_core::{
    domain::{ServiceFilter, ServiceUpsert},
    infrastructure::PostgresRegistryStore,
    ports::RegistryStore,
};

fn upsert(name: &str, minute: u32) -> ServiceUpsert {
    ServiceUpsert {
        name: name.to_string(),
        last_seen: Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap(),
    }
}

#[sqlx::test(migrator = "tracemirror_core::MIGRATOR")]
async fn batch_counts_inserts_and_updates(pool: PgPool) -> Result<()> {
    let store = PostgresRegistryStore::from_pool(pool);

    let first = store
        .bulk_upsert(vec![upsert("checkout", 0), upsert("cart", 0)])
        .await?;
    assert_eq!((first.inserted, first.updated), (2, 0));

    let second = store
        .bulk_upsert(vec![upsert("checkout", 20), upsert("search", 20)])
        .await?;
    assert_eq!((second.inserted, second.updated), (1, 1));
    assert_eq!(second.applied(), 2);

    let rows = store.list_services(ServiceFilter::default()).await?;
    let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["cart", "checkout", "search"]);
    Ok(())
}

#[sqlx::test(migrator = "tracemirror_core::MIGRATOR")]
async fn repeated_name_in_one_batch_keeps_last_value(pool: PgPool) -> Result<()> {
    let store = PostgresRegistryStore::from_pool(pool);

    let result = store
        .bulk_upsert(vec![upsert("checkout", 40), upsert("checkout", 10)])
        .await?;
    assert_eq!(result.submitted, 2);

    let rows = store.list_services(ServiceFilter::default()).await?;
    assert_eq!(rows.len(), 1);
    assert_eq!(
        rows[0].last_seen,
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 10, 0).unwrap()
    );
    Ok(())
}

#[sqlx::test(migrator = "tracemirror_core::MIGRATOR")]
async fn empty_batch_is_a_no_op(pool: PgPool) -> Result<()> {
    let store = PostgresRegistryStore::from_pool(pool);

    let result = store.bulk_upsert(Vec::new()).await?;

    assert_eq!(result.submitted, 0);
    assert_eq!(result.applied(), 0);
    assert!(store.list_services(ServiceFilter::default()).await?.is_empty());
    Ok(())
}

#[sqlx::test(migrator = "tracemirror_core::MIGRATOR")]
async fn stale_rows_are_deactivated_and_revived_by_upsert(
    pool: PgPool,
) -> Result<()> {
    let store = PostgresRegistryStore::from_pool(pool);
    store
        .bulk_upsert(vec![upsert("old", 0), upsert("new", 50)])
        .await?;

    let cutoff = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    assert_eq!(store.mark_stale(cutoff).await?, 1);
    // Already inactive rows are not counted again.
    assert_eq!(store.mark_stale(cutoff).await?, 0);

    let inactive = store
        .list_services(ServiceFilter {
            active: Some(false),
        })
        .await?;
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0].name, "old");

    store
        .bulk_upsert(vec![ServiceUpsert {
            name: "old".into(),
            last_seen: Utc::now() - TimeDelta::minutes(1),
        }])
        .await?;
    let active = store
        .list_services(ServiceFilter { active: Some(true) })
        .await?;
    assert_eq!(active.len(), 2);
    Ok(())
}

#[sqlx::test(migrator = "tracemirror_core::MIGRATOR")]
async fn ping_round_trips_without_rows(pool: PgPool) -> Result<()> {
    let store = PostgresRegistryStore::from_pool(pool.clone());

    store.ping().await?;

    pool.close().await;
    assert!(store.ping().await.is_err());
    Ok(())
}
