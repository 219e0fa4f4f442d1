//! PostgreSQL integration tests
//!
//! These tests share one PostgreSQL container. Every test works on freshly
//! generated item, buyer and purchase ids, so they can run in parallel.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use store::{
    CartAddition, CartStore, Catalog, CheckoutIntent, CheckoutJournal, IntentState, Item, ItemId,
    ItemStatus, PostgresCartStore, PostgresCatalog, PostgresCheckoutJournal,
    PostgresPurchaseLedger, PurchaseId, PurchaseLedger, RecordOutcome, StoreError, UserId,
    Version,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_marketplace_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool against the shared container
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap()
}

fn listing(quantity: u32) -> Item {
    Item {
        item_id: ItemId::generate(),
        seller_id: UserId::new("seller-1"),
        seller_name: "Ana's Attic".to_string(),
        title: "Vintage radio".to_string(),
        description: "Works, some scratches".to_string(),
        image_url: "https://img.example/radio.jpg".to_string(),
        categories: BTreeSet::from(["electronics".to_string(), "vintage".to_string()]),
        price: Decimal::new(4500, 2),
        city: "Lisbon".to_string(),
        coordinates: None,
        quantity,
        status: ItemStatus::Active,
        created_at: Utc::now(),
        version: Version::first(),
    }
}

fn buyer() -> UserId {
    UserId::new(format!("buyer-{}", PurchaseId::new()))
}

#[tokio::test]
async fn insert_and_get_item() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let item = listing(3);

    catalog.insert(item.clone()).await.unwrap();
    let stored = catalog.get(&item.item_id).await.unwrap();

    assert_eq!(stored.title, "Vintage radio");
    assert_eq!(stored.quantity, 3);
    assert_eq!(stored.price, Decimal::new(4500, 2));
    assert_eq!(stored.categories.len(), 2);
    assert_eq!(stored.version, Version::first());
}

#[tokio::test]
async fn get_missing_item_is_not_found() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let result = catalog.get(&ItemId::generate()).await;
    assert!(matches!(result, Err(StoreError::ItemNotFound(_))));
}

#[tokio::test]
async fn guarded_decrement_exhausts_stock() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let item = listing(2);
    catalog.insert(item.clone()).await.unwrap();

    let after = catalog.guarded_decrement(&item.item_id, 2).await.unwrap();
    assert_eq!(after.quantity, 0);
    assert_eq!(after.status, ItemStatus::Inactive);
    assert_eq!(after.version, Version::new(2));

    let result = catalog.guarded_decrement(&item.item_id, 1).await;
    assert!(matches!(
        result,
        Err(StoreError::InsufficientStock {
            requested: 1,
            available: 0,
            ..
        })
    ));
}

#[tokio::test]
async fn guarded_decrement_of_missing_item_is_not_found() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let result = catalog.guarded_decrement(&ItemId::generate(), 1).await;
    assert!(matches!(result, Err(StoreError::ItemNotFound(_))));
}

#[tokio::test]
async fn concurrent_decrements_never_oversell() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let item = listing(5);
    catalog.insert(item.clone()).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let catalog = catalog.clone();
        let item_id = item.item_id.clone();
        handles.push(tokio::spawn(async move {
            catalog.guarded_decrement(&item_id, 1).await
        }));
    }

    let mut sold = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(StoreError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(sold, 5);
    let stored = catalog.get(&item.item_id).await.unwrap();
    assert_eq!(stored.quantity, 0);
    assert_eq!(stored.status, ItemStatus::Inactive);
}

#[tokio::test]
async fn seller_update_is_conditional_on_owner_and_version() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let item = catalog.insert(listing(4)).await.unwrap();
    let owner = item.seller_id.clone();

    let mut edited = item.clone();
    edited.title = "Restored vintage radio".to_string();
    let updated = catalog
        .update(&owner, edited.clone(), Version::first())
        .await
        .unwrap();
    assert_eq!(updated.version, Version::new(2));

    let stale = catalog.update(&owner, edited.clone(), Version::first()).await;
    assert!(matches!(stale, Err(StoreError::VersionConflict { .. })));

    let stranger = catalog
        .update(&UserId::new("someone-else"), edited, Version::new(2))
        .await;
    assert!(matches!(stranger, Err(StoreError::Forbidden { .. })));
}

#[tokio::test]
async fn delete_requires_ownership() {
    let catalog = PostgresCatalog::new(get_test_pool().await);
    let item = catalog.insert(listing(1)).await.unwrap();

    let result = catalog
        .delete(&item.item_id, &UserId::new("someone-else"))
        .await;
    assert!(matches!(result, Err(StoreError::Forbidden { .. })));

    catalog.delete(&item.item_id, &item.seller_id).await.unwrap();
    assert!(matches!(
        catalog.get(&item.item_id).await,
        Err(StoreError::ItemNotFound(_))
    ));
}

#[tokio::test]
async fn cart_add_increments_and_expires() {
    let carts = PostgresCartStore::new(get_test_pool().await);
    let item = listing(3);
    let buyer = buyer();
    let t = Utc::now();

    let addition = |quantity, at| {
        CartAddition::new(
            buyer.clone(),
            item.item_id.clone(),
            item.seller_id.clone(),
            quantity,
            item.snapshot(),
            at,
            TimeDelta::days(30),
        )
    };

    carts.add_or_increment(addition(1, t)).await.unwrap();
    let entry = carts
        .add_or_increment(addition(2, t + TimeDelta::hours(1)))
        .await
        .unwrap();
    assert_eq!(entry.quantity, 3);
    assert_eq!(entry.snapshot.title, "Vintage radio");

    let listed = carts
        .list_for_buyer(&buyer, t + TimeDelta::days(29))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);

    let expired = carts
        .get(&buyer, &item.item_id, t + TimeDelta::days(31))
        .await
        .unwrap();
    assert!(expired.is_none());

    let fresh = carts
        .add_or_increment(addition(1, t + TimeDelta::days(32)))
        .await
        .unwrap();
    assert_eq!(fresh.quantity, 1);
}

#[tokio::test]
async fn cart_remove_is_idempotent() {
    let carts = PostgresCartStore::new(get_test_pool().await);
    let item = listing(1);
    let buyer = buyer();
    let t = Utc::now();

    carts
        .add_or_increment(CartAddition::new(
            buyer.clone(),
            item.item_id.clone(),
            item.seller_id.clone(),
            1,
            item.snapshot(),
            t,
            TimeDelta::days(30),
        ))
        .await
        .unwrap();

    carts.remove(&buyer, &item.item_id).await.unwrap();
    carts.remove(&buyer, &item.item_id).await.unwrap();
    assert!(carts.list_for_buyer(&buyer, t).await.unwrap().is_empty());
}

#[tokio::test]
async fn ledger_record_is_idempotent() {
    let ledger = PostgresPurchaseLedger::new(get_test_pool().await);
    let item = listing(1);
    let buyer = buyer();
    let t = Utc::now();

    let entry = CartAddition::new(
        buyer.clone(),
        item.item_id.clone(),
        item.seller_id.clone(),
        1,
        item.snapshot(),
        t,
        TimeDelta::days(30),
    )
    .into_entry();
    let intent = CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t);
    let record = intent.purchase_record(t);

    assert_eq!(
        ledger.record(record.clone()).await.unwrap(),
        RecordOutcome::Inserted
    );
    assert_eq!(
        ledger.record(record.clone()).await.unwrap(),
        RecordOutcome::AlreadyRecorded
    );

    let listed = ledger.list_for_buyer(&buyer).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].purchase_id, record.purchase_id);
    assert_eq!(listed[0].price, Decimal::new(4500, 2));
}

#[tokio::test]
async fn journal_tracks_intent_progress() {
    let journal = PostgresCheckoutJournal::new(get_test_pool().await);
    let item = listing(1);
    let t = Utc::now() - TimeDelta::minutes(10);

    let entry = CartAddition::new(
        buyer(),
        item.item_id.clone(),
        item.seller_id.clone(),
        1,
        item.snapshot(),
        t,
        TimeDelta::days(30),
    )
    .into_entry();
    let intent = CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t);
    journal.open(intent.clone()).await.unwrap();

    let advanced = journal
        .advance(intent.purchase_id, IntentState::Decremented, Utc::now())
        .await
        .unwrap();
    assert_eq!(advanced.state, IntentState::Decremented);

    let unfinished = journal
        .list_unfinished(Utc::now() - TimeDelta::minutes(5))
        .await
        .unwrap();
    assert!(
        unfinished
            .iter()
            .any(|i| i.purchase_id == intent.purchase_id)
    );

    let backwards = journal
        .advance(intent.purchase_id, IntentState::Pending, Utc::now())
        .await;
    assert!(matches!(backwards, Err(StoreError::InvalidState(_))));

    journal
        .advance(intent.purchase_id, IntentState::Completed, Utc::now())
        .await
        .unwrap();
    let unfinished = journal
        .list_unfinished(Utc::now() - TimeDelta::minutes(5))
        .await
        .unwrap();
    assert!(
        !unfinished
            .iter()
            .any(|i| i.purchase_id == intent.purchase_id)
    );
}

#[tokio::test]
async fn journal_allows_one_unfinished_intent_per_cart_entry() {
    let journal = PostgresCheckoutJournal::new(get_test_pool().await);
    let item = listing(1);
    let buyer = buyer();
    let t = Utc::now();

    let entry = CartAddition::new(
        buyer.clone(),
        item.item_id.clone(),
        item.seller_id.clone(),
        2,
        item.snapshot(),
        t,
        TimeDelta::days(30),
    )
    .into_entry();

    let first = CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t);
    journal.open(first.clone()).await.unwrap();

    let second = journal
        .open(CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t))
        .await;
    assert!(matches!(
        second,
        Err(StoreError::CheckoutInProgress { .. })
    ));

    journal
        .advance(first.purchase_id, IntentState::Completed, t)
        .await
        .unwrap();
    journal
        .open(CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t))
        .await
        .unwrap();
}

#[tokio::test]
async fn cart_conditional_remove_spares_grown_entries() {
    let carts = PostgresCartStore::new(get_test_pool().await);
    let item = listing(5);
    let buyer = buyer();
    let t = Utc::now();
    let addition = |quantity: u32, at| {
        CartAddition::new(
            buyer.clone(),
            item.item_id.clone(),
            item.seller_id.clone(),
            quantity,
            item.snapshot(),
            at,
            TimeDelta::days(30),
        )
    };

    let read = carts.add_or_increment(addition(2, t)).await.unwrap();
    let grown = carts
        .add_or_increment(addition(1, t + TimeDelta::minutes(1)))
        .await
        .unwrap();

    assert!(!carts.remove_if_unchanged(&read).await.unwrap());
    assert_eq!(carts.list_for_buyer(&buyer, t).await.unwrap().len(), 1);

    assert!(carts.remove_if_unchanged(&grown).await.unwrap());
    assert!(carts.list_for_buyer(&buyer, t).await.unwrap().is_empty());
}

#[tokio::test]
async fn prices_keep_their_full_precision() {
    let pool = get_test_pool().await;
    let catalog = PostgresCatalog::new(pool.clone());
    let ledger = PostgresPurchaseLedger::new(pool);
    let mut item = listing(1);
    item.price = Decimal::new(19_9999, 4);
    catalog.insert(item.clone()).await.unwrap();

    let stored = catalog.get(&item.item_id).await.unwrap();
    assert_eq!(stored.price, Decimal::new(19_9999, 4));

    let t = Utc::now();
    let entry = CartAddition::new(
        buyer(),
        stored.item_id.clone(),
        stored.seller_id.clone(),
        1,
        stored.snapshot(),
        t,
        TimeDelta::days(30),
    )
    .into_entry();
    let record = CheckoutIntent::for_cart_entry(PurchaseId::new(), &entry, t).purchase_record(t);
    ledger.record(record.clone()).await.unwrap();

    let recorded = ledger.get(record.purchase_id).await.unwrap().unwrap();
    assert_eq!(recorded.price, recorded.snapshot.price);
    assert_eq!(recorded.price, Decimal::new(19_9999, 4));
}
