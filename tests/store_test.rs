mod common;

use blockchain_scraper::db::repositories::{SortField, TransferFilter, TransferKey};
use blockchain_scraper::db::Repositories;
use blockchain_scraper::domain::Chain;
use blockchain_scraper::services::aggregation::{self, Window};

use common::*;

#[tokio::test]
async fn test_upsert_is_idempotent() {
    let conn = setup_db().await;
    let repositories = Repositories::new(conn);
    let transfer = stored(Chain::Tron, "n1", "tx-1", "TWallet", Some("10"), at(2024, 3, 5, 0, 0, 0));

    assert!(repositories.transfers.upsert(transfer.clone()).await.unwrap());
    assert!(!repositories.transfers.upsert(transfer.clone()).await.unwrap());

    // same hash to another output is a distinct transfer
    let mut second_output = transfer.clone();
    second_output.log_index = 1;
    assert!(repositories.transfers.upsert(second_output).await.unwrap());

    assert_eq!(repositories.transfers.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_backfill_only_fills_missing_values() {
    let conn = setup_db().await;
    let repositories = Repositories::new(conn);
    let unpriced = stored(Chain::Bitcoin, "n1", "tx-1", "bc1qa", None, at(2024, 3, 5, 0, 0, 0));
    let priced = stored(Chain::Bitcoin, "n1", "tx-2", "bc1qa", Some("7"), at(2024, 3, 6, 0, 0, 0));
    repositories.transfers.upsert(unpriced.clone()).await.unwrap();
    repositories.transfers.upsert(priced.clone()).await.unwrap();

    let pending = repositories.transfers.find_unpriced(Some("n1"), 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].transaction_hash, "tx-1");

    assert!(repositories
        .transfers
        .backfill_usd_value(&TransferKey::from(&unpriced), dec("3"))
        .await
        .unwrap());
    assert!(!repositories
        .transfers
        .backfill_usd_value(&TransferKey::from(&priced), dec("99"))
        .await
        .unwrap());
    assert!(repositories.transfers.find_unpriced(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checkpoint_is_overwritten() {
    let conn = setup_db().await;
    let repositories = Repositories::new(conn);

    assert_eq!(repositories.checkpoints.get(Chain::Ethereum, "0xabc").await.unwrap(), None);
    repositories.checkpoints.save(Chain::Ethereum, "0xabc", 100).await.unwrap();
    repositories.checkpoints.save(Chain::Ethereum, "0xabc", 150).await.unwrap();
    assert_eq!(repositories.checkpoints.get(Chain::Ethereum, "0xabc").await.unwrap(), Some(150));
    assert_eq!(repositories.checkpoints.get(Chain::Tron, "0xabc").await.unwrap(), None);
}

#[tokio::test]
async fn test_network_wallets_are_grouped_per_chain() {
    let conn = setup_db().await;
    seed_network(
        &conn,
        "n1",
        "Alpha",
        &[
            (Chain::Bitcoin, "bc1qa"),
            (Chain::Bitcoin, " bc1qa "),
            (Chain::Tron, "TWallet"),
        ],
    )
    .await;
    seed_network(&conn, "n2", "Empty", &[]).await;
    let repositories = Repositories::new(conn);

    let network = repositories.networks.find_active("n1").await.unwrap().unwrap();
    assert_eq!(network.wallets.bitcoin, vec!["bc1qa".to_string()]);
    assert_eq!(network.wallets.tron, vec!["TWallet".to_string()]);
    assert_eq!(network.wallet_count(), 2);

    assert_eq!(repositories.networks.find_all_active().await.unwrap().len(), 2);
    let scrapable = repositories.networks.find_scrapable().await.unwrap();
    assert_eq!(scrapable.len(), 1);
    assert_eq!(scrapable[0].id, "n1");
}

#[tokio::test]
async fn test_history_search_filters_and_paginates() {
    let conn = setup_db().await;
    let repositories = Repositories::new(conn);
    for day in 1..=7 {
        let chain = if day % 2 == 0 { Chain::Tron } else { Chain::Bitcoin };
        let transfer = stored(
            chain,
            "n1",
            &format!("hash-{}", day),
            "wallet",
            Some(day.to_string().as_str()),
            at(2024, 3, day, 8, 0, 0),
        );
        repositories.transfers.upsert(transfer).await.unwrap();
    }
    repositories
        .transfers
        .upsert(stored(Chain::Tron, "n2", "hash-other", "wallet", Some("1"), at(2024, 3, 2, 0, 0, 0)))
        .await
        .unwrap();

    let filter = TransferFilter {
        limit: 3,
        page: 2,
        ..TransferFilter::default()
    };
    let (page, total) = repositories.transfers.search("n1", &filter).await.unwrap();
    assert_eq!(total, 7);
    let hashes: Vec<&str> = page.iter().map(|t| t.transaction_hash.as_str()).collect();
    assert_eq!(hashes, vec!["hash-4", "hash-3", "hash-2"]);

    let tron_only = TransferFilter {
        chain: Some("tron".into()),
        sort_by: SortField::Timestamp,
        descending: false,
        ..TransferFilter::default()
    };
    let (page, total) = repositories.transfers.search("n1", &tron_only).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page[0].transaction_hash, "hash-2");

    let by_hash = TransferFilter {
        search_hash: Some("HASH-5".into()),
        ..TransferFilter::default()
    };
    let (page, total) = repositories.transfers.search("n1", &by_hash).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(page[0].transaction_hash, "hash-5");

    let unreachable = TransferFilter {
        page: u64::MAX,
        limit: 500,
        ..TransferFilter::default()
    };
    assert!(repositories.transfers.search("n1", &unreachable).await.is_err());
}

#[tokio::test]
async fn test_month_window_includes_only_that_month() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Tron, "TWallet")]).await;
    let repositories = Repositories::new(conn);

    for (hash, timestamp) in [
        ("feb-last", at(2024, 2, 29, 23, 59, 59)),
        ("mar-first", at(2024, 3, 1, 0, 0, 0)),
        ("mar-last", at(2024, 3, 31, 23, 59, 59)),
        ("apr-first", at(2024, 4, 1, 0, 0, 0)),
    ] {
        repositories
            .transfers
            .upsert(stored(Chain::Tron, "n1", hash, "TWallet", Some("10"), timestamp))
            .await
            .unwrap();
    }

    let window = Window::Month { month: 3, year: 2024 };
    let summary = aggregation::network_summary(&repositories, "n1", window)
        .await
        .unwrap()
        .expect("network exists");

    assert_eq!(summary.total_transactions, 2);
    assert_eq!(summary.total_usd_value, dec("20"));
    assert_eq!(summary.breakdown.tron.count, 2);
    assert!(summary.period_info.is_month_filter);

    let global = aggregation::global_summary(&repositories, window).await.unwrap();
    assert_eq!(global.total_transactions, 2);
    assert_eq!(global.active_networks_with_wallets, 1);
}

#[tokio::test]
async fn test_summary_of_unknown_network_is_none() {
    let conn = setup_db().await;
    let repositories = Repositories::new(conn);

    let summary = aggregation::network_summary(&repositories, "ghost", Window::default())
        .await
        .unwrap();
    assert!(summary.is_none());
}
