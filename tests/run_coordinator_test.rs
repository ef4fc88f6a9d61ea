mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::ConnectionTrait;

use blockchain_scraper::config::{FailurePolicy, RunConfig};
use blockchain_scraper::db::Repositories;
use blockchain_scraper::domain::{AdapterError, Chain, Phase, RunError};

use common::*;

const BTC_WALLET: &str = "bc1qtreasury";
const ETH_WALLET: &str = "0xabc0000000000000000000000000000000000001";
const TRX_WALLET: &str = "TTreasury111111111111111111111111";

fn five_btc_deposits() -> Vec<blockchain_scraper::domain::RawTransfer> {
    (1..=5)
        .map(|i| {
            raw(
                &format!("btc-tx-{}", i),
                BTC_WALLET,
                "BTC",
                "0.0006",
                800_000 + i,
                at(2024, 3, i as u32, 12, 0, 0),
            )
        })
        .collect()
}

#[tokio::test]
async fn test_full_run_stores_and_prices_new_transfers() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, five_btc_deposits()),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let started = coordinator.trigger_all().expect("run accepted");
    assert!(started.snapshot.is_running);
    let results = started.handle.await.expect("join").expect("run succeeds");

    assert_eq!(results.summary.new_transactions, 5);
    assert_eq!(results.summary.total_usd_value, dec("120"));
    assert_eq!(results.summary.networks_scraped, 1);
    assert_eq!(results.sample.len(), 5);

    let status = coordinator.snapshot();
    assert!(!status.is_running);
    assert_eq!(status.overall.state, Phase::Completed);
    assert_eq!(status.overall.progress, 100);
    assert_eq!(status.status.bitcoin, Phase::Completed);
    assert!(status.last_scrape_time.bitcoin.is_some());
    assert!(status.overall.error.is_none());
}

#[tokio::test]
async fn test_second_run_inserts_nothing_new() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;
    let repositories = Repositories::new(conn.clone());

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, five_btc_deposits()),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let first = coordinator.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(first.summary.new_transactions, 5);
    assert_eq!(
        repositories.checkpoints.get(Chain::Bitcoin, BTC_WALLET).await.unwrap(),
        Some(800_005)
    );

    let second = coordinator.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(second.summary.new_transactions, 0);
    assert_eq!(second.summary.total_usd_value, dec("0"));
    assert_eq!(repositories.transfers.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_failing_chain_is_isolated() {
    let conn = setup_db().await;
    seed_network(
        &conn,
        "n1",
        "Alpha",
        &[
            (Chain::Bitcoin, BTC_WALLET),
            (Chain::Ethereum, ETH_WALLET),
            (Chain::Tron, TRX_WALLET),
        ],
    )
    .await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, five_btc_deposits()),
            ScriptedAdapter::new(Chain::Ethereum).failing(AdapterError::Unavailable("HTTP 503".into())),
            ScriptedAdapter::new(Chain::Tron).with_transfers(
                TRX_WALLET,
                vec![raw("trx-1", TRX_WALLET, "USDT", "50", 1, at(2024, 3, 2, 0, 0, 0))],
            ),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let results = coordinator.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(results.summary.new_transactions, 6);
    assert_eq!(results.summary.total_usd_value, dec("170"));
    assert_eq!(results.summary.breakdown.ethereum.wallets_failed, 1);

    let status = coordinator.snapshot();
    assert_eq!(status.overall.state, Phase::Completed);
    assert_eq!(status.status.bitcoin, Phase::Completed);
    assert_eq!(status.status.ethereum, Phase::Failed);
    assert_eq!(status.status.tron, Phase::Completed);
    assert!(status.last_scrape_time.ethereum.is_none());

    let error = status.overall.error.expect("degradation is reported");
    assert!(error.contains(ETH_WALLET));
    assert!(error.contains("Alpha"));
}

#[tokio::test]
async fn test_strict_policy_fails_on_any_wallet_failure() {
    let conn = setup_db().await;
    seed_network(
        &conn,
        "n1",
        "Alpha",
        &[(Chain::Bitcoin, BTC_WALLET), (Chain::Ethereum, ETH_WALLET)],
    )
    .await;

    let settings = RunConfig {
        failure_policy: FailurePolicy::Strict,
        ..fast_settings()
    };
    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, five_btc_deposits()),
            ScriptedAdapter::new(Chain::Ethereum).failing(AdapterError::Data("NOTOK".into())),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        settings,
    );

    let outcome = coordinator.trigger_all().unwrap().handle.await.unwrap();
    assert!(matches!(outcome, Err(RunError::Failed(_))));

    let status = coordinator.snapshot();
    assert_eq!(status.overall.state, Phase::Failed);
    assert_eq!(status.status.ethereum, Phase::Failed);
    assert!(status.overall.end_time.is_some());
    // transfers of the healthy chain are kept
    let stored = Repositories::new(conn.clone()).transfers.count().await.unwrap();
    assert_eq!(stored, 5);
}

#[tokio::test]
async fn test_tolerant_policy_fails_when_every_wallet_fails() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Ethereum, ETH_WALLET)]).await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin),
            ScriptedAdapter::new(Chain::Ethereum).failing(AdapterError::Unavailable("timeout".into())),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let outcome = coordinator.trigger_all().unwrap().handle.await.unwrap();
    assert!(outcome.is_err());
    assert_eq!(coordinator.snapshot().overall.state, Phase::Failed);
}

#[tokio::test]
async fn test_trigger_while_running_is_rejected() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin)
                .with_transfers(BTC_WALLET, five_btc_deposits())
                .slow(Duration::from_millis(300)),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let started = coordinator.trigger_all().expect("first trigger accepted");
    let run_id = started.snapshot.overall.run_id;

    match coordinator.trigger_all() {
        Err(RunError::Conflict(snapshot)) => {
            assert!(snapshot.is_running);
            assert_eq!(snapshot.overall.run_id, run_id);
        }
        other => panic!("expected conflict, got {:?}", other.map(|s| s.snapshot)),
    }
    assert!(matches!(
        coordinator.trigger_network("n1").await,
        Err(RunError::Conflict(_))
    ));

    started.handle.await.unwrap().unwrap();
    assert_eq!(coordinator.snapshot().overall.state, Phase::Completed);
    assert_eq!(coordinator.snapshot().overall.run_id, run_id);
}

#[tokio::test]
async fn test_progress_never_decreases() {
    let conn = setup_db().await;
    let wallets = ["bc1qa", "bc1qb", "bc1qc"];
    for (i, wallet) in wallets.iter().enumerate() {
        let id = format!("n{}", i + 1);
        seed_network(&conn, &id, &format!("Network {}", i + 1), &[(Chain::Bitcoin, wallet)]).await;
    }

    let mut bitcoin = ScriptedAdapter::new(Chain::Bitcoin).slow(Duration::from_millis(40));
    for wallet in wallets {
        bitcoin = bitcoin.with_transfers(
            wallet,
            vec![raw(&format!("tx-{}", wallet), wallet, "BTC", "0.001", 10, at(2024, 3, 1, 0, 0, 0))],
        );
    }
    let coordinator = coordinator(
        &conn,
        adapters(bitcoin, ScriptedAdapter::new(Chain::Ethereum), ScriptedAdapter::new(Chain::Tron)),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let started = coordinator.trigger_all().unwrap();
    let mut observed = vec![started.snapshot.overall.progress];
    while !started.handle.is_finished() {
        observed.push(coordinator.snapshot().overall.progress);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    started.handle.await.unwrap().unwrap();
    observed.push(coordinator.snapshot().overall.progress);

    assert!(observed.windows(2).all(|w| w[0] <= w[1]), "progress went back: {:?}", observed);
    assert_eq!(observed.last(), Some(&100));
    assert_eq!(coordinator.snapshot().overall.networks_processed, 3);
}

#[tokio::test]
async fn test_network_run_scopes_to_one_network() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;
    seed_network(&conn, "n2", "Beta", &[(Chain::Bitcoin, "bc1qother")]).await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin)
                .with_transfers(BTC_WALLET, five_btc_deposits())
                .with_transfers(
                    "bc1qother",
                    vec![raw("other-1", "bc1qother", "BTC", "1", 5, at(2024, 3, 1, 0, 0, 0))],
                ),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let results = coordinator.trigger_network("n1").await.expect("network run");
    assert_eq!(results.summary.network_id.as_deref(), Some("n1"));
    assert_eq!(results.summary.network_name.as_deref(), Some("Alpha"));
    assert_eq!(results.summary.new_transactions, 5);

    let status = coordinator.snapshot();
    assert_eq!(status.overall.total_networks, 1);
    assert_eq!(status.overall.progress, 100);
    assert_eq!(Repositories::new(conn.clone()).transfers.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_unknown_network_leaves_state_idle() {
    let conn = setup_db().await;
    let coordinator = coordinator(&conn, idle_adapters(), FixedPrices::btc("40000"), fast_settings());

    let outcome = coordinator.trigger_network("missing").await;
    assert!(matches!(outcome, Err(RunError::NetworkNotFound(id)) if id == "missing"));
    assert_eq!(coordinator.snapshot().overall.state, Phase::Idle);
}

#[tokio::test]
async fn test_run_with_no_networks_completes_at_full_progress() {
    let conn = setup_db().await;
    let coordinator = coordinator(&conn, idle_adapters(), FixedPrices::btc("40000"), fast_settings());

    let results = coordinator.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(results.summary.networks_scraped, 0);

    let status = coordinator.snapshot();
    assert_eq!(status.overall.state, Phase::Completed);
    assert_eq!(status.overall.progress, 100);
}

#[tokio::test]
async fn test_unpriced_transfers_are_backfilled_later() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;
    let deposits = five_btc_deposits();

    let without_prices = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, deposits.clone()),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices(Default::default()),
        fast_settings(),
    );
    let first = without_prices.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(first.summary.new_transactions, 5);
    assert_eq!(first.summary.unpriced_transactions, 5);
    assert_eq!(first.summary.backfilled_prices, 0);

    let with_prices = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, deposits),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );
    let second = with_prices.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(second.summary.new_transactions, 0);
    assert_eq!(second.summary.backfilled_prices, 5);

    let repositories = Repositories::new(conn.clone());
    assert!(repositories.transfers.find_unpriced(None, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_hung_adapter_times_out_and_is_retried_once() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Ethereum, ETH_WALLET)]).await;

    let bitcoin = Arc::new(ScriptedAdapter::new(Chain::Bitcoin));
    let ethereum = Arc::new(ScriptedAdapter::new(Chain::Ethereum).slow(Duration::from_millis(500)));
    let tron = Arc::new(ScriptedAdapter::new(Chain::Tron));
    let settings = RunConfig {
        adapter_timeout: Duration::from_millis(50),
        max_attempts: 2,
        ..fast_settings()
    };
    let coordinator = coordinator(
        &conn,
        shared_adapters(&bitcoin, &ethereum, &tron),
        FixedPrices::btc("40000"),
        settings,
    );

    let outcome = coordinator.trigger_all().unwrap().handle.await.unwrap();
    assert!(matches!(outcome, Err(RunError::Failed(_))));
    assert_eq!(ethereum.calls.load(Ordering::SeqCst), 2);

    let status = coordinator.snapshot();
    assert_eq!(status.status.ethereum, Phase::Failed);
    assert_eq!(status.overall.state, Phase::Failed);
    let error = status.overall.error.expect("timeout is reported");
    assert!(error.contains("no response within"));
    assert!(error.contains(ETH_WALLET));
}

#[tokio::test]
async fn test_store_failure_aborts_the_run() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;
    conn.execute_unprepared("DROP TABLE blockchain_transfers").await.unwrap();

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin).with_transfers(BTC_WALLET, five_btc_deposits()),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    match coordinator.trigger_all().unwrap().handle.await.unwrap() {
        Err(RunError::Failed(message)) => assert!(message.contains("store unavailable"), "{}", message),
        other => panic!("expected a failed run, got {:?}", other),
    }

    let status = coordinator.snapshot();
    assert!(!status.is_running);
    assert_eq!(status.overall.state, Phase::Failed);
    assert!(status.overall.error.unwrap().contains("store unavailable"));

    let repositories = Repositories::new(conn.clone());
    assert_eq!(repositories.checkpoints.get(Chain::Bitcoin, BTC_WALLET).await.unwrap(), None);
}

#[tokio::test]
async fn test_truncated_history_keeps_checkpoint_and_is_reported() {
    let conn = setup_db().await;
    seed_network(&conn, "n1", "Alpha", &[(Chain::Bitcoin, BTC_WALLET)]).await;

    let coordinator = coordinator(
        &conn,
        adapters(
            ScriptedAdapter::new(Chain::Bitcoin)
                .with_transfers(BTC_WALLET, five_btc_deposits())
                .truncating(),
            ScriptedAdapter::new(Chain::Ethereum),
            ScriptedAdapter::new(Chain::Tron),
        ),
        FixedPrices::btc("40000"),
        fast_settings(),
    );

    let results = coordinator.trigger_all().unwrap().handle.await.unwrap().unwrap();
    assert_eq!(results.summary.new_transactions, 5);
    let tally = &results.summary.breakdown.bitcoin;
    assert_eq!(tally.wallets_truncated, 1);
    assert_eq!(tally.wallets_failed, 0);
    assert!(tally.errors[0].contains("history truncated"));

    let repositories = Repositories::new(conn.clone());
    assert_eq!(repositories.checkpoints.get(Chain::Bitcoin, BTC_WALLET).await.unwrap(), None);

    let status = coordinator.snapshot();
    assert_eq!(status.overall.state, Phase::Completed);
    let error = status.overall.error.expect("truncation is reported");
    assert!(error.contains("truncated history"));
}
