//! Integration tests against a real DuckDB file
//!
//! Every test builds a wallet in its own temporary directory and goes through
//! the same composition root the CLI uses.
//!
//! Run with: cargo test --test duckdb_integration_tests -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use wallet_core::adapters::duckdb::DuckDbStore;
use wallet_core::config::Config;
use wallet_core::domain::MAX_AMOUNT;
use wallet_core::services::{
    CreateAccountInput, CreateClientInput, CreateTransactionInput, CreateTransactionOutput,
};
use wallet_core::{
    EntryPoint, ErrorKind, ExecutionContext, LoggingService, OverdraftPolicy, WalletContext,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_wallet(temp_dir: &TempDir) -> WalletContext {
    WalletContext::with_config(temp_dir.path(), Config::default(), None)
        .expect("Failed to open wallet")
}

/// Create a client with one account holding `balance`; returns the account id
fn create_funded_account(wallet: &WalletContext, name: &str, balance: i64) -> String {
    let ctx = ExecutionContext::background();
    let client = wallet
        .create_client
        .execute(
            &ctx,
            CreateClientInput {
                name: name.to_string(),
                email: format!("{}@example.com", name.to_lowercase().replace(' ', ".")),
            },
        )
        .unwrap();
    let account = wallet
        .create_account
        .execute(
            &ctx,
            CreateAccountInput {
                client_id: client.id.to_string(),
                initial_balance: Some(Decimal::new(balance, 0)),
            },
        )
        .unwrap();
    account.id.to_string()
}

fn transfer(
    wallet: &WalletContext,
    from: &str,
    to: &str,
    amount: Decimal,
) -> wallet_core::Result<CreateTransactionOutput> {
    wallet.create_transaction.execute(
        &ExecutionContext::background(),
        CreateTransactionInput {
            account_id_from: from.to_string(),
            account_id_to: to.to_string(),
            amount,
        },
    )
}

fn balance(wallet: &WalletContext, account_id: &str) -> Decimal {
    wallet
        .query_service
        .get_account(&ExecutionContext::background(), account_id)
        .unwrap()
        .balance
}

// ============================================================================
// Transfers
// ============================================================================

#[test]
fn test_transfer_between_two_clients() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);
    let a = create_funded_account(&wallet, "John Doe", 100);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    let output = transfer(&wallet, &a, &b, Decimal::new(40, 0)).unwrap();

    assert_eq!(output.amount, Decimal::new(40, 0));
    assert_eq!(balance(&wallet, &a), Decimal::new(60, 0));
    assert_eq!(balance(&wallet, &b), Decimal::new(40, 0));

    let history = wallet
        .query_service
        .history(&ExecutionContext::background(), &a)
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, output.id);
    assert_eq!(history[0].effect_on(Uuid::parse_str(&a).unwrap()), Decimal::new(-40, 0));
}

#[test]
fn test_fractional_amounts_keep_their_precision() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);
    let a = create_funded_account(&wallet, "John Doe", 10);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    transfer(&wallet, &a, &b, Decimal::new(12345, 4)).unwrap();

    assert_eq!(balance(&wallet, &a), Decimal::new(87655, 4));
    assert_eq!(balance(&wallet, &b), Decimal::new(12345, 4));
}

#[test]
fn test_rejected_transfer_persists_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);
    let a = create_funded_account(&wallet, "John Doe", 100);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    let err = transfer(&wallet, &a, &b, Decimal::new(150, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = transfer(&wallet, &a, &Uuid::new_v4().to_string(), Decimal::ONE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(balance(&wallet, &a), Decimal::new(100, 0));
    assert_eq!(balance(&wallet, &b), Decimal::ZERO);
    let history = wallet
        .query_service
        .history(&ExecutionContext::background(), &a)
        .unwrap();
    assert!(history.is_empty());
}

#[test]
fn test_overdraft_policy_from_config() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.overdraft = OverdraftPolicy::Limit { limit: Decimal::new(50, 0) };
    let wallet = WalletContext::with_config(temp_dir.path(), config, None).unwrap();
    let a = create_funded_account(&wallet, "John Doe", 0);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    transfer(&wallet, &a, &b, Decimal::new(50, 0)).unwrap();
    assert!(transfer(&wallet, &a, &b, Decimal::new(1, 2)).is_err());
    assert_eq!(balance(&wallet, &a), Decimal::new(-50, 0));
}

#[test]
fn test_amounts_beyond_storage_range_are_validation_errors() {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.overdraft = OverdraftPolicy::Allow;
    let wallet = WalletContext::with_config(temp_dir.path(), config, None).unwrap();
    let a = create_funded_account(&wallet, "John Doe", 0);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    let err = transfer(&wallet, &a, &b, Decimal::new(100_000_000_000_000, 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    // The largest storable amount round-trips through the DECIMAL(18, 4) column
    transfer(&wallet, &a, &b, MAX_AMOUNT).unwrap();
    assert_eq!(balance(&wallet, &a), -MAX_AMOUNT);
    assert_eq!(balance(&wallet, &b), MAX_AMOUNT);

    let err = transfer(&wallet, &a, &b, Decimal::ONE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(balance(&wallet, &a), -MAX_AMOUNT);
}

// ============================================================================
// Clients and Accounts
// ============================================================================

#[test]
fn test_oversized_opening_deposit_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);
    let ctx = ExecutionContext::background();
    let client = wallet
        .create_client
        .execute(
            &ctx,
            CreateClientInput {
                name: "John Doe".to_string(),
                email: "j@j.com".to_string(),
            },
        )
        .unwrap();

    let err = wallet
        .create_account
        .execute(
            &ctx,
            CreateAccountInput {
                client_id: client.id.to_string(),
                initial_balance: Some(MAX_AMOUNT + Decimal::ONE),
            },
        )
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    let loaded = wallet.query_service.get_client(&ctx, &client.id.to_string()).unwrap();
    assert!(loaded.accounts.is_empty());
}

#[test]
fn test_client_lists_its_accounts() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);
    let ctx = ExecutionContext::background();

    let client = wallet
        .create_client
        .execute(
            &ctx,
            CreateClientInput {
                name: "John Doe".to_string(),
                email: "j@j.com".to_string(),
            },
        )
        .unwrap();
    for _ in 0..2 {
        wallet
            .create_account
            .execute(
                &ctx,
                CreateAccountInput {
                    client_id: client.id.to_string(),
                    initial_balance: None,
                },
            )
            .unwrap();
    }

    let loaded = wallet.query_service.get_client(&ctx, &client.id.to_string()).unwrap();
    assert_eq!(loaded.name, "John Doe");
    assert_eq!(loaded.email, "j@j.com");
    assert_eq!(loaded.accounts.len(), 2);
    assert!(loaded.accounts.iter().all(|a| a.client_id == client.id));
}

#[test]
fn test_account_for_unknown_client() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);

    let err = wallet
        .create_account
        .execute(
            &ExecutionContext::background(),
            CreateAccountInput {
                client_id: Uuid::new_v4().to_string(),
                initial_balance: None,
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_invalid_client_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = create_test_wallet(&temp_dir);

    let err = wallet
        .create_client
        .execute(
            &ExecutionContext::background(),
            CreateClientInput {
                name: String::new(),
                email: "j@j.com".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

// ============================================================================
// Durability
// ============================================================================

#[test]
fn test_data_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let (a, b) = {
        let wallet = create_test_wallet(&temp_dir);
        let a = create_funded_account(&wallet, "John Doe", 100);
        let b = create_funded_account(&wallet, "Jane Doe", 0);
        transfer(&wallet, &a, &b, Decimal::new(40, 0)).unwrap();
        (a, b)
    };

    let wallet = create_test_wallet(&temp_dir);
    assert_eq!(balance(&wallet, &a), Decimal::new(60, 0));
    assert_eq!(balance(&wallet, &b), Decimal::new(40, 0));
}

#[test]
fn test_sequential_opens() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test_sequential.duckdb");

    for i in 0..5 {
        let start = Instant::now();
        let store = DuckDbStore::open(&db_path).unwrap();
        let result = store.run_migrations().unwrap();
        if i > 0 {
            assert!(result.applied.is_empty());
        }
        println!("Open {}: {:?}", i, start.elapsed());
    }
}

// ============================================================================
// Activity Log
// ============================================================================

#[test]
fn test_activity_log_records_committed_transfers() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Library, "test").unwrap());
    let wallet =
        WalletContext::with_config(temp_dir.path(), Config::default(), Some(Arc::clone(&logger)))
            .unwrap();
    let a = create_funded_account(&wallet, "John Doe", 100);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    let output = transfer(&wallet, &a, &b, Decimal::new(40, 0)).unwrap();
    transfer(&wallet, &a, &b, Decimal::new(500, 0)).unwrap_err();

    let entries = logger.get_recent(10).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].event, "transaction_created");
    assert_eq!(entries[0].reference, Some(output.id.to_string()));
}

#[test]
fn test_activity_log_disabled_in_config() {
    let temp_dir = TempDir::new().unwrap();
    let logger = Arc::new(LoggingService::new(temp_dir.path(), EntryPoint::Library, "test").unwrap());
    let mut config = Config::default();
    config.activity_log = false;
    let wallet = WalletContext::with_config(temp_dir.path(), config, Some(Arc::clone(&logger))).unwrap();
    let a = create_funded_account(&wallet, "John Doe", 100);
    let b = create_funded_account(&wallet, "Jane Doe", 0);

    transfer(&wallet, &a, &b, Decimal::new(40, 0)).unwrap();
    assert_eq!(logger.count().unwrap(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

const THREAD_COUNT: usize = 4;
const TRANSFERS_PER_THREAD: usize = 5;
const MAX_ATTEMPTS: usize = 50;

/// Concurrent transfers between the same two accounts never create or lose money.
/// Conflicting writers fail with a persistence error and retry.
#[test]
fn test_concurrent_transfers_conserve_money() {
    let temp_dir = TempDir::new().unwrap();
    let wallet = Arc::new(create_test_wallet(&temp_dir));
    let a = Arc::new(create_funded_account(&wallet, "John Doe", 100));
    let b = Arc::new(create_funded_account(&wallet, "Jane Doe", 100));

    let barrier = Arc::new(Barrier::new(THREAD_COUNT));
    let success_count = Arc::new(AtomicUsize::new(0));
    let conflict_count = Arc::new(AtomicUsize::new(0));

    let mut handles = vec![];
    for thread_id in 0..THREAD_COUNT {
        let wallet = Arc::clone(&wallet);
        let barrier = Arc::clone(&barrier);
        let success_count = Arc::clone(&success_count);
        let conflict_count = Arc::clone(&conflict_count);
        // Half the threads move money one way, half the other
        let (from, to) = if thread_id % 2 == 0 {
            (Arc::clone(&a), Arc::clone(&b))
        } else {
            (Arc::clone(&b), Arc::clone(&a))
        };

        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..TRANSFERS_PER_THREAD {
                for _ in 0..MAX_ATTEMPTS {
                    match transfer(&wallet, &from, &to, Decimal::ONE) {
                        Ok(_) => {
                            success_count.fetch_add(1, Ordering::SeqCst);
                            break;
                        }
                        Err(e) if e.kind() == ErrorKind::Persistence => {
                            conflict_count.fetch_add(1, Ordering::SeqCst);
                            thread::yield_now();
                        }
                        Err(e) => panic!("Thread {}: unexpected error: {}", thread_id, e),
                    }
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let successes = success_count.load(Ordering::SeqCst);
    println!(
        "Successes: {}, conflicts: {}",
        successes,
        conflict_count.load(Ordering::SeqCst)
    );

    let total = balance(&wallet, &a) + balance(&wallet, &b);
    assert_eq!(total, Decimal::new(200, 0), "money was created or lost");

    let ctx = ExecutionContext::background();
    let recorded = wallet.query_service.history(&ctx, &a).unwrap().len();
    assert_eq!(recorded, successes);
}
