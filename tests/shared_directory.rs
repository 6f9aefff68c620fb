//! Several `Storage` handles on one data directory, as when two `surplus`
//! commands run at the same time

use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;

use chrono::NaiveDate;
use tempfile::TempDir;

use surplus::clock::FixedClock;
use surplus::config::SurplusPaths;
use surplus::models::{Kind, KindTag, Money, OwnerId};
use surplus::notify::MemorySink;
use surplus::services::{ServiceContext, SolvencyGuard, TransactionService};
use surplus::storage::{Storage, TransactionFilter};
use surplus::validation::TransactionDraft;
use surplus::LedgerResult;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
}

fn open(dir: &Path) -> Storage {
    Storage::open(SurplusPaths::with_base_dir(dir.to_path_buf())).unwrap()
}

fn draft(kind: Kind, units: i64) -> TransactionDraft {
    TransactionDraft {
        kind,
        amount: Money::from_units(units),
        date: today(),
        category: "General".into(),
    }
}

fn record(storage: &Storage, owner: OwnerId, kind: Kind, units: i64) -> LedgerResult<()> {
    let clock = FixedClock::new(today());
    let sink = MemorySink::new();
    TransactionService::new(ServiceContext::new(storage, &clock, &sink))
        .create(owner, draft(kind, units))
        .map(|_| ())
}

fn expenses_on_disk(dir: &Path, owner: OwnerId) -> usize {
    open(dir)
        .transactions
        .list(owner, &TransactionFilter::kind(KindTag::Expense))
        .unwrap()
        .len()
}

#[test]
fn second_handle_checks_against_the_first_handles_commit() {
    let dir = TempDir::new().unwrap();
    let owner = OwnerId::new();
    record(&open(dir.path()), owner, Kind::income("Salary"), 1000).unwrap();

    // Both loaded before either spends
    let first = open(dir.path());
    let second = open(dir.path());

    record(&first, owner, Kind::expense("Rent"), 600).unwrap();
    let err = record(&second, owner, Kind::expense("Laptop"), 600).unwrap_err();

    assert!(err.is_solvency_violation());
    assert_eq!(expenses_on_disk(dir.path(), owner), 1);
    let totals = SolvencyGuard::totals(&open(dir.path()), owner, None).unwrap();
    assert_eq!(totals.expense, Money::from_units(600));
    assert!(totals.is_solvent());
}

#[test]
fn handles_do_not_drop_each_others_writes() {
    let dir = TempDir::new().unwrap();
    let first = open(dir.path());
    let second = open(dir.path());
    let alice = OwnerId::new();
    let bob = OwnerId::new();

    record(&first, alice, Kind::income("Salary"), 100).unwrap();
    record(&second, bob, Kind::income("Salary"), 200).unwrap();

    let reopened = open(dir.path());
    let all = TransactionFilter::default();
    assert_eq!(reopened.transactions.list(alice, &all).unwrap().len(), 1);
    assert_eq!(reopened.transactions.list(bob, &all).unwrap().len(), 1);
}

#[test]
fn concurrent_expenses_cannot_jointly_overspend() {
    let dir = TempDir::new().unwrap();
    let owner = OwnerId::new();
    record(&open(dir.path()), owner, Kind::income("Salary"), 1000).unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let path = dir.path().to_path_buf();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let storage = open(&path);
                barrier.wait();
                record(&storage, owner, Kind::expense(format!("Purchase {}", i)), 400)
            })
        })
        .collect();

    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|result| result.is_ok())
        .count();

    assert_eq!(accepted, 2);
    assert_eq!(expenses_on_disk(dir.path(), owner), 2);
    let totals = SolvencyGuard::totals(&open(dir.path()), owner, None).unwrap();
    assert_eq!(totals.expense, Money::from_units(800));
}
