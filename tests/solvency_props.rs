//! Property: no sequence of ledger operations ever leaves total expense
//! above total income, whether each operation is accepted or refused.

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use tempfile::TempDir;

use surplus::clock::{Clock, FixedClock};
use surplus::config::SurplusPaths;
use surplus::models::{Frequency, Kind, Money, OwnerId};
use surplus::notify::MemorySink;
use surplus::services::{
    BalanceDelta, RecurringService, ServiceContext, SolvencyGuard, Totals, TransactionService,
};
use surplus::storage::{Storage, TransactionFilter};
use surplus::validation::{RuleDraft, TransactionDraft};

#[derive(Debug, Clone)]
enum Op {
    AddIncome(i64),
    AddExpense(i64),
    EditAmount { pick: usize, cents: i64 },
    Delete { pick: usize },
    DeleteMany { picks: Vec<usize> },
    AddRule { income: bool, cents: i64 },
    EditRule { pick: usize, cents: i64 },
    AdvanceDays(i64),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..500_000).prop_map(Op::AddIncome),
        (1i64..500_000).prop_map(Op::AddExpense),
        (any::<usize>(), 1i64..500_000).prop_map(|(pick, cents)| Op::EditAmount { pick, cents }),
        any::<usize>().prop_map(|pick| Op::Delete { pick }),
        prop::collection::vec(any::<usize>(), 1..4).prop_map(|picks| Op::DeleteMany { picks }),
        (any::<bool>(), 1i64..200_000).prop_map(|(income, cents)| Op::AddRule { income, cents }),
        (any::<usize>(), 1i64..200_000).prop_map(|(pick, cents)| Op::EditRule { pick, cents }),
        (1i64..90).prop_map(Op::AdvanceDays),
    ]
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn draft(kind: Kind, cents: i64, date: NaiveDate) -> TransactionDraft {
    TransactionDraft {
        kind,
        amount: Money::from_cents(cents),
        date,
        category: "General".into(),
    }
}

fn apply(ctx: ServiceContext<'_>, owner: OwnerId, op: &Op) {
    let today = ctx.clock.today();
    let transactions = TransactionService::new(ctx);
    let rules = RecurringService::new(ctx);

    // Refusals are expected; only the invariant matters here.
    let _ = match op {
        Op::AddIncome(cents) => transactions
            .create(owner, draft(Kind::income("Pay"), *cents, today))
            .map(|_| ()),
        Op::AddExpense(cents) => transactions
            .create(owner, draft(Kind::expense("Spend"), *cents, today))
            .map(|_| ()),
        Op::EditAmount { pick, cents } => {
            let existing = transactions
                .list(owner, &TransactionFilter::default())
                .unwrap();
            if existing.is_empty() {
                return;
            }
            let txn = &existing[pick % existing.len()];
            transactions
                .update(owner, txn.id, draft(txn.kind.clone(), *cents, txn.date))
                .map(|_| ())
        }
        Op::Delete { pick } => {
            let existing = transactions
                .list(owner, &TransactionFilter::default())
                .unwrap();
            if existing.is_empty() {
                return;
            }
            transactions
                .delete(owner, existing[pick % existing.len()].id)
                .map(|_| ())
        }
        Op::DeleteMany { picks } => {
            let existing = transactions
                .list(owner, &TransactionFilter::default())
                .unwrap();
            if existing.is_empty() {
                return;
            }
            let ids: Vec<_> = picks
                .iter()
                .map(|pick| existing[pick % existing.len()].id)
                .collect();
            transactions.delete_many(owner, &ids).map(|_| ())
        }
        Op::AddRule { income, cents } => {
            let kind = if *income {
                Kind::income("Salary")
            } else {
                Kind::expense("Rent")
            };
            let draft = RuleDraft {
                kind,
                amount: Money::from_cents(*cents),
                category: "General".into(),
                frequency: Frequency::Weekly,
                start_date: today,
                end_date: None,
            };
            rules
                .create(owner, draft)
                .and_then(|_| rules.process(owner))
                .map(|_| ())
        }
        Op::EditRule { pick, cents } => {
            let existing = rules.list(owner, None).unwrap();
            if existing.is_empty() {
                return;
            }
            let rule = &existing[pick % existing.len()];
            let draft = RuleDraft {
                kind: rule.kind.clone(),
                amount: Money::from_cents(*cents),
                category: rule.category.clone(),
                frequency: rule.frequency,
                start_date: rule.start_date,
                end_date: rule.end_date,
            };
            rules.edit(owner, rule.id, draft).map(|_| ())
        }
        Op::AdvanceDays(_) => rules.process(owner).map(|_| ()),
    };
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 48,
        ..ProptestConfig::default()
    })]

    #[test]
    fn ledger_stays_solvent(ops in prop::collection::vec(op(), 1..24)) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(SurplusPaths::with_base_dir(dir.path().to_path_buf())).unwrap();
        let clock = FixedClock::new(start_date());
        let sink = MemorySink::new();
        let ctx = ServiceContext::new(&storage, &clock, &sink);
        let owner = OwnerId::new();

        for op in &ops {
            if let Op::AdvanceDays(days) = op {
                clock.set(clock.today() + Duration::days(*days));
            }
            apply(ctx, owner, op);

            let totals = SolvencyGuard::totals(&storage, owner, None).unwrap();
            prop_assert!(
                totals.is_solvent(),
                "after {:?}: {}",
                op,
                totals
            );
        }
    }

    #[test]
    fn allowed_deltas_keep_totals_solvent(
        income in 0i64..1_000_000,
        spent in 0i64..1_000_000,
        add_income in 0i64..1_000_000,
        add_expense in 0i64..1_000_000,
    ) {
        let spent = spent.min(income);
        let totals = Totals::new(Money::from_cents(income), Money::from_cents(spent));
        let delta = BalanceDelta::add_income(Money::from_cents(add_income))
            + BalanceDelta::add_expense(Money::from_cents(add_expense));

        let verdict = SolvencyGuard::evaluate(totals, delta);
        prop_assert_eq!(verdict.is_allowed(), totals.after(delta).is_solvent());
    }
}
