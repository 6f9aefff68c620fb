use assert_cmd::Command;
use predicates::{prelude::PredicateBooleanExt, str::contains};
use tempfile::TempDir;

const BIN_NAME: &str = "surplus";

fn surplus(data_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin(BIN_NAME).expect("binary exists");
    cmd.env("SURPLUS_DATA_DIR", data_dir.path())
        .env_remove("SURPLUS_OWNER")
        .env_remove("RUST_LOG");
    cmd
}

fn initialized() -> TempDir {
    let dir = TempDir::new().expect("temp dir");
    surplus(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Created owner own-"));
    dir
}

#[test]
fn commands_require_an_owner() {
    let dir = TempDir::new().expect("temp dir");
    surplus(&dir)
        .args(["income", "list"])
        .assert()
        .failure()
        .stderr(contains("Run 'surplus init' first"));
}

#[test]
fn init_is_idempotent() {
    let dir = initialized();
    surplus(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Already initialized"));
}

#[test]
fn expense_beyond_income_is_refused() {
    let dir = initialized();

    surplus(&dir)
        .args(["income", "add", "Salary", "3000", "-d", "2024-01-05", "-c", "Salary"])
        .assert()
        .success()
        .stderr(contains("Income added successfully"));

    surplus(&dir)
        .args(["expense", "add", "Laptop", "3000.01", "-d", "2024-01-06"])
        .assert()
        .failure()
        .stderr(contains("Refused").and(contains("exceed total income by $0.01")));

    surplus(&dir)
        .args(["expense", "add", "Rent", "1200", "-d", "2024-01-06", "-c", "Housing"])
        .assert()
        .success();

    surplus(&dir)
        .args(["expense", "list"])
        .assert()
        .success()
        .stdout(contains("Rent").and(contains("Laptop").not()));
}

#[test]
fn deleting_income_that_funds_expenses_is_refused() {
    let dir = initialized();

    surplus(&dir)
        .args(["income", "add", "Salary", "1000", "-d", "2024-02-01"])
        .assert()
        .success();
    surplus(&dir)
        .args(["expense", "add", "Groceries", "400", "-d", "2024-02-02"])
        .assert()
        .success();

    surplus(&dir)
        .args(["income", "delete", "--all"])
        .assert()
        .failure()
        .stderr(contains("Cannot delete income"));

    surplus(&dir)
        .args(["income", "list"])
        .assert()
        .success()
        .stdout(contains("Salary"));
}

#[test]
fn recurring_expense_without_income_is_deferred() {
    let dir = initialized();

    surplus(&dir)
        .args([
            "recurring", "add", "expense", "Gym", "40", "--start", "2024-01-01", "--end",
            "2024-03-31",
        ])
        .assert()
        .success()
        .stderr(contains("deferred to Pending"));

    surplus(&dir)
        .args(["recurring", "due"])
        .assert()
        .success()
        .stdout(contains("Gym").and(contains("Pending")));

    surplus(&dir)
        .args(["income", "add", "Bonus", "500", "-d", "2024-01-01"])
        .assert()
        .success();

    surplus(&dir)
        .arg("process")
        .assert()
        .success()
        .stdout(contains("Created:      3 ("));

    surplus(&dir)
        .args(["recurring", "list"])
        .assert()
        .success()
        .stdout(contains("Inactive"));
}

#[test]
fn closed_month_surplus_funds_goals() {
    let dir = initialized();

    surplus(&dir)
        .args(["income", "add", "Salary", "2000", "-d", "2024-03-01"])
        .assert()
        .success();
    surplus(&dir)
        .args(["goal", "add", "Bike", "500", "--priority", "high"])
        .assert()
        .success();

    surplus(&dir)
        .arg("allocate")
        .assert()
        .success()
        .stdout(contains("Bike").and(contains("Unassigned: $1500.00")));

    surplus(&dir)
        .args(["goal", "list", "--filter", "completed"])
        .assert()
        .success()
        .stdout(contains("Bike"));
}

#[test]
fn budget_reports_category_limits() {
    let dir = initialized();

    surplus(&dir)
        .args(["income", "add", "Salary", "1000", "-d", "2024-05-01"])
        .assert()
        .success();
    surplus(&dir)
        .args([
            "budget", "add", "May", "--percent", "50", "--start", "2024-05-01", "--end",
            "2024-05-31", "--category", "Food=40",
        ])
        .assert()
        .success()
        .stdout(contains("Available income: $1000.00"));

    surplus(&dir)
        .args(["budget", "show", "may"])
        .assert()
        .success()
        .stdout(contains("Food").and(contains("$200.00")));
}

#[test]
fn invalid_input_lists_every_field() {
    let dir = initialized();

    surplus(&dir)
        .args(["expense", "add", "Coffee", "abc", "-d", "01/02/2024"])
        .assert()
        .failure()
        .stderr(contains("amount").and(contains("date")));
}
