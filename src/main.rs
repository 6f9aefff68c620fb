use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use surplus::cli::{
    handle_budget_command, handle_goal_command, handle_recurring_command,
    handle_transaction_command, CliContext,
};
use surplus::clock::SystemClock;
use surplus::config::{SurplusPaths, Settings};
use surplus::display::{format_dashboard, format_goal_list, format_notices, format_scheduler_report};
use surplus::models::{GoalFilter, KindTag, OwnerId};
use surplus::notify::MemorySink;
use surplus::services::{DashboardService, GoalService, RecurringService, ServiceContext};
use surplus::storage::Storage;

#[derive(Parser)]
#[command(
    name = "surplus",
    author = "Kaylee Beyene",
    version,
    about = "Personal ledger that never lets expenses outrun income",
    long_about = "Surplus records one-off and recurring income and expenses, \
                  refuses any change that would leave total expenses above \
                  total income, and spreads the surplus of closed months \
                  across your savings goals."
)]
struct Cli {
    /// Ledger owner ID (defaults to the owner created by `init`)
    #[arg(long, global = true, env = "SURPLUS_OWNER")]
    owner: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the ledger and create the default owner
    Init,

    /// Show current configuration and paths
    Config,

    /// One-off income
    #[command(subcommand)]
    Income(surplus::cli::TransactionCommands),

    /// One-off expenses
    #[command(subcommand)]
    Expense(surplus::cli::TransactionCommands),

    /// Recurring income and expense rules
    #[command(subcommand, alias = "rec")]
    Recurring(surplus::cli::RecurringCommands),

    /// Savings goals
    #[command(subcommand)]
    Goal(surplus::cli::GoalCommands),

    /// Percentage budgets
    #[command(subcommand)]
    Budget(surplus::cli::BudgetCommands),

    /// Materialize every recurring transaction due by today
    Process,

    /// Distribute the unassigned surplus across savings goals
    Allocate,

    /// Bring the ledger up to date and show an overview
    Dashboard,
}

/// Install the fmt subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn resolve_owner(flag: Option<&str>, settings: &Settings) -> Result<OwnerId> {
    match flag {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid owner ID '{}': {}", raw, e)),
        None => settings
            .default_owner
            .ok_or_else(|| anyhow!("No owner configured. Run 'surplus init' first.")),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = SurplusPaths::new()?;
    let mut settings = Settings::load_or_create(&paths)?;
    init_tracing(&settings.log_level);

    let command = match cli.command {
        Some(command) => command,
        None => {
            println!("Surplus - a ledger that stays solvent");
            println!();
            println!("Run 'surplus --help' for usage information.");
            return Ok(());
        }
    };

    match command {
        Commands::Init => {
            println!("Initializing Surplus at: {}", paths.base_dir().display());
            Storage::new(paths.clone())?;
            let (owner, created) = settings.ensure_default_owner();
            settings.save(&paths)?;
            if created {
                println!("Created owner {}", owner);
            } else {
                println!("Already initialized for owner {}", owner);
            }
            return Ok(());
        }
        Commands::Config => {
            println!("Surplus Configuration");
            println!("=====================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Audit log:        {}", paths.audit_log().display());
            println!();
            println!("Settings:");
            match settings.default_owner {
                Some(owner) => println!("  Default owner:    {}", owner),
                None => println!("  Default owner:    (none, run 'surplus init')"),
            }
            println!("  Currency symbol:  {}", settings.currency_symbol);
            println!("  Date format:      {}", settings.date_format);
            println!("  Log level:        {}", settings.log_level);
            println!(
                "  Scheduler passes: {} per rule",
                settings.scheduler.max_passes_per_rule
            );
            return Ok(());
        }
        _ => {}
    }

    let owner = resolve_owner(cli.owner.as_deref(), &settings)?;
    let storage = Storage::open(paths.clone()).context("Failed to open ledger data")?;
    let clock = SystemClock;
    let sink = MemorySink::new();
    let services = ServiceContext::new(&storage, &clock, &sink)
        .with_max_passes_per_rule(settings.scheduler.max_passes_per_rule);
    let cx = CliContext {
        services,
        owner,
        settings: &settings,
    };

    let result = run(&cx, command);

    // Notices are printed even when the command failed; they explain why.
    let notices = format_notices(&sink.drain());
    if !notices.is_empty() {
        eprint!("{}", notices);
    }
    result
}

fn run(cx: &CliContext<'_>, command: Commands) -> Result<()> {
    match command {
        Commands::Income(cmd) => handle_transaction_command(cx, KindTag::Income, cmd)?,
        Commands::Expense(cmd) => handle_transaction_command(cx, KindTag::Expense, cmd)?,
        Commands::Recurring(cmd) => handle_recurring_command(cx, cmd)?,
        Commands::Goal(cmd) => handle_goal_command(cx, cmd)?,
        Commands::Budget(cmd) => handle_budget_command(cx, cmd)?,
        Commands::Process => {
            let report = RecurringService::new(cx.services).process(cx.owner)?;
            print!("{}", format_scheduler_report(&report, cx.symbol()));
        }
        Commands::Allocate => {
            let outcome = cx.services.allocator().run(cx.owner)?;
            let goals = GoalService::new(cx.services).list(cx.owner, GoalFilter::All)?;
            print!("{}", format_goal_list(&goals, cx.symbol()));
            println!(
                "Unassigned: {}",
                outcome.tracker.accumulated_balance.format_with_symbol(cx.symbol())
            );
        }
        Commands::Dashboard => {
            let dashboard = DashboardService::new(cx.services).render(cx.owner)?;
            print!("{}", format_dashboard(&dashboard, cx.symbol()));
        }
        Commands::Init | Commands::Config => {}
    }
    Ok(())
}
