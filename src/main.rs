mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use spark_snapshot::{
    config::Config,
    dump,
    error::{self, SnapshotError},
    snapshot::{
        statistics, BalanceAggregator, ClaimStatus, ClassificationConfig, ClassificationEngine,
        ClassificationSummary, DataClass, FormulaCalculator, Statistic,
    },
    storage::{Collection, Database},
    utils,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("spark_snapshot=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load(&cli.settings) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let db_path = cli.database.clone().unwrap_or_else(|| config.database.path.clone());
    let force = cli.force;

    let result = match cli.command {
        Commands::Dump { node, index } => {
            run_dump(&config, &db_path, force, node.as_deref(), index).await
        }

        Commands::Aggregate => run_aggregate(&db_path, force),

        Commands::Classify { config: rules } => run_classify(&config, &db_path, force, rules.as_deref()),

        Commands::Snapshot { node, index, config: rules } => {
            run_snapshot(&config, &db_path, force, node.as_deref(), index, rules.as_deref()).await
        }

        Commands::Statistics { types } => show_statistics(&db_path, &types),

        Commands::Compare { databases } => compare_snapshots(&databases),

        Commands::Formula => show_formula(&db_path),

        Commands::Claimable { account } => show_claimable(&db_path, &account),
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn load_rules(config: &Config, rules: Option<&str>) -> error::Result<ClassificationConfig> {
    let path = rules.unwrap_or(&config.classification.rules_path);
    debug!("Reading classification rules from {}", path);
    ClassificationConfig::load(path)
}

async fn run_dump(
    config: &Config,
    db_path: &str,
    force: bool,
    node: Option<&str>,
    index: Option<u32>,
) -> error::Result<()> {
    let node = config.node_url(node)?;
    let index = index.unwrap_or(config.dump.ledger_index);

    let db = Database::prepare(db_path, force, &[Collection::Dump, Collection::Meta], &[])?;
    dump::run(&db, config, &node, index).await?;
    db.close()?;

    println!("{}", format!("✓ Dumped ledger {} from {}", index, node).green());
    Ok(())
}

fn run_aggregate(db_path: &str, force: bool) -> error::Result<()> {
    let db = Database::prepare(db_path, force, &[Collection::Aggregate], &[Collection::Dump])?;
    let summary = BalanceAggregator::new(&db).aggregate()?;
    db.close()?;

    println!(
        "{}",
        format!(
            "✓ Aggregated {} accounts ({} receive escrows)",
            utils::format_count(summary.accounts),
            utils::format_count(summary.escrow_destinations)
        )
        .green()
    );
    Ok(())
}

fn run_classify(config: &Config, db_path: &str, force: bool, rules: Option<&str>) -> error::Result<()> {
    let rules = load_rules(config, rules)?;
    let db = Database::prepare(db_path, force, &[Collection::Snapshot], &[Collection::Aggregate])?;
    let summary = ClassificationEngine::new(&db, &rules).classify()?;
    db.close()?;

    print_classification(&summary);
    Ok(())
}

async fn run_snapshot(
    config: &Config,
    db_path: &str,
    force: bool,
    node: Option<&str>,
    index: Option<u32>,
    rules: Option<&str>,
) -> error::Result<()> {
    let node = config.node_url(node)?;
    let index = index.unwrap_or(config.dump.ledger_index);
    let rules = load_rules(config, rules)?;

    let db = Database::prepare(
        db_path,
        force,
        &[Collection::Dump, Collection::Meta, Collection::Aggregate, Collection::Snapshot],
        &[],
    )?;

    dump::run(&db, config, &node, index).await?;
    BalanceAggregator::new(&db).aggregate()?;
    let summary = ClassificationEngine::new(&db, &rules).classify()?;
    db.close()?;

    print_classification(&summary);
    println!("{}", format!("✓ Created snapshot of ledger {} from {}", index, node).green());
    Ok(())
}

fn print_classification(summary: &ClassificationSummary) {
    println!("{}", "=== Classification ===".cyan().bold());
    utils::print_table_border(40);
    utils::print_table_row(&["Class", "Accounts"], &[20, 16]);
    utils::print_table_border(40);
    for class in DataClass::ALL {
        utils::print_table_row(&[class.as_str(), utils::format_count(summary.count(class)).as_str()], &[20, 16]);
    }
    utils::print_table_border(40);
    utils::print_table_row(&["TOTAL", utils::format_count(summary.total()).as_str()], &[20, 16]);
}

fn show_statistics(db_path: &str, types: &[Statistic]) -> error::Result<()> {
    let db = Database::prepare(db_path, false, &[], &[Collection::Snapshot])?;

    println!("{}", "=== Snapshot Statistics ===".cyan().bold());
    if types.contains(&Statistic::TotalParticipatingCount) {
        let count = statistics::participating_count(&db)?;
        println!("  Participating accounts:  {}", utils::format_count(count).green());
    }
    if types.contains(&Statistic::TotalParticipatingBalance) {
        let balance = statistics::participating_balance(&db)?;
        println!("  Total XRP balance:       {}", utils::format_balance(balance));
    }

    debug!("Per-class breakdown of {}", db.path());
    utils::print_table_border(60);
    utils::print_table_row(&["Class", "Accounts", "Balance"], &[20, 14, 20]);
    utils::print_table_border(60);
    for (class, count, balance) in statistics::class_breakdown(&db)? {
        utils::print_table_row(
            &[class.as_str(), utils::format_count(count).as_str(), utils::format_spark(balance).as_str()],
            &[20, 14, 20],
        );
    }
    utils::print_table_border(60);

    db.close()
}

fn compare_snapshots(databases: &[String]) -> error::Result<()> {
    let mut hashes = Vec::with_capacity(databases.len());
    for path in databases {
        debug!("Comparing {}...", path);
        let db = Database::prepare(path, false, &[], &[Collection::Snapshot])?;
        hashes.push(db.snapshot_hash()?);
        db.close()?;
    }

    println!("{}", "Hashes:".cyan());
    for (path, hash) in databases.iter().zip(&hashes) {
        println!("  {}: {}", path, hash);
    }

    let all_equal = hashes.windows(2).all(|pair| pair[0] == pair[1]);
    if !all_equal {
        return Err(SnapshotError::DataIntegrity("Snapshots do not match!".to_string()));
    }

    println!("{}", "✓ All snapshots have the same content!".green());
    Ok(())
}

fn show_formula(db_path: &str) -> error::Result<()> {
    let db = Database::prepare(db_path, false, &[], &[Collection::Meta, Collection::Snapshot])?;
    let calculator = FormulaCalculator::new(&db);
    let params = calculator.parameters()?;
    let quota = params.quota()?;

    if let Some(meta) = db.read_meta()? {
        info!(
            "Ledger {} dumped at {}",
            meta.ledger_index,
            utils::format_timestamp(&meta.created_at)
        );
    }

    println!("{}", "=== Claim Formula ===".cyan().bold());
    println!("  XRP Total:   {}", utils::format_balance(params.total_xrp));
    println!("  XRP Ripple:  {}", utils::format_balance(params.ripple_xrp));
    println!("  XRP NPE:     {}", utils::format_balance(params.npe_xrp));
    println!("  Quota:       {}", quota.to_string().green());

    db.close()
}

fn show_claimable(db_path: &str, account: &str) -> error::Result<()> {
    let db = Database::prepare(db_path, false, &[], &[Collection::Snapshot])?;
    let status = FormulaCalculator::new(&db).claim_status(account)?;

    println!("{}", format!("=== {} ===", utils::format_address(account)).cyan().bold());
    match status {
        ClaimStatus::Eligible { balance, claimable } => {
            println!("  Snapshot Balance:  {} XRP", utils::format_spark(balance));
            println!("  Claimable Spark:   {} FLR", utils::format_spark(claimable).green());
        }
        ClaimStatus::MissingKey => {
            println!("{}", "Set a valid message key to claim Spark (FLR).".yellow());
        }
        ClaimStatus::NotEligible => {
            println!("{}", "Not eligible to receive any Spark.".red());
        }
    }

    db.close()
}
