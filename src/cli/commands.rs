use clap::{Parser, Subcommand};
use spark_snapshot::snapshot::Statistic;

#[derive(Parser)]
#[command(name = "spark-snapshot")]
#[command(about = "Reproducible XRP Ledger balance snapshot for the Spark (FLR) distribution")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the settings file
    #[arg(short, long, global = true, default_value = "config/default")]
    pub settings: String,

    /// SQLite database holding the pipeline data (overrides database.path)
    #[arg(short = 'd', long = "db", global = true)]
    pub database: Option<String>,

    /// Discard data a previous run of this step left behind
    #[arg(short, long, global = true)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download the account roots and escrows of a ledger
    Dump {
        /// XRPL node to dump data from
        #[arg(short, long)]
        node: Option<String>,

        /// Ledger index to dump
        #[arg(short, long)]
        index: Option<u32>,
    },

    /// Add escrowed XRP to the balance of the receiving account
    Aggregate,

    /// Label every account with its snapshot class
    Classify {
        /// Classification rules (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Run dump, aggregate and classify in sequence
    Snapshot {
        /// XRPL node to dump data from
        #[arg(short, long)]
        node: Option<String>,

        /// Ledger index to dump
        #[arg(short, long)]
        index: Option<u32>,

        /// Classification rules (JSON)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Show statistics about the snapshot
    Statistics {
        /// Statistics to show
        #[arg(short, long, value_enum, num_args = 1.., default_values_t = Statistic::ALL)]
        types: Vec<Statistic>,
    },

    /// Check that snapshots in several databases have the same content
    Compare {
        /// Databases holding the snapshots
        #[arg(short = 'D', long = "databases", num_args = 1.., required = true)]
        databases: Vec<String>,
    },

    /// Show the claim formula parameters and quota
    Formula,

    /// Show the Spark an account can claim
    Claimable {
        /// Account address
        #[arg(short, long)]
        account: String,
    },
}
