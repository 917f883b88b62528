pub mod aggregate;
pub mod classify;
pub mod formula;
pub mod statistics;

pub use aggregate::{AggregateSummary, BalanceAggregator};
pub use classify::{ClassificationConfig, ClassificationEngine, ClassificationSummary, Classifier, DataClass};
pub use formula::{ClaimStatus, FormulaCalculator, FormulaParameters};
pub use statistics::Statistic;
