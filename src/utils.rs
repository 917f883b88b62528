use colored::Colorize;
use rust_decimal::Decimal;
use crate::xrpl::drops::{format_xrp, group_thousands};

/// Format drops as whole XRP with color
pub fn format_balance(drops: Decimal) -> String {
    format!("{} XRP", format_xrp(drops, 0)).yellow().to_string()
}

/// Format drops with full precision, as used for Spark amounts
pub fn format_spark(drops: Decimal) -> String {
    format_xrp(drops, 6)
}

/// Format address truncated for display
pub fn format_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 16 {
        address.to_string()
    } else {
        let head: String = chars[..8].iter().collect();
        let tail: String = chars[chars.len() - 8..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

/// Format timestamp in human-readable format
pub fn format_timestamp(timestamp: &chrono::DateTime<chrono::Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

/// Group an integer count with thousands separators
pub fn format_count(count: u64) -> String {
    group_thousands(&count.to_string())
}

/// Print a formatted table border
pub fn print_table_border(width: usize) {
    println!("{}", "=".repeat(width));
}

/// Print a table row with columns
pub fn print_table_row(columns: &[&str], widths: &[usize]) {
    let mut row = String::new();
    for (i, col) in columns.iter().enumerate() {
        if i < widths.len() {
            row.push_str(&format!("{:<width$}  ", col, width = widths[i]));
        }
    }
    println!("{}", row.trim_end());
}
