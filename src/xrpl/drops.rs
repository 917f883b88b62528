use rust_decimal::{Decimal, RoundingStrategy};
use crate::error::{Result, SnapshotError};

/// Drops per XRP constant
pub const DROPS_PER_XRP: u64 = 1_000_000;

/// XRP created in the genesis ledger
pub const INITIAL_XRP: u64 = 100_000_000_000;

/// Genesis supply in drops
pub fn initial_supply() -> Decimal {
    Decimal::from(INITIAL_XRP) * Decimal::from(DROPS_PER_XRP)
}

/// Parse a decimal drops string as returned by the node or stored in the database
pub fn parse_drops(value: &str) -> Result<Decimal> {
    let drops = Decimal::from_str_exact(value.trim())
        .map_err(|e| SnapshotError::InvalidAmount(format!("{:?}: {}", value, e)))?;

    if drops.is_sign_negative() {
        return Err(SnapshotError::InvalidAmount(format!("{:?} is negative", value)));
    }
    Ok(drops)
}

/// Exact sum of drop amounts
pub fn sum_drops<I>(amounts: I) -> Result<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount)
            .ok_or_else(|| SnapshotError::InvalidAmount("balance overflow".to_string()))
    })
}

pub fn drops_to_xrp(drops: Decimal) -> Decimal {
    drops / Decimal::from(DROPS_PER_XRP)
}

/// Format drops as XRP with thousands separators
pub fn format_xrp(drops: Decimal, decimals: u32) -> String {
    let xrp = drops_to_xrp(drops).round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    group_thousands(&format!("{:.*}", decimals as usize, xrp))
}

/// Insert thousands separators into a plain decimal number
pub fn group_thousands(number: &str) -> String {
    let (sign, digits) = match number.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", number),
    };
    let (integer, fraction) = match digits.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (digits, None),
    };

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, c) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped, fraction),
        None => format!("{}{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_supply() {
        assert_eq!(initial_supply().to_string(), "100000000000000000");
    }

    #[test]
    fn test_parse_drops() {
        assert_eq!(parse_drops("97000000").unwrap(), Decimal::from(97_000_000u64));
        assert_eq!(parse_drops("99999999999999999").unwrap().to_string(), "99999999999999999");
        assert!(matches!(parse_drops("12abc"), Err(SnapshotError::InvalidAmount(_))));
        assert!(matches!(parse_drops("-5"), Err(SnapshotError::InvalidAmount(_))));
    }

    #[test]
    fn test_sum_drops() {
        let total = sum_drops([
            Decimal::from(97_000_000u64),
            Decimal::from(4_000_000u64),
            Decimal::from(5_000_000u64),
        ])
        .unwrap();
        assert_eq!(total, Decimal::from(106_000_000u64));
        assert_eq!(sum_drops(Vec::new()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_format_xrp() {
        assert_eq!(format_xrp(Decimal::from(106_000_000u64), 0), "106");
        assert_eq!(format_xrp(Decimal::from(1_234_567_890_000u64), 0), "1,234,568");
        assert_eq!(format_xrp(Decimal::from(1_234_567_890_123u64), 6), "1,234,567.890123");
        assert_eq!(format_xrp(Decimal::from(999u64), 6), "0.000999");
    }
}
