//! Human-facing document numbers: `PREFIX-SSS-MMDDYY` with a per-day
//! sequence. Proposals use the `MWQ` prefix, orders `MW`.

use chrono::NaiveDate;

pub const PROPOSAL_PREFIX: &str = "MWQ";
pub const ORDER_PREFIX: &str = "MW";

pub fn format_number(prefix: &str, seq: i64, date: NaiveDate) -> String {
    format!("{prefix}-{seq:03}-{}", date.format("%m%d%y"))
}

/// Date bucket key used to scope the per-day sequence.
pub fn date_bucket(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{date_bucket, format_number};

    #[test]
    fn numbers_carry_padded_sequence_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 7).expect("date");
        assert_eq!(format_number("MWQ", 3, date), "MWQ-003-080726");
        assert_eq!(format_number("MW", 117, date), "MW-117-080726");
        assert_eq!(date_bucket(date), "2026-08-07");
    }
}
