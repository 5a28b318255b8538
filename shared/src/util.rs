//! Money and timestamp helpers

use rust_decimal::{Decimal, RoundingStrategy};

/// Currency suffix shown after amounts
pub const CURRENCY: &str = "сом";

/// Format an amount with exactly two decimals, e.g. `230.00`
pub fn money(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", rounded)
}

/// Amount followed by the currency, e.g. `130.00 сом`
pub fn money_with_currency(amount: Decimal) -> String {
    format!("{} {}", money(amount), CURRENCY)
}

/// ISO-8601 UTC timestamps with millisecond precision and a `Z` suffix,
/// the format the backend expects for `startTime`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::Serializer;

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(ts) => serializer.serialize_str(&format(ts)),
            None => serializer.serialize_none(),
        }
    }
}
