//! Price text normalization.
//!
//! Rendered prices arrive as e.g. `"€1,234\n56"`: whole and fractional parts
//! split across elements (hence the newline) and a comma as thousands
//! separator. The two rewrites below handle exactly that shape. Other
//! formats, such as a decimal comma, are not understood and come out wrong
//! or fail to parse.

use crate::error::PriceError;

pub fn parse_price(text: &str, currency: &str) -> Result<f64, PriceError> {
    let amount = text
        .split(currency)
        .nth(1)
        .ok_or_else(|| PriceError::MissingCurrency {
            currency: currency.to_string(),
            text: text.to_string(),
        })?;

    let amount = join_first_two(amount, '\n', ".");
    let amount = join_first_two(&amount, ',', "");

    let normalized = amount.trim();
    normalized
        .parse::<f64>()
        .map_err(|_| PriceError::Unparseable {
            normalized: normalized.to_string(),
        })
}

/// Rejoins the first two `sep`-separated segments with `glue`, dropping any
/// further segments. Text without `sep` is returned unchanged.
fn join_first_two(text: &str, sep: char, glue: &str) -> String {
    let mut parts = text.split(sep);
    match (parts.next(), parts.next()) {
        (Some(first), Some(second)) => format!("{first}{glue}{second}"),
        _ => text.to_string(),
    }
}

/// The part of `text` starting at the currency symbol, if it has one.
pub fn from_currency<'a>(text: &'a str, currency: &str) -> Option<&'a str> {
    text.find(currency).map(|start| &text[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newline_marks_the_decimal_point() {
        assert_eq!(parse_price("$12\n99", "$"), Ok(12.99));
    }

    #[test]
    fn comma_is_a_thousands_separator() {
        assert_eq!(parse_price("$1,234", "$"), Ok(1234.0));
        assert_eq!(parse_price("€1,234\n56", "€"), Ok(1234.56));
    }

    #[test]
    fn plain_amount_is_unchanged() {
        assert_eq!(parse_price("$5", "$"), Ok(5.0));
        assert_eq!(parse_price("€ 349.99 ", "€"), Ok(349.99));
    }

    #[test]
    fn only_first_two_segments_survive() {
        assert_eq!(parse_price("$1,234,567", "$"), Ok(1234.0));
        assert_eq!(parse_price("$1\n2\n3", "$"), Ok(1.2));
    }

    #[test]
    fn decimal_comma_is_misread() {
        assert_eq!(parse_price("€12,99", "€"), Ok(1299.0));
    }

    #[test]
    fn text_after_a_second_symbol_is_ignored() {
        assert_eq!(parse_price("€10€20", "€"), Ok(10.0));
    }

    #[test]
    fn missing_symbol_and_garbage_fail() {
        assert!(matches!(
            parse_price("12.99", "$"),
            Err(PriceError::MissingCurrency { .. })
        ));
        assert!(matches!(
            parse_price("$free", "$"),
            Err(PriceError::Unparseable { .. })
        ));
    }

    #[test]
    fn slices_from_the_symbol() {
        assert_eq!(from_currency("from €12,50 new", "€"), Some("€12,50 new"));
        assert_eq!(from_currency("n/a", "€"), None);
    }
}
