use chrono::{DateTime, NaiveDate};

/// Formats a number as money, defaulting to a `$` symbol.
pub fn money_filter(value: Option<f64>, symbol: Option<String>) -> String {
    let symbol = symbol.unwrap_or_else(|| "$".to_string());
    format_currency(value.unwrap_or(0.0), &symbol)
}

/// Formats an ISO date or RFC 3339 timestamp; anything else passes through.
pub fn date_filter(value: Option<String>, format: Option<String>) -> String {
    let format = format.unwrap_or_else(|| "%b %d, %Y".to_string());
    value
        .map(|date| format_date_string(&date, &format))
        .unwrap_or_default()
}

pub fn format_currency(amount: f64, symbol: &str) -> String {
    let formatted = format_number_with_separators(amount.abs(), 2);
    if amount < 0.0 {
        format!("-{}{}", symbol, formatted)
    } else {
        format!("{}{}", symbol, formatted)
    }
}

pub fn format_number_with_separators(num: f64, decimals: usize) -> String {
    let formatted = format!("{:.decimals$}", num, decimals = decimals);
    let (integer, decimal) = match formatted.split_once('.') {
        Some((integer, decimal)) => (integer, Some(decimal)),
        None => (formatted.as_str(), None),
    };

    let mut result = String::new();
    for (count, c) in integer.chars().rev().enumerate() {
        if count > 0 && count % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    let integer_formatted: String = result.chars().rev().collect();

    match decimal {
        Some(decimal) => format!("{}.{}", integer_formatted, decimal),
        None => integer_formatted,
    }
}

pub fn format_date_string(date_str: &str, format: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
        return date.format(format).to_string();
    }

    if let Ok(datetime) = DateTime::parse_from_rfc3339(date_str) {
        return datetime.format(format).to_string();
    }

    date_str.to_string()
}
