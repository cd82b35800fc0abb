//! Display formatting shared by the history table and the report panel.

use chrono::{DateTime, Datelike, Timelike, Utc};
use rust_decimal::Decimal;

use crate::types::Language;

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

const ARABIC_MONTHS: [&str; 12] = [
    "يناير", "فبراير", "مارس", "أبريل", "مايو", "يونيو",
    "يوليو", "أغسطس", "سبتمبر", "أكتوبر", "نوفمبر", "ديسمبر",
];

/// Human file size: divide by 1024 until below 1024, one decimal place.
/// Zero or unknown sizes render as `"-"`.
pub fn format_file_size(bytes: Option<u64>) -> String {
    let bytes = match bytes {
        Some(b) if b > 0 => b,
        _ => return "-".to_string(),
    };
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, SIZE_UNITS[unit])
}

/// Integer halalas to riyals, exact
pub fn halalas_to_riyals(halalas: i64) -> Decimal {
    Decimal::new(halalas, 2)
}

/// Money from minor units, two decimals with thousands separators, e.g.
/// `SAR 1,234.50` / `١٬٢٣٤٫٥٠ ر.س`.
pub fn format_money(halalas: i64, currency: &str, language: Language) -> String {
    let amount = halalas_to_riyals(halalas);
    let plain = format!("{:.2}", amount.abs());
    let (int_part, frac_part) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));
    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };

    match language {
        Language::En => format!("{}{} {}.{}", sign, currency, group_thousands(int_part, ','), frac_part),
        Language::Ar => {
            let number = format!("{}{}٫{}", sign, group_thousands(int_part, '٬'), frac_part);
            let symbol = if currency == "SAR" { "ر.س" } else { currency };
            format!("{} {}", to_arabic_digits(&number), symbol)
        }
    }
}

fn group_thousands(digits: &str, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(separator);
        }
        out.push(ch);
    }
    out
}

/// Pre-computed percentage, one decimal place
pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Locale-aware timestamp. Arabic uses Gregorian month names and
/// Arabic-Indic digits.
pub fn format_date(date: &DateTime<Utc>, language: Language) -> String {
    match language {
        Language::En => date.format("%b %-d, %Y %H:%M").to_string(),
        Language::Ar => {
            let text = format!(
                "{} {} {} {:02}:{:02}",
                date.day(),
                ARABIC_MONTHS[date.month0() as usize],
                date.year(),
                date.hour(),
                date.minute()
            );
            to_arabic_digits(&text)
        }
    }
}

pub fn to_arabic_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => char::from_u32(0x0660 + d).unwrap_or(c),
            None => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn test_file_size() {
        assert_eq!(format_file_size(None), "-");
        assert_eq!(format_file_size(Some(0)), "-");
        assert_eq!(format_file_size(Some(512)), "512.0 B");
        assert_eq!(format_file_size(Some(1536)), "1.5 KB");
        assert_eq!(format_file_size(Some(5 * 1024 * 1024)), "5.0 MB");
        assert_eq!(format_file_size(Some(1_073_741_824)), "1.0 GB");
        // GB is the largest unit
        assert_eq!(format_file_size(Some(2048 * 1_073_741_824)), "2048.0 GB");
    }

    #[test]
    fn test_halalas() {
        assert_eq!(halalas_to_riyals(123_456), dec!(1234.56));
        assert_eq!(halalas_to_riyals(-5), dec!(-0.05));
    }

    #[test]
    fn test_money() {
        assert_eq!(format_money(123_456_789, "SAR", Language::En), "SAR 1,234,567.89");
        assert_eq!(format_money(-50_000, "USD", Language::En), "-USD 500.00");
        assert_eq!(format_money(0, "SAR", Language::En), "SAR 0.00");
        assert_eq!(format_money(123_450, "SAR", Language::Ar), "١٬٢٣٤٫٥٠ ر.س");
    }

    #[test]
    fn test_percent() {
        assert_eq!(format_percent(12.345), "12.3%");
        assert_eq!(format_percent(-4.0), "-4.0%");
    }

    #[test]
    fn test_dates() {
        let date = Utc.with_ymd_and_hms(2025, 1, 5, 14, 30, 0).unwrap();
        assert_eq!(format_date(&date, Language::En), "Jan 5, 2025 14:30");
        assert_eq!(format_date(&date, Language::Ar), "٥ يناير ٢٠٢٥ ١٤:٣٠");
    }
}
