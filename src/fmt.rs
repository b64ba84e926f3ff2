use rust_decimal::{Decimal, RoundingStrategy};

/// Format a decimal as rubles with grouped thousands: 1 234,56 ₽
pub fn money(val: Decimal) -> String {
    let rounded = val.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();
    let cents = format!("{abs:.2}");
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut grouped = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if negative {
        format!("-{grouped},{dec_part} ₽")
    } else {
        format!("{grouped},{dec_part} ₽")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(d("1234.56")), "1 234,56 ₽");
        assert_eq!(money(d("-500")), "-500,00 ₽");
        assert_eq!(money(Decimal::ZERO), "0,00 ₽");
        assert_eq!(money(d("1000000.99")), "1 000 000,99 ₽");
        assert_eq!(money(d("42.1")), "42,10 ₽");
    }

    #[test]
    fn test_money_rounds_to_kopecks() {
        assert_eq!(money(d("10.005")), "10,01 ₽");
    }
}
