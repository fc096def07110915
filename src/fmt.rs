use rust_decimal::Decimal;

use crate::models::Direction;

/// Format a decimal as a rupee amount with thousands separators: ₹1,234.56
pub fn money(val: Decimal) -> String {
    let negative = val.is_sign_negative() && !val.is_zero();
    let fixed = format!("{:.2}", val.abs().round_dp(2));
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    if negative {
        format!("-₹{with_commas}.{dec_part}")
    } else {
        format!("₹{with_commas}.{dec_part}")
    }
}

/// Signed view of a transaction amount: expenses negative, income positive.
pub fn signed_amount(amount: Decimal, direction: Direction) -> String {
    match direction {
        Direction::Expense => money(-amount),
        Direction::Income => format!("+{}", money(amount)),
    }
}
