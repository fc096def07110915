//! Cheap gate that decides whether a piece of text is worth running the
//! extractor on.
//!
//! Three checks, in order:
//! 1. no exclusion phrase (OTP, promo, reminder, failure). Runs first and wins.
//! 2. an amount is present.
//! 3. a transaction keyword is present, or the text comes from a known bank/app.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::extractor::is_known_source;
use crate::models::RawTextEvent;

static EXCLUSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:",
        r"otp|one[\s-]time\s+password|verification\s+code|verify|passcode|",
        r"promo(?:tion|tional)?|offers?|discount|coupon|cashback\s+up\s+to|win\b|",
        r"bill\s+(?:is\s+)?due|due\s+(?:date|on|by)|reminder|overdue|",
        r"failed|declined|unsuccessful|could\s+not\s+be\s+processed|",
        r"requested|request\s+(?:of|for)",
        r")"
    ))
    .expect("exclusion pattern is valid")
});

pub(crate) static CURRENCY_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\b(?:rs|inr|usd|eur|gbp)\.?|[₹$€£])\s*(?P<amount>[0-9]+(?:,[0-9]+)*(?:\.[0-9]{1,2})?)",
    )
    .expect("currency pattern is valid")
});

// Bank phrasings that put the number without a currency marker.
static INSTITUTION_AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:debited|credited)\s+(?:by|for|with)\s+[0-9]+(?:,[0-9]+)*(?:\.[0-9]{1,2})?\b",
        r"|\b[0-9]+(?:,[0-9]+)*(?:\.[0-9]{1,2})?\s+on\s+[0-9]{1,2}[-/ ]?[a-z0-9]",
    ))
    .expect("institution amount pattern is valid")
});

pub(crate) static DEBIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:paid|sent|debited|spent|withdrawn|payment\s+to|transfer(?:red)?\s+to|to\s+vpa)\b",
    )
    .expect("debit pattern is valid")
});

pub(crate) static CREDIT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:received|credited|refund(?:ed)?|deposited|payment\s+from|from\s+vpa)\b",
    )
    .expect("credit pattern is valid")
});

// Bank and app names as they appear inside message text.
static INSTITUTION_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(?:hdfc|icici|sbi|axis|kotak|yes\s+bank|idfc|indusind|pnb|bob|canara|",
        r"federal\s+bank|paytm|phonepe|gpay|google\s+pay|bhim|amazon\s+pay|cred|upi)\b",
    ))
    .expect("institution name pattern is valid")
});

pub fn has_exclusion(text: &str) -> bool {
    EXCLUSION_RE.is_match(text)
}

pub fn has_amount(text: &str) -> bool {
    CURRENCY_AMOUNT_RE.is_match(text) || INSTITUTION_AMOUNT_RE.is_match(text)
}

pub fn has_direction_keyword(text: &str) -> bool {
    DEBIT_RE.is_match(text) || CREDIT_RE.is_match(text)
}

/// Decides from text alone. Institution evidence comes from bank or app
/// names mentioned in the text.
pub fn is_transaction_like(title: &str, body: &str) -> bool {
    classify(title, body, false)
}

/// Same as [`is_transaction_like`], but a recognized sender or package also
/// counts as institution evidence.
pub fn classify_event(event: &RawTextEvent) -> bool {
    classify(&event.title, &event.text, is_known_source(&event.source_channel))
}

fn classify(title: &str, body: &str, known_source: bool) -> bool {
    let text = format!("{title} {body}").to_lowercase();

    if has_exclusion(&text) {
        return false;
    }
    if !has_amount(&text) {
        return false;
    }
    has_direction_keyword(&text) || known_source || INSTITUTION_NAME_RE.is_match(&text)
}
