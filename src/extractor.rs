//! Pulls amount, direction, counterparty and account out of bank SMS and
//! payment-app notification text.
//!
//! Source-specific formats live in one ordered table. The first entry whose
//! regex matches wins and no later entry is consulted, so more specific
//! formats must sit above the generic ones. When nothing in the table
//! matches, a generic pass looks for any currency amount and decides the
//! direction from keywords.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use tracing::trace;

use crate::classifier::{CREDIT_RE, CURRENCY_AMOUNT_RE, DEBIT_RE};
use crate::error::Result;
use crate::models::{Direction, ParsedTransaction};

/// Label used when the source channel is not in [`SOURCE_LABELS`].
pub const GENERIC_LABEL: &str = "Bank/UPI";

const MAX_COUNTERPARTY_LEN: usize = 60;

// (lowercased needle found in package name or SMS sender id, label)
const SOURCE_LABELS: &[(&str, &str)] = &[
    ("com.google.android.apps.nbu.paisa.user", "Google Pay"),
    ("com.phonepe.app", "PhonePe"),
    ("net.one97.paytm", "Paytm"),
    ("in.org.npci.upiapp", "BHIM"),
    ("in.amazon.mshop.android.shopping", "Amazon Pay"),
    ("com.dreamplug.androidapp", "CRED"),
    ("com.snapwork.hdfc", "HDFC Bank"),
    ("com.csam.icici.bank.imobile", "ICICI Bank"),
    ("com.sbi.lotusintouch", "State Bank of India"),
    ("com.sbi.upi", "State Bank of India"),
    ("com.axis.mobile", "Axis Bank"),
    ("com.msf.kbank.mobile", "Kotak Mahindra Bank"),
    ("hdfcbk", "HDFC Bank"),
    ("icicib", "ICICI Bank"),
    ("icicit", "ICICI Bank"),
    ("sbiinb", "State Bank of India"),
    ("sbiupi", "State Bank of India"),
    ("cbssbi", "State Bank of India"),
    ("atmsbi", "State Bank of India"),
    ("axisbk", "Axis Bank"),
    ("kotakb", "Kotak Mahindra Bank"),
    ("yesbnk", "Yes Bank"),
    ("idfcfb", "IDFC First Bank"),
    ("indusb", "IndusInd Bank"),
    ("paytmb", "Paytm"),
    ("phonpe", "PhonePe"),
];

fn lookup_source(source_channel: &str) -> Option<&'static str> {
    let channel = source_channel.to_lowercase();
    SOURCE_LABELS
        .iter()
        .find(|(needle, _)| channel.contains(needle))
        .map(|(_, label)| *label)
}

pub fn source_label(source_channel: &str) -> &'static str {
    lookup_source(source_channel).unwrap_or(GENERIC_LABEL)
}

pub fn is_known_source(source_channel: &str) -> bool {
    lookup_source(source_channel).is_some()
}

// ---------------------------------------------------------------------------
// Source-specific patterns
// ---------------------------------------------------------------------------

const AMOUNT: &str = r"(?P<amount>[0-9]+(?:,[0-9]+)*(?:\.[0-9]{1,2})?)";
const CURRENCY: &str = r"(?:\b(?:rs\.?|inr)|₹)\s*";
const ACCOUNT: &str = r"(?:a/c|acct|account)\s*(?:no\.?\s*)?[x*]*(?P<account>[0-9]{3,6})";

/// Fields captured by one pattern, still as text.
#[derive(Debug, Default)]
struct Captured {
    amount: String,
    counterparty: Option<String>,
    account: Option<String>,
}

struct SourcePattern {
    name: &'static str,
    regex: Regex,
    /// Institution the format belongs to. `None` means the label comes from
    /// the source channel (formats shared by several apps).
    institution: Option<&'static str>,
    direction: Direction,
    build: fn(&Captures<'_>) -> Option<Captured>,
}

fn named_groups(caps: &Captures<'_>) -> Option<Captured> {
    Some(Captured {
        amount: caps.name("amount")?.as_str().to_string(),
        counterparty: caps.name("party").map(|m| m.as_str().to_string()),
        account: caps.name("account").map(|m| m.as_str().to_string()),
    })
}

fn pattern(
    name: &'static str,
    parts: &[&str],
    institution: Option<&'static str>,
    direction: Direction,
) -> Result<SourcePattern> {
    let source = format!("(?i){}", parts.concat());
    Ok(SourcePattern {
        name,
        regex: Regex::new(&source)?,
        institution,
        direction,
        build: named_groups,
    })
}

fn source_patterns() -> Result<Vec<SourcePattern>> {
    use Direction::{Expense, Income};

    Ok(vec![
        // "Ravi paid you ₹250"
        pattern(
            "upi_paid_you",
            &[
                r"(?P<party>[a-z][a-z.&'-]*(?:\s+[a-z][a-z.&'-]*){0,3})\s+(?:has\s+)?paid\s+you\s+",
                CURRENCY,
                AMOUNT,
            ],
            None,
            Income,
        )?,
        // "You paid ₹1,200.50 to Swiggy"
        pattern(
            "upi_you_paid",
            &[r"\byou\s+(?:have\s+)?paid\s+", CURRENCY, AMOUNT, r"\s+to\s+(?P<party>[^.;\n]+?)(?:\s+(?:via|using|on|from)\b|[.;\n]|$)"],
            None,
            Expense,
        )?,
        // "Money Sent! Rs 350.00 From HDFC Bank A/C *1234 To RAHUL On 05/01/24"
        pattern(
            "hdfc_money_sent",
            &[
                r"money\s+sent!?\s*",
                CURRENCY,
                AMOUNT,
                r"\s+from\s+hdfc\s+bank\s+",
                ACCOUNT,
                r"\s+to\s+(?P<party>.+?)\s+on\b",
            ],
            Some("HDFC Bank"),
            Expense,
        )?,
        // "Rs.200.00 debited from a/c **1234 on 05-01-24 to VPA shop@ybl (UPI Ref No 4001)"
        pattern(
            "hdfc_upi_debit",
            &[
                CURRENCY,
                AMOUNT,
                r"\s+debited\s+from\s+",
                ACCOUNT,
                r"\s+on\s+\S+\s+to\s+vpa\s+(?P<party>\S+)",
            ],
            Some("HDFC Bank"),
            Expense,
        )?,
        // "Rs. 500.00 credited to HDFC Bank A/c XX1234 on 05-01-24 by VPA ravi@okicici"
        pattern(
            "hdfc_upi_credit",
            &[
                CURRENCY,
                AMOUNT,
                r"\s+(?:is\s+)?credited\s+to\s+(?:hdfc\s+bank\s+)?",
                ACCOUNT,
                r"\s+on\s+\S+\s+by\s+vpa\s+(?P<party>\S+)",
            ],
            Some("HDFC Bank"),
            Income,
        )?,
        // "ICICI Bank Acct XX123 debited for Rs 250.00 on 05-Jan-24; Swiggy credited."
        pattern(
            "icici_debit",
            &[
                r"icici\s+bank\s+",
                ACCOUNT,
                r"\s+debited\s+(?:for|with)\s+",
                CURRENCY,
                AMOUNT,
                r"\s+on\s+[^;\s]+;?\s+(?P<party>.+?)\s+credited\b",
            ],
            Some("ICICI Bank"),
            Expense,
        )?,
        // "ICICI Bank Account XX123 credited with Rs 1,000.00 on 05-Jan-24 from ravi@okaxis."
        pattern(
            "icici_credit",
            &[
                r"icici\s+bank\s+",
                ACCOUNT,
                r"\s+(?:is\s+)?credited\s+with\s+",
                CURRENCY,
                AMOUNT,
                r"\s+on\s+\S+\s+(?:from|by)\s+(?P<party>[^.;\n]+?)(?:[.;\n]|\s+(?:upi|ref)\b|$)",
            ],
            Some("ICICI Bank"),
            Income,
        )?,
        // "Dear UPI user A/C X4321 debited by 20.0 on date 05Jan24 trf to ZOMATO Refno 4005"
        pattern(
            "sbi_upi_debit",
            &[
                ACCOUNT,
                r"\s+debited\s+by\s+(?:rs\.?\s*)?",
                AMOUNT,
                r"\s+on\s+date\s+\S+\s+trf\s+to\s+(?P<party>.+?)\s+ref",
            ],
            Some("State Bank of India"),
            Expense,
        )?,
        // "Dear SBI User, your A/c X4321-credited by Rs.500 on 05Jan24 transfer from RAVI KUMAR Ref No 4001"
        pattern(
            "sbi_upi_credit",
            &[
                ACCOUNT,
                r"[\s-]+credited\s+by\s+(?:rs\.?\s*)?",
                AMOUNT,
                r"\s+on\s+\S+\s+(?:transfer\s+)?(?:from|by)\s+(?P<party>.+?)\s+ref",
            ],
            Some("State Bank of India"),
            Income,
        )?,
        // "Paid Rs.120 to Chai Point from Paytm Balance"
        pattern(
            "paytm_paid",
            &[r"\bpaid\s+", CURRENCY, AMOUNT, r"\s+to\s+(?P<party>.+?)\s+from\s+paytm"],
            Some("Paytm"),
            Expense,
        )?,
        // "Rs 1,499.00 spent on HDFC Bank Card xx4455 at MYNTRA on 2024-01-05"
        pattern(
            "card_spent",
            &[
                CURRENCY,
                AMOUNT,
                r"\s+(?:was\s+)?spent\s+on\s+(?:[a-z]+\s+){0,3}card\s*(?:no\.?\s*)?[x*]*(?P<account>[0-9]{3,6})",
                r"\s+at\s+(?P<party>.+?)(?:\s+on\b|[.;\n]|$)",
            ],
            None,
            Expense,
        )?,
        // "Rs. 499.00 debited from A/c XX1234 on 05-01-24 to AMAZON"
        pattern(
            "account_debit",
            &[
                CURRENCY,
                AMOUNT,
                r"\s+(?:has\s+been\s+|is\s+|was\s+)?debited\s+from\s+(?:your\s+)?",
                ACCOUNT,
            ],
            None,
            Expense,
        )?,
        // "INR 5,000.00 credited to your A/c XX9876 on 03-Jan-24"
        pattern(
            "account_credit",
            &[
                CURRENCY,
                AMOUNT,
                r"\s+(?:has\s+been\s+|is\s+|was\s+)?credited\s+to\s+(?:your\s+)?",
                ACCOUNT,
            ],
            None,
            Income,
        )?,
    ])
}

// ---------------------------------------------------------------------------
// Generic fallback
// ---------------------------------------------------------------------------

const PARTY: &str = r"(?P<party>[a-z0-9][a-z0-9@._&'*/-]*(?:\s+[a-z0-9@._&'*/-]+)*?)";
const PARTY_END: &str = concat!(
    r"(?:\s+(?:on|via|using|for|ref|refno|upi|through|at|with|from|in|is|has|was|avl|info|txn)\b",
    r"|\s*[,;:!(\n]|\s*$)"
);

struct Fallback {
    bare_amount: Regex,
    strong_income: Regex,
    account: Regex,
    expense_parties: Vec<Regex>,
    income_parties: Vec<Regex>,
    upi_handle: Regex,
}

impl Fallback {
    fn new() -> Result<Self> {
        let party = |prefix: &str| Regex::new(&format!("(?i){prefix}{PARTY}{PARTY_END}"));
        Ok(Self {
            bare_amount: Regex::new(&format!(r"(?i)\b(?:debited|credited)\s+(?:by|for|with)\s+{AMOUNT}"))?,
            strong_income: Regex::new(concat!(
                r"(?i)\b(?:paid\s+you|sent\s+you|you\s+(?:have\s+)?received|credited\s+to\s+you",
                r"|(?:received|credited)\s+(?:with\s+)?(?:(?:rs\.?|inr|₹)\s*[0-9][0-9,]*(?:\.[0-9]{1,2})?\s+)?from)\b",
            ))?,
            account: Regex::new(concat!(
                r"(?i)\b(?:a/c|acct|account|card)\b",
                r"(?:\s+(?:no\.?|number|ending(?:\s+(?:in|with))?))?",
                r"\s*[x*.]*\s*(?P<digits>[0-9]{3,6})\b",
            ))?,
            expense_parties: vec![
                party(r"\b(?:paid|sent|transfer(?:red)?)\b.{0,40}?\bto\s+(?:vpa\s+)?")?,
                party(r"\bto\s+(?:vpa\s+)?")?,
                party(r"\bat\s+")?,
            ],
            income_parties: vec![
                Regex::new(
                    r"(?i)(?P<party>[a-z][a-z.&'-]*(?:\s+[a-z][a-z.&'-]*){0,3})\s+(?:has\s+)?(?:paid|sent)\s+you\b",
                )?,
                party(r"\b(?:received|credited)\b.{0,40}?\bfrom\s+(?:vpa\s+)?")?,
                party(r"\bfrom\s+(?:vpa\s+)?")?,
                party(r"\brefund(?:ed)?\b.{0,40}?\bfrom\s+")?,
            ],
            upi_handle: Regex::new(r"\b[A-Za-z0-9][A-Za-z0-9._-]+@[A-Za-z][A-Za-z0-9]+\b")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

pub struct PatternExtractor {
    patterns: Vec<SourcePattern>,
    fallback: Fallback,
}

impl PatternExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            patterns: source_patterns()?,
            fallback: Fallback::new()?,
        })
    }

    /// Names of the source-specific patterns, in evaluation order.
    pub fn pattern_names(&self) -> Vec<&'static str> {
        self.patterns.iter().map(|p| p.name).collect()
    }

    /// Name of the first source-specific pattern that matches `text`.
    pub fn matching_pattern(&self, text: &str) -> Option<&'static str> {
        self.first_match(text).map(|(p, _)| p.name)
    }

    fn first_match(&self, text: &str) -> Option<(&SourcePattern, Captured)> {
        self.patterns.iter().find_map(|p| {
            let caps = p.regex.captures(text)?;
            (p.build)(&caps).map(|captured| (p, captured))
        })
    }

    pub fn extract(
        &self,
        text: &str,
        source_channel: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<ParsedTransaction> {
        let (captured, direction, institution) = match self.first_match(text) {
            Some((pattern, captured)) => {
                trace!(pattern = pattern.name, "source pattern matched");
                (captured, pattern.direction, pattern.institution)
            }
            None => {
                let direction = self.detect_direction(text)?;
                (self.generic_capture(text)?, direction, None)
            }
        };

        let amount = parse_amount(&captured.amount)?;
        let counterparty = captured
            .counterparty
            .as_deref()
            .and_then(sanitize_counterparty)
            .or_else(|| self.find_counterparty(text, direction));
        let account_suffix = captured
            .account
            .or_else(|| self.find_account(text))
            .map(|digits| last_four(&digits));
        let label = institution.unwrap_or_else(|| source_label(source_channel));

        Some(ParsedTransaction {
            amount,
            direction,
            counterparty,
            account_suffix,
            timestamp,
            raw_text: text.to_string(),
            source_label: Some(label.to_string()),
            source_channel: source_channel.to_string(),
        })
    }

    fn generic_capture(&self, text: &str) -> Option<Captured> {
        let amount = CURRENCY_AMOUNT_RE
            .captures(text)
            .or_else(|| self.fallback.bare_amount.captures(text))?
            .name("amount")?
            .as_str()
            .to_string();
        Some(Captured {
            amount,
            ..Captured::default()
        })
    }

    /// Direction from keywords. "X paid you" and "received Rs 500 from X"
    /// can carry a debit word too, so the counterparty-paid-user phrasings
    /// are checked before anything else. When debit and credit words both
    /// appear without such a phrase ("debited from your a/c, credited to
    /// merchant"), the user paid.
    pub fn detect_direction(&self, text: &str) -> Option<Direction> {
        if self.fallback.strong_income.is_match(text) {
            return Some(Direction::Income);
        }
        match (DEBIT_RE.is_match(text), CREDIT_RE.is_match(text)) {
            (true, _) => Some(Direction::Expense),
            (false, true) => Some(Direction::Income),
            (false, false) => None,
        }
    }

    pub fn find_counterparty(&self, text: &str, direction: Direction) -> Option<String> {
        let phrases = match direction {
            Direction::Expense => &self.fallback.expense_parties,
            Direction::Income => &self.fallback.income_parties,
        };
        phrases
            .iter()
            .filter_map(|re| re.captures(text))
            .filter_map(|caps| caps.name("party").and_then(|m| sanitize_counterparty(m.as_str())))
            .next()
            .or_else(|| {
                self.fallback
                    .upi_handle
                    .find(text)
                    .and_then(|m| sanitize_counterparty(m.as_str()))
            })
    }

    fn find_account(&self, text: &str) -> Option<String> {
        self.fallback
            .account
            .captures(text)
            .and_then(|caps| caps.name("digits"))
            .map(|m| m.as_str().to_string())
    }
}

/// Parses "1,23,456.78" style numbers. Only positive amounts are valid.
pub fn parse_amount(raw: &str) -> Option<Decimal> {
    let cleaned = raw.trim().replace(',', "");
    let amount = Decimal::from_str(&cleaned).ok()?;
    (amount > Decimal::ZERO).then_some(amount)
}

// Phrases the party regexes pick up that name the user's own account.
const NOT_A_PARTY: &[&str] = &["a/c", "ac", "acct", "account", "your", "you", "card", "vpa", "upi", "bank"];

/// Trims, collapses whitespace, drops trailing punctuation and caps length.
pub fn sanitize_counterparty(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_end_matches(|c: char| c.is_ascii_punctuation() && c != ')' && c != '&');
    let capped: String = trimmed.chars().take(MAX_COUNTERPARTY_LEN).collect();
    let party = capped.trim_end().to_string();
    if party.is_empty() {
        return None;
    }

    let first_word = party
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_lowercase();
    if NOT_A_PARTY.contains(&first_word.as_str()) || party.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(party)
}

fn last_four(digits: &str) -> String {
    let count = digits.chars().count();
    digits.chars().skip(count.saturating_sub(4)).collect()
}
