use tracing::debug;

use crate::error::Result;
use crate::models::{KeywordRule, DEFAULT_CATEGORY};
use crate::store::{RuleSource, TransactionStore};

/// Picks the category of the highest-priority rule whose keyword occurs in
/// `text`. Priority, not keyword length, decides: "amazon" at 10 beats
/// "amazon pay" at 5. Equal priorities go to the rule listed first.
pub fn resolve_category(text: &str, rules: &[KeywordRule]) -> String {
    resolve_category_or(text, rules, DEFAULT_CATEGORY)
}

/// [`resolve_category`] with a caller-chosen fallback.
pub fn resolve_category_or(text: &str, rules: &[KeywordRule], fallback: &str) -> String {
    if text.trim().is_empty() {
        return fallback.to_string();
    }
    let haystack = text.to_lowercase();

    let mut best: Option<&KeywordRule> = None;
    for rule in rules {
        let keyword = rule.keyword.trim().to_lowercase();
        if keyword.is_empty() || !haystack.contains(&keyword) {
            continue;
        }
        if best.map_or(true, |b| rule.priority > b.priority) {
            best = Some(rule);
        }
    }

    best.map(|rule| rule.category_id.clone())
        .unwrap_or_else(|| fallback.to_string())
}

pub struct RecategorizeResult {
    pub examined: usize,
    pub changed: usize,
}

/// Re-applies the current rule set to every stored transaction that
/// mentions `keyword`. Run after a rule for `keyword` is added, edited or
/// deleted. Transactions no rule matches get `fallback`, the same category
/// the pipeline assigns at import. Only changed rows are written.
pub fn recategorize_keyword<S>(store: &S, keyword: &str, fallback: &str) -> Result<RecategorizeResult>
where
    S: TransactionStore + RuleSource,
{
    let rules = store.keyword_rules()?;
    let affected = store.transactions_containing(keyword)?;

    let mut changed = 0usize;
    for txn in &affected {
        let category = resolve_category_or(&txn.categorization_text(), &rules, fallback);
        if category != txn.category_id {
            debug!(id = %txn.id, from = %txn.category_id, to = %category, "recategorized");
            store.update_category(&txn.id, &category)?;
            changed += 1;
        }
    }

    Ok(RecategorizeResult {
        examined: affected.len(),
        changed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_connection, init_db, SqliteStore};
    use crate::models::{Direction, OriginKind, Transaction};
    use chrono::DateTime;
    use rust_decimal::Decimal;

    fn rules() -> Vec<KeywordRule> {
        vec![
            KeywordRule::new("amazon", "shopping", 10),
            KeywordRule::new("amazon pay", "bills", 5),
            KeywordRule::new("swiggy", "food", 0),
            KeywordRule::new("zomato", "food", 0),
        ]
    }

    #[test]
    fn test_priority_beats_specificity() {
        assert_eq!(resolve_category("AMAZON PAY recharge", &rules()), "shopping");
    }

    #[test]
    fn test_higher_priority_specific_rule_wins() {
        let rules = vec![
            KeywordRule::new("amazon", "shopping", 5),
            KeywordRule::new("amazon pay", "bills", 10),
        ];
        assert_eq!(resolve_category("AMAZON PAY recharge", &rules), "bills");
    }

    #[test]
    fn test_tie_goes_to_first_listed() {
        let rules = vec![
            KeywordRule::new("uber", "transport", 1),
            KeywordRule::new("uber eats", "food", 1),
        ];
        assert_eq!(resolve_category("Uber Eats order", &rules), "transport");
    }

    #[test]
    fn test_no_match_and_blank_fall_back() {
        assert_eq!(resolve_category("Random Vendor", &rules()), DEFAULT_CATEGORY);
        assert_eq!(resolve_category("   ", &rules()), DEFAULT_CATEGORY);
        assert_eq!(resolve_category("swiggy", &[]), DEFAULT_CATEGORY);
        assert_eq!(resolve_category_or("Random Vendor", &rules(), "misc"), "misc");
    }

    #[test]
    fn test_blank_keyword_never_matches() {
        let rules = vec![KeywordRule::new("  ", "bills", 100)];
        assert_eq!(resolve_category("anything", &rules), DEFAULT_CATEGORY);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(resolve_category("paid to ZoMaTo", &rules()), "food");
    }

    fn test_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        conn.execute("DELETE FROM keyword_rules", []).unwrap();
        (dir, SqliteStore::new(conn))
    }

    fn txn(id: &str, title: &str, category: &str) -> Transaction {
        Transaction {
            id: id.to_string(),
            amount: Decimal::new(10000, 2),
            title: title.to_string(),
            category_id: category.to_string(),
            timestamp: DateTime::from_timestamp_millis(1_704_441_600_000).unwrap(),
            note: String::new(),
            origin: OriginKind::AutomatedImport,
            raw_text: Some(format!("Rs 100 paid to {title}")),
            counterparty: Some(title.to_string()),
            direction: Direction::Expense,
        }
    }

    #[test]
    fn test_recategorize_updates_only_changed() {
        let (_dir, store) = test_store();
        store.insert_if_absent(&txn("t1", "Swiggy", "other")).unwrap();
        store.insert_if_absent(&txn("t2", "Swiggy Instamart", "food")).unwrap();
        store.insert_if_absent(&txn("t3", "Uber", "other")).unwrap();
        store.add_rule(&KeywordRule::new("swiggy", "food", 0)).unwrap();

        let result = recategorize_keyword(&store, "swiggy", DEFAULT_CATEGORY).unwrap();
        assert_eq!(result.examined, 2);
        assert_eq!(result.changed, 1);
        assert_eq!(store.get_transaction("t1").unwrap().unwrap().category_id, "food");
        assert_eq!(store.get_transaction("t3").unwrap().unwrap().category_id, "other");
    }

    #[test]
    fn test_recategorize_after_rule_delete() {
        let (_dir, store) = test_store();
        let id = store.add_rule(&KeywordRule::new("swiggy", "food", 0)).unwrap();
        store.insert_if_absent(&txn("t1", "Swiggy", "food")).unwrap();
        store.delete_rule(id).unwrap();

        let result = recategorize_keyword(&store, "swiggy", DEFAULT_CATEGORY).unwrap();
        assert_eq!(result.changed, 1);
        assert_eq!(
            store.get_transaction("t1").unwrap().unwrap().category_id,
            DEFAULT_CATEGORY
        );
    }

    #[test]
    fn test_recategorize_uses_configured_fallback() {
        let (_dir, store) = test_store();
        store.insert_if_absent(&txn("t1", "Kamla Stores", "transfers")).unwrap();

        let id = store.add_rule(&KeywordRule::new("kamla", "groceries", 3)).unwrap();
        recategorize_keyword(&store, "kamla", "transfers").unwrap();
        assert_eq!(store.get_transaction("t1").unwrap().unwrap().category_id, "groceries");

        store.delete_rule(id).unwrap();
        let result = recategorize_keyword(&store, "kamla", "transfers").unwrap();
        assert_eq!(result.changed, 1);
        assert_eq!(store.get_transaction("t1").unwrap().unwrap().category_id, "transfers");
    }
}
