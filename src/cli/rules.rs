use comfy_table::{Cell, Table};

use crate::categorizer::recategorize_keyword;
use crate::cli::open_store;
use crate::error::{KharchaError, Result};
use crate::models::KeywordRule;
use crate::settings::load_settings;
use crate::store::RuleSource;

pub fn add(keyword: &str, category: &str, priority: i64) -> Result<()> {
    if keyword.trim().is_empty() {
        return Err(KharchaError::Other("Keyword is required".into()));
    }
    let settings = load_settings();
    let store = open_store(&settings)?;
    let id = store.add_rule(&KeywordRule::new(keyword.trim(), category, priority))?;
    let result = recategorize_keyword(&store, keyword, &settings.default_category)?;
    println!(
        "Added rule {id}: '{}' \u{2192} {category} ({} of {} matching transactions recategorized)",
        keyword.trim(),
        result.changed,
        result.examined
    );
    Ok(())
}

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;
    let mut rules = store.keyword_rules()?;
    rules.sort_by(|a, b| b.priority.cmp(&a.priority));

    let mut table = Table::new();
    table.set_header(vec!["ID", "Keyword", "Category", "Priority"]);
    for rule in rules {
        table.add_row(vec![
            Cell::new(rule.id.unwrap_or_default()),
            Cell::new(rule.keyword),
            Cell::new(rule.category_id),
            Cell::new(rule.priority),
        ]);
    }
    println!("Rules\n{table}");
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let rule = store.delete_rule(id)?;
    let result = recategorize_keyword(&store, &rule.keyword, &settings.default_category)?;
    println!(
        "Deleted rule {id}: '{}' \u{2192} {} ({} transactions recategorized)",
        rule.keyword, rule.category_id, result.changed
    );
    Ok(())
}
