use chrono::{DateTime, Local};

use crate::db::SqliteStore;
use crate::error::Result;
use crate::settings::load_settings;
use crate::store::{CheckpointStore, RuleSource};
use crate::sync::{SyncState, DEFAULT_SOURCE};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());

    if db_path.exists() {
        let store = SqliteStore::open(&db_path)?;
        let state: SyncState = store.load_checkpoint(DEFAULT_SOURCE)?.into();

        println!();
        println!("Transactions:  {}", store.count_transactions()?);
        println!("Rules:         {}", store.keyword_rules()?.len());
        println!("Categories:    {}", store.list_categories()?.len());
        println!("Inbox events:  {}", store.count_raw_events(DEFAULT_SOURCE)?);
        match state {
            SyncState::NeverSynced => println!("Last sync:     never"),
            SyncState::Synced {
                last_sync_timestamp_millis,
            } => {
                let when = DateTime::from_timestamp_millis(last_sync_timestamp_millis)
                    .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| last_sync_timestamp_millis.to_string());
                println!("Last sync:     {when}");
            }
        }
    } else {
        println!();
        println!("Database not found. Run `kharcha init` to set up.");
    }

    Ok(())
}
