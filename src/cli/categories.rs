use comfy_table::{Cell, Table};

use crate::cli::open_store;
use crate::error::Result;
use crate::settings::load_settings;

pub fn list() -> Result<()> {
    let store = open_store(&load_settings())?;

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type"]);
    for cat in store.list_categories()? {
        table.add_row(vec![
            Cell::new(cat.id),
            Cell::new(cat.name),
            Cell::new(cat.category_type),
        ]);
    }
    println!("Categories\n{table}");
    Ok(())
}
