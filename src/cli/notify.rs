use chrono::Utc;

use crate::cli::{build_pipeline, describe_outcome, open_store};
use crate::error::Result;
use crate::models::RawTextEvent;
use crate::settings::load_settings;

pub fn run(source: &str, key: &str, title: &str, timestamp: Option<i64>, text: &str) -> Result<()> {
    let settings = load_settings();
    let store = open_store(&settings)?;
    let pipeline = build_pipeline(&settings)?;

    let event = RawTextEvent {
        title: title.to_string(),
        text: text.to_string(),
        timestamp_millis: timestamp.unwrap_or_else(|| Utc::now().timestamp_millis()),
        source_channel: source.to_string(),
        event_key: key.to_string(),
    };
    let outcome = pipeline.process(&event, &store)?;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}
