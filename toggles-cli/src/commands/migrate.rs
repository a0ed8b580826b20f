//! Schema bootstrap command.

use crate::error::CliResult;
use crate::settings::Settings;
use serde_json::{Value, json};
use toggles_seaorm::Database;

/// Create missing tables and indexes.
pub async fn run(settings: &Settings) -> CliResult<Value> {
    let db = Database::connect(settings.database_config()).await?;
    toggles_seaorm::migrate(db.connection()).await?;
    db.close().await?;

    Ok(json!({ "status": "migrated" }))
}
