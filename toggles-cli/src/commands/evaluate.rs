//! Feature evaluation command.

use super::{App, to_json};
use crate::error::CliResult;
use serde::Serialize;
use serde_json::Value;
use toggles_core::CustomerFeature;

#[derive(Serialize)]
struct EvaluationResponse {
    features: Vec<CustomerFeature>,
}

/// Evaluate `names` for `customer_id`.
pub async fn run(app: &App, customer_id: &str, names: &[String]) -> CliResult<Value> {
    let features = app.evaluation.evaluate(customer_id, names).await?;
    to_json(&EvaluationResponse { features })
}
