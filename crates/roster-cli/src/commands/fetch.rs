use roster_core::{OperationKind, OperationRequest, OperationResult};

use crate::commands::common::{normalize_code, CliDispatcher};
use crate::error::CliError;

pub async fn run_fetch(dispatcher: &CliDispatcher, code: &str) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let outcome = dispatcher
        .dispatch(&OperationRequest::new(OperationKind::Fetch, code))
        .await?;

    if let OperationResult::Fetch { remote, .. } = &outcome {
        println!("{}", serde_json::to_string_pretty(remote)?);
    }
    Ok(())
}
