use roster_core::{OperationKind, OperationRequest, OperationResult};

use crate::commands::common::{normalize_code, CliDispatcher};
use crate::error::CliError;

pub async fn run_purge(dispatcher: &CliDispatcher, code: &str) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let outcome = dispatcher
        .dispatch(&OperationRequest::new(OperationKind::Purge, code))
        .await?;

    if let OperationResult::Purge {
        reservation,
        remote_deleted,
        local_deleted,
    } = &outcome
    {
        let remote = if *remote_deleted { "deleted" } else { "absent" };
        let local = if *local_deleted { "deleted" } else { "absent" };
        println!("Purged {reservation} (shadow {remote}, local copy {local})");
    }
    Ok(())
}
