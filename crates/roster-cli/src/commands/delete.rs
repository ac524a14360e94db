use roster_core::{OperationKind, OperationRequest, OperationResult};

use crate::commands::common::{normalize_code, CliDispatcher};
use crate::error::CliError;

pub async fn run_delete(dispatcher: &CliDispatcher, code: &str) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let outcome = dispatcher
        .dispatch(&OperationRequest::new(OperationKind::Delete, code))
        .await?;

    if let OperationResult::Delete {
        reservation,
        deleted,
    } = &outcome
    {
        if *deleted {
            println!("Deleted {reservation}");
        } else {
            println!("Nothing stored for {reservation}");
        }
    }
    Ok(())
}
