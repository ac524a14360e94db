use roster_core::{OperationKind, OperationRequest, OperationResult};

use crate::commands::common::{
    ensure_succeeded, format_reconcile_line, normalize_code, CliDispatcher,
};
use crate::error::CliError;

pub async fn run_reconcile(
    dispatcher: &CliDispatcher,
    code: &str,
    as_json: bool,
) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let outcome = dispatcher
        .dispatch(&OperationRequest::new(OperationKind::Reconcile, code))
        .await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if let OperationResult::Reconcile {
        reservation,
        result,
        acknowledged,
    } = &outcome
    {
        println!("{}", format_reconcile_line(reservation, result));
        if *acknowledged == Some(false) {
            eprintln!("Warning: synced version was not acknowledged to the shadow");
        }
    }

    ensure_succeeded(&outcome)
}
