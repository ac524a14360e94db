use roster_core::{OperationKind, OperationRequest, OperationResult};

use crate::commands::common::{format_local_lines, normalize_code, CliDispatcher};
use crate::error::CliError;

pub async fn run_show(dispatcher: &CliDispatcher, code: &str, as_json: bool) -> Result<(), CliError> {
    let code = normalize_code(code)?;
    let outcome = dispatcher
        .dispatch(&OperationRequest::new(OperationKind::Show, code))
        .await?;
    let OperationResult::Show { reservation, local } = &outcome else {
        return Ok(());
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(local)?);
        return Ok(());
    }

    match local {
        Some(local) => {
            for line in format_local_lines(reservation, local) {
                println!("{line}");
            }
        }
        None => println!("No local copy of {reservation}"),
    }
    Ok(())
}
