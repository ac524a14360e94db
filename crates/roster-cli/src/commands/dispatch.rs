use crate::commands::common::{ensure_succeeded, resolve_event, CliDispatcher};
use crate::error::CliError;

pub async fn run_dispatch(dispatcher: &CliDispatcher, event: Option<String>) -> Result<(), CliError> {
    let event = resolve_event(event)?;
    let outcome = dispatcher.dispatch_json(&event).await?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    ensure_succeeded(&outcome)
}
