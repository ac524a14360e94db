use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use roster_core::dispatch::Dispatcher;
use roster_core::models::LocalState;
use roster_core::remote::{HttpShadowClient, ShadowReader};
use roster_core::{
    LibSqlReservationStore, OperationResult, ReconciliationEngine, ReconciliationResult,
    ReservationId, RosterConfig,
};

use crate::error::CliError;

/// Dispatcher wired to the configured shadow source and the local database.
/// The source doubles as the remote deleter for `purge`.
pub type CliDispatcher =
    Dispatcher<ShadowReader, LibSqlReservationStore, HttpShadowClient, ShadowReader>;

pub fn resolve_db_path(
    cli_db_path: Option<PathBuf>,
    config: &RosterConfig,
) -> Result<PathBuf, CliError> {
    cli_db_path
        .or_else(|| config.db_path.clone())
        .or_else(default_db_path)
        .ok_or(CliError::NoDataDir)
}

pub fn default_db_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("roster").join("roster.db"))
}

pub async fn open_dispatcher(
    config: &RosterConfig,
    db_path: &Path,
) -> Result<CliDispatcher, CliError> {
    let reader = ShadowReader::from_source(&config.source)?;
    let reporter = if config.report_synced_version {
        reader.http().cloned()
    } else {
        None
    };

    let store = LibSqlReservationStore::open(db_path).await?;
    tracing::debug!("Opened roster database at {}", db_path.display());

    let deleter = reader.clone();
    let engine = ReconciliationEngine::new(reader, store).with_strategy(config.diff_strategy);
    let dispatcher = Dispatcher::new(engine, config.listing_id.as_str()).with_deleter(deleter);
    Ok(match reporter {
        Some(reporter) => dispatcher.with_reporter(reporter),
        None => dispatcher,
    })
}

pub fn normalize_code(code: &str) -> Result<String, CliError> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyCode)
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

/// Event text from `--event`, falling back to piped stdin
pub fn resolve_event(event: Option<String>) -> Result<String, CliError> {
    let event = match event {
        Some(event) => normalize_content(&event),
        None => read_piped_stdin()?,
    };
    event.ok_or(CliError::EmptyEvent)
}

/// Turn a failed reconcile into a non-zero exit
pub fn ensure_succeeded(result: &OperationResult) -> Result<(), CliError> {
    match result {
        OperationResult::Reconcile {
            result: ReconciliationResult::Failed { reason, .. },
            ..
        } => Err(CliError::ReconcileFailed(reason.clone())),
        _ => Ok(()),
    }
}

pub fn format_reconcile_line(reservation: &ReservationId, result: &ReconciliationResult) -> String {
    match result {
        ReconciliationResult::NoOpAlreadyCurrent { version } => {
            format!("{reservation}  already at version {version}")
        }
        ReconciliationResult::Synced {
            new_version,
            changed_member_count,
            deleted_member_count,
        } => format!(
            "{reservation}  synced to version {new_version} ({changed_member_count} written, {deleted_member_count} deleted)"
        ),
        ReconciliationResult::Failed {
            reason,
            kind,
            retryable,
        } => {
            let retry = if *retryable { "retryable" } else { "not retryable" };
            format!("{reservation}  failed [{kind:?}, {retry}]: {reason}")
        }
    }
}

pub fn format_local_lines(reservation: &ReservationId, local: &LocalState) -> Vec<String> {
    let mut lines = vec![format!(
        "{reservation}  version {}  synced {}  {} members",
        local.version,
        format_sync_timestamp(local.synced_at),
        local.members.len()
    )];

    lines.extend(local.members.iter().map(|member| {
        let marker = if member.record.last_update_on.is_null() {
            "-".to_string()
        } else {
            member.record.last_update_on.to_string()
        };
        let payload = serde_json::Value::Object(member.record.payload.clone());
        format!(
            "  {:>3}  {:<16}  {:<24}  {payload}",
            member.position,
            member.identity.to_string(),
            marker
        )
    }));

    lines
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
