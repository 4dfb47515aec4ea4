//! Operator commands.
//!
//! Each command runs against a loaded engine and writes a human-readable
//! report to the given writer.

use clap::Subcommand;
use orderdesk_core::{OrderError, SyncEngine, SyncOutcome};
use orderdesk_storage::OrderStoreError;
use orderdesk_types::{
	format_amount, format_timestamp, truncate_id, FieldErrors, NetworkStatus, Order, OrderDraft,
	ValidationError,
};
use std::io::Write;
use thiserror::Error;

/// Commands understood by the `orderdesk` binary.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
	/// List every order with its sync status
	List,
	/// Create a new pending order
	Create {
		#[arg(long)]
		title: String,
		#[arg(long)]
		amount: String,
	},
	/// Edit a pending or failed order
	Update {
		/// Order id or a unique prefix of it
		id: String,
		#[arg(long)]
		title: String,
		#[arg(long)]
		amount: String,
	},
	/// Sync every pending order now
	Sync,
	/// Retry a failed order
	Retry {
		/// Order id or a unique prefix of it
		id: String,
	},
	/// Delete every stored order
	Clear,
}

/// Errors reported to the operator.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error("{0}")]
	Input(#[from] FieldErrors),
	#[error("{0}")]
	Validation(#[from] ValidationError),
	#[error("{0}")]
	Order(#[from] OrderError),
	#[error("{0}")]
	Storage(#[from] OrderStoreError),
	#[error("Order id '{0}' is ambiguous")]
	AmbiguousId(String),
	#[error("Order {0} is not failed and cannot be retried")]
	NotRetryable(String),
	#[error("Output error: {0}")]
	Output(#[from] std::io::Error),
}

/// Runs one command against a loaded engine.
pub async fn execute(
	engine: &SyncEngine,
	command: Command,
	network: NetworkStatus,
	out: &mut impl Write,
) -> Result<(), CommandError> {
	let online = network.is_online();
	match command {
		Command::List => {
			let state = engine.state().snapshot();
			if state.items.is_empty() {
				writeln!(out, "No orders")?;
			}
			for order in &state.items {
				write_order(out, order)?;
			}
			let unpersisted = engine.unpersisted_ids().await;
			if !unpersisted.is_empty() {
				writeln!(out, "{} order(s) not yet saved", unpersisted.len())?;
			}
		},
		Command::Create { title, amount } => {
			let draft = parse_input(&title, &amount)?;
			let order = engine.create(&draft.title, draft.amount.value()).await?;
			writeln!(out, "Created {}", truncate_id(&order.id))?;
			if let Some(outcome) = engine.on_connectivity_change(Some(online)).await {
				write_outcome(out, &outcome)?;
			}
		},
		Command::Update { id, title, amount } => {
			let draft = parse_input(&title, &amount)?;
			let id = resolve_id(engine, &id)?;
			let order = engine
				.update(&id, &draft.title, draft.amount.value())
				.await?;
			writeln!(out, "Updated {}", truncate_id(&order.id))?;
			if let Some(outcome) = engine.on_connectivity_change(Some(online)).await {
				write_outcome(out, &outcome)?;
			}
		},
		Command::Sync => {
			if !online {
				let pending = engine.state().snapshot().pending_count();
				writeln!(out, "Offline, {} order(s) waiting to sync", pending)?;
				return Ok(());
			}
			let outcome = engine.sync_pending().await;
			write_outcome(out, &outcome)?;
		},
		Command::Retry { id } => {
			let id = resolve_id(engine, &id)?;
			match engine.retry_sync(&id).await {
				Some(outcome) => write_outcome(out, &outcome)?,
				None => return Err(CommandError::NotRetryable(truncate_id(&id))),
			}
		},
		Command::Clear => {
			engine.clear_all().await?;
			writeln!(out, "Cleared all orders")?;
		},
	}
	Ok(())
}

/// Validates form input, including the title length limit.
fn parse_input(title: &str, amount: &str) -> Result<OrderDraft, CommandError> {
	let draft = OrderDraft::parse(title, amount)?;
	OrderDraft::check_title_length(&draft.title)?;
	Ok(draft)
}

/// Resolves a full id or a unique prefix (as printed by `list`) to a full id.
fn resolve_id(engine: &SyncEngine, input: &str) -> Result<String, CommandError> {
	let prefix = input.trim_end_matches("..");
	if prefix.is_empty() {
		return Err(OrderError::NotFound.into());
	}
	let state = engine.state().snapshot();
	if state.find(prefix).is_some() {
		return Ok(prefix.to_string());
	}

	let mut matches = state.items.iter().filter(|o| o.id.starts_with(prefix));
	match (matches.next(), matches.next()) {
		(Some(order), None) => Ok(order.id.clone()),
		(Some(_), Some(_)) => Err(CommandError::AmbiguousId(input.to_string())),
		_ => Err(OrderError::NotFound.into()),
	}
}

fn write_order(out: &mut impl Write, order: &Order) -> std::io::Result<()> {
	let updated = order
		.updated_at
		.as_ref()
		.map(format_timestamp)
		.unwrap_or_else(|| "-".to_string());
	writeln!(
		out,
		"{:<10} {:<8} {:>12}  {:<30}  created {}  updated {}",
		truncate_id(&order.id),
		order.sync_status.to_string(),
		format_amount(&order.amount),
		order.title,
		format_timestamp(&order.created_at),
		updated
	)
}

fn write_outcome(out: &mut impl Write, outcome: &SyncOutcome) -> std::io::Result<()> {
	match outcome {
		SyncOutcome::AlreadySyncing => writeln!(out, "A sync is already in progress"),
		SyncOutcome::NothingPending => writeln!(out, "Nothing to sync"),
		SyncOutcome::Completed(report) => {
			writeln!(
				out,
				"Synced {}, failed {}",
				report.synced.len(),
				report.failed.len()
			)?;
			for id in &report.failed {
				writeln!(out, "  failed: {}", truncate_id(id))?;
			}
			Ok(())
		},
	}
}
