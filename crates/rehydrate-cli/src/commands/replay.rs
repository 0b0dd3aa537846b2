use anyhow::{Result, anyhow};
use rehydrate_core::{
    AppConfig, DisplayMessage, DroppedMessage, HydrationReport, HydrationState, RawHistoryMessage,
};
use rehydrate_observe::Observer;
use rehydrate_pipeline::{ChunkHydrator, ProjectionOptions};
use serde::Serialize;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;

use crate::ReplayArgs;
use crate::output::print_json;

#[derive(Debug, Serialize)]
pub(crate) struct ChunkSummary {
    pub(crate) file: String,
    pub(crate) accepted: Vec<String>,
    pub(crate) dropped: Vec<DroppedMessage>,
    pub(crate) duplicates: Vec<String>,
    pub(crate) skipped_entries: usize,
    pub(crate) report: HydrationReport,
}

pub(crate) fn run_replay(cwd: &Path, args: ReplayArgs, json_mode: bool, verbose: bool) -> Result<()> {
    let cfg = AppConfig::load(cwd)?;
    let mut observer = Observer::from_config(cwd, &cfg)?;
    if verbose {
        observer.set_verbose(true);
    }
    let hydrator = ChunkHydrator::new().projection(ProjectionOptions::from(&cfg.display));

    let mut messages: Vec<DisplayMessage> = match &args.existing {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)
            .map_err(|err| anyhow!("invalid display messages in {}: {err}", path.display()))?,
        None => Vec::new(),
    };
    let mut state = HydrationState::new();
    let mut chunks = Vec::new();

    for path in &args.batches {
        let (batch, skipped_entries) = read_batch(path, &observer)?;
        observer.verbose_log(&format!(
            "applying {} ({} message(s)) at fallback index {}",
            path.display(),
            batch.len(),
            state.next_fallback_index()
        ));
        let outcome = hydrator.apply(&messages, &batch, &state);
        observer.record_duplicates(&outcome.duplicates);
        let report = outcome.report();
        observer.record_hydration(&report)?;

        chunks.push(ChunkSummary {
            file: path.display().to_string(),
            accepted: outcome.accepted,
            dropped: outcome.dropped,
            duplicates: outcome.duplicates,
            skipped_entries,
            report,
        });
        messages = outcome.messages;
        state = outcome.hydration_state;
    }

    if json_mode {
        print_json(&json!({
            "messages": messages,
            "hydration_state": state,
            "chunks": chunks,
        }))?;
    } else {
        for message in &messages {
            print_message(message);
        }
        let dropped = chunks.iter().map(|c| c.dropped.len()).sum::<usize>();
        println!(
            "{} message(s) from {} batch(es), {} dropped",
            messages.len(),
            chunks.len(),
            dropped
        );
    }
    Ok(())
}

/// Entries that do not match the wire shape at all (unknown role or
/// encoding, missing fields) are skipped with a warning; the rest of the
/// batch still hydrates.
fn read_batch(path: &Path, observer: &Observer) -> Result<(Vec<RawHistoryMessage>, usize)> {
    let raw = fs::read_to_string(path)?;
    let entries: Vec<Value> = serde_json::from_str(&raw)
        .map_err(|err| anyhow!("{} is not a JSON array: {err}", path.display()))?;

    let mut batch = Vec::with_capacity(entries.len());
    let mut skipped = 0;
    for (index, entry) in entries.into_iter().enumerate() {
        match serde_json::from_value::<RawHistoryMessage>(entry) {
            Ok(message) => batch.push(message),
            Err(err) => {
                skipped += 1;
                observer.warn_log(&format!(
                    "skipping unreadable entry {index} in {}: {err}",
                    path.display()
                ));
            }
        }
    }
    Ok((batch, skipped))
}

fn print_message(message: &DisplayMessage) {
    println!("[{}] {} {}", message.role, message.created_at, message.id);
    if !message.content.is_empty() {
        println!("{}", message.content);
    }
    for call in message.tool_calls.iter().flatten() {
        println!(
            "  tool {} ({}) [{}]",
            call.name,
            call.id,
            call.status.as_str()
        );
        if let Some(text) = &call.simplified_text {
            for line in text.lines() {
                println!("    {line}");
            }
        }
    }
    println!();
}
