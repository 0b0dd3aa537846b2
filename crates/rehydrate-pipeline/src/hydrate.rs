//! Chunk hydrator: folds one batch of raw history into the display list.
//!
//! The cursor (`HydrationState`) is cloned on entry and the updated copy is
//! returned, so re-applying a batch against the returned cursor is a no-op.

use crate::normalize::{
    NormalizeContext, NormalizeOutcome, Normalizer, PayloadNormalizer, parse_created_at,
};
use crate::project::{ProjectionOptions, project_with};
use rehydrate_core::{
    DisplayMessage, DroppedMessage, HydratedMessage, HydrationReport, HydrationState,
    MessageOrdering, RawHistoryMessage,
};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct HydrationOutcome {
    pub messages: Vec<DisplayMessage>,
    pub hydration_state: HydrationState,
    /// Ids of newly accepted messages, in display order.
    pub accepted: Vec<String>,
    pub dropped: Vec<DroppedMessage>,
    /// Dedupe keys of redelivered messages.
    pub duplicates: Vec<String>,
}

impl HydrationOutcome {
    pub fn report(&self) -> HydrationReport {
        HydrationReport {
            accepted: self.accepted.len(),
            duplicates: self.duplicates.len(),
            dropped: self.dropped.clone(),
            total_messages: self.messages.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChunkHydrator<N = PayloadNormalizer> {
    normalizer: N,
    projection: ProjectionOptions,
}

impl ChunkHydrator<PayloadNormalizer> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<N: Normalizer> ChunkHydrator<N> {
    pub fn with_normalizer(normalizer: N) -> Self {
        Self {
            normalizer,
            projection: ProjectionOptions::default(),
        }
    }

    pub fn projection(mut self, projection: ProjectionOptions) -> Self {
        self.projection = projection;
        self
    }

    pub fn apply(
        &self,
        existing: &[DisplayMessage],
        incoming: &[RawHistoryMessage],
        state: &HydrationState,
    ) -> HydrationOutcome {
        hydrate(existing, incoming, state, &self.normalizer, &self.projection)
    }
}

/// Apply one chunk with default projection options.
pub fn apply(
    existing: &[DisplayMessage],
    incoming: &[RawHistoryMessage],
    state: &HydrationState,
    normalizer: &dyn Normalizer,
) -> HydrationOutcome {
    hydrate(
        existing,
        incoming,
        state,
        normalizer,
        &ProjectionOptions::default(),
    )
}

fn hydrate<N: Normalizer + ?Sized>(
    existing: &[DisplayMessage],
    incoming: &[RawHistoryMessage],
    state: &HydrationState,
    normalizer: &N,
    projection: &ProjectionOptions,
) -> HydrationOutcome {
    let mut next_state = state.clone();
    let mut hydrated: Vec<HydratedMessage> = Vec::new();
    let mut dropped = Vec::new();
    let mut duplicates = Vec::new();

    for raw in incoming {
        let ctx = NormalizeContext {
            fallback_index: next_state.next_fallback_index(),
            seen_message_ids: next_state.seen_message_ids(),
        };
        match normalizer.normalize(raw, ctx) {
            NormalizeOutcome::Accepted(message) => {
                next_state.mark_seen(message.id.clone());
                next_state.advance();
                hydrated.push(message);
            }
            NormalizeOutcome::Dropped { id, reason } => {
                next_state.advance();
                dropped.push(DroppedMessage { id, reason });
            }
            NormalizeOutcome::Duplicate { dedupe_key } => duplicates.push(dedupe_key),
        }
    }

    // Stable sort; the fallback index already breaks timestamp ties.
    hydrated.sort_by_key(|message| message.ordering);

    let accepted = hydrated.iter().map(|m| m.id.clone()).collect::<Vec<_>>();
    let projected = hydrated
        .iter()
        .map(|message| (message.ordering, project_with(message, projection)))
        .collect::<Vec<_>>();

    HydrationOutcome {
        messages: merge(existing, projected),
        hydration_state: next_state,
        accepted,
        dropped,
        duplicates,
    }
}

/// First write wins: an id already on screen is never replaced or moved.
///
/// Each new message lands after the last existing message whose timestamp
/// is not later than its own, so an older batch slots in ahead of newer
/// history. Existing messages with an unreadable `created_at` never push a
/// new message ahead of them.
fn merge(
    existing: &[DisplayMessage],
    hydrated: Vec<(MessageOrdering, DisplayMessage)>,
) -> Vec<DisplayMessage> {
    if existing.is_empty() {
        return hydrated.into_iter().map(|(_, message)| message).collect();
    }
    let mut present = existing
        .iter()
        .map(|m| m.id.clone())
        .collect::<HashSet<_>>();
    let mut merged = existing
        .iter()
        .map(|m| (parse_created_at(&m.created_at), m.clone()))
        .collect::<Vec<_>>();
    for (ordering, message) in hydrated {
        if !present.insert(message.id.clone()) {
            continue;
        }
        let at = merged
            .iter()
            .rposition(|(timestamp_ms, _)| {
                timestamp_ms.is_none_or(|ts| ts <= ordering.timestamp_ms)
            })
            .map_or(0, |index| index + 1);
        merged.insert(at, (Some(ordering.timestamp_ms), message));
    }
    merged.into_iter().map(|(_, message)| message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rehydrate_core::{DropReason, Role};
    use rehydrate_testkit::{assistant, at, user};
    use std::cell::RefCell;

    #[test]
    fn accepted_and_dropped_consume_fallback_slots() {
        let batch = vec![
            user("u1", &at(0), "one"),
            user("bad", "garbage", "two"),
            user("u1", &at(1), "again"),
            assistant("a1", &at(2), "three"),
        ];
        let out = apply(&[], &batch, &HydrationState::new(), &PayloadNormalizer);
        assert_eq!(out.accepted, vec!["u1", "a1"]);
        assert_eq!(
            out.dropped,
            vec![DroppedMessage {
                id: "bad".to_string(),
                reason: DropReason::InvalidCreatedAt,
            }]
        );
        assert_eq!(out.duplicates, vec!["user:u1"]);
        assert_eq!(out.hydration_state.next_fallback_index(), 3);
        assert!(out.hydration_state.has_seen("a1"));
        assert!(!out.hydration_state.has_seen("bad"));
    }

    #[test]
    fn callers_cursor_is_not_mutated() {
        let state = HydrationState::new();
        let out = apply(
            &[],
            &[user("u1", &at(0), "hi")],
            &state,
            &PayloadNormalizer,
        );
        assert_eq!(state, HydrationState::new());
        assert_ne!(out.hydration_state, state);
    }

    #[test]
    fn out_of_order_batch_is_sorted_by_timestamp() {
        let batch = vec![
            assistant("late", &at(30), "late"),
            user("early", &at(10), "early"),
        ];
        let out = apply(&[], &batch, &HydrationState::new(), &PayloadNormalizer);
        let ids = out.messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["early", "late"]);
        assert_eq!(out.accepted, vec!["early", "late"]);
    }

    #[test]
    fn merge_appends_only_unseen_ids() {
        let first = apply(
            &[],
            &[user("x", &at(0), "live copy")],
            &HydrationState::new(),
            &PayloadNormalizer,
        );
        // Fresh cursor: "x" normalizes again but must not replace the live message.
        let second = apply(
            &first.messages,
            &[user("x", &at(0), "hydrated copy"), user("y", &at(1), "new")],
            &HydrationState::new(),
            &PayloadNormalizer,
        );
        assert_eq!(second.messages.len(), 2);
        assert_eq!(second.messages[0].content, "live copy");
        assert_eq!(second.messages[1].id, "y");
    }

    #[test]
    fn older_batch_is_placed_before_newer_history() {
        let first = apply(
            &[],
            &[user("u2", &at(10), "later"), assistant("a2", &at(20), "latest")],
            &HydrationState::new(),
            &PayloadNormalizer,
        );
        let second = apply(
            &first.messages,
            &[user("u1", &at(0), "earliest"), assistant("a1", &at(10), "same second")],
            &first.hydration_state,
            &PayloadNormalizer,
        );
        let ids = second.messages.iter().map(|m| m.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["u1", "u2", "a1", "a2"]);
    }

    #[test]
    fn report_counts_outcomes() {
        let batch = vec![
            user("u1", &at(0), "hi"),
            user("u1", &at(0), "hi"),
            user("u2", "", "no time"),
        ];
        let report = apply(&[], &batch, &HydrationState::new(), &PayloadNormalizer).report();
        assert_eq!(report.accepted, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.total_messages, 1);
        assert!(!report.is_clean());
    }

    /// Records the context each call received and accepts nothing.
    struct RecordingNormalizer {
        seen: RefCell<Vec<(String, u64, usize)>>,
    }

    impl Normalizer for RecordingNormalizer {
        fn normalize(
            &self,
            raw: &RawHistoryMessage,
            ctx: NormalizeContext<'_>,
        ) -> NormalizeOutcome {
            self.seen.borrow_mut().push((
                raw.id.clone(),
                ctx.fallback_index,
                ctx.seen_message_ids.len(),
            ));
            NormalizeOutcome::Dropped {
                id: raw.id.clone(),
                reason: DropReason::DecodeFailed,
            }
        }
    }

    #[test]
    fn normalizer_seam_receives_threaded_context() {
        let mut start = HydrationState::new();
        start.mark_seen("old");
        start.advance();
        start.advance();

        let hydrator = ChunkHydrator::with_normalizer(RecordingNormalizer {
            seen: RefCell::new(Vec::new()),
        });
        let out = hydrator.apply(
            &[],
            &[user("m1", &at(0), "a"), user("m2", &at(1), "b")],
            &start,
        );
        assert!(out.messages.is_empty());
        assert_eq!(out.hydration_state.next_fallback_index(), 4);
        assert_eq!(
            hydrator.normalizer.seen.borrow().as_slice(),
            &[("m1".to_string(), 2, 1), ("m2".to_string(), 3, 1)]
        );
    }

    #[test]
    fn projection_options_reach_simplified_text() {
        let raw = rehydrate_testkit::structured_with_blocks(
            "a1",
            Role::Assistant,
            &at(0),
            "",
            vec![
                rehydrate_testkit::tool_use("t1", "read", serde_json::json!({})),
                rehydrate_testkit::tool_result("t1", "abcdef"),
            ],
        );
        let out = ChunkHydrator::new()
            .projection(ProjectionOptions { wrap_column: 2 })
            .apply(&[], &[raw], &HydrationState::new());
        let calls = out.messages[0].tool_calls.as_ref().expect("tool calls");
        assert_eq!(calls[0].simplified_text.as_deref(), Some("ab\ncd\nef"));
    }
}
