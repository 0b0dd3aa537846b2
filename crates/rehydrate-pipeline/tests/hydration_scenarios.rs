use proptest::prelude::*;
use rehydrate_core::{
    DisplayContentBlock, DropReason, HydrationState, RawHistoryMessage, Role, SerializedEncoding,
    ToolCallStatus,
};
use rehydrate_pipeline::{HydrationOutcome, PayloadNormalizer, apply, decode};
use rehydrate_testkit::{
    assistant, at, serialized, structured, structured_with_blocks, tool_result, tool_use, user,
};
use serde_json::json;

fn hydrate_fresh(batch: &[RawHistoryMessage]) -> HydrationOutcome {
    apply(&[], batch, &HydrationState::new(), &PayloadNormalizer)
}

fn ids(outcome: &HydrationOutcome) -> Vec<&str> {
    outcome.messages.iter().map(|m| m.id.as_str()).collect()
}

#[test]
fn greeting_pair_hydrates_in_order() {
    let out = hydrate_fresh(&[
        user("u1", "2026-01-15T10:00:00Z", "Hello"),
        assistant("a1", "2026-01-15T10:00:01Z", "Hi!"),
    ]);
    assert_eq!(out.messages.len(), 2);
    assert_eq!(out.messages[0].content, "Hello");
    assert_eq!(out.messages[0].role, Role::User);
    assert_eq!(out.messages[1].content, "Hi!");
    assert_eq!(
        out.messages[0].content_blocks,
        Some(vec![DisplayContentBlock::Text {
            text: "Hello".to_string()
        }])
    );
    assert!(out.messages.iter().all(|m| !m.is_streaming));
}

#[test]
fn shared_timestamp_keeps_input_order() {
    let out = hydrate_fresh(&[
        user("a", &at(5), "first"),
        assistant("b", &at(5), "second"),
        user("c", &at(5), "third"),
    ]);
    assert_eq!(ids(&out), vec!["a", "b", "c"]);
}

#[test]
fn tool_result_folds_into_call_without_literal_escapes() {
    let raw = structured_with_blocks(
        "a1",
        Role::Assistant,
        &at(0),
        "",
        vec![
            tool_use("t1", "bash", json!({"command": "ls"})),
            tool_result("t1", r"ok\n"),
        ],
    );
    let out = hydrate_fresh(&[raw]);
    let calls = out.messages[0].tool_calls.as_ref().expect("tool calls");
    assert_eq!(calls[0].id, "t1");
    assert_eq!(calls[0].result.as_deref(), Some("ok\n"));
    assert_eq!(calls[0].status, ToolCallStatus::Complete);
}

#[test]
fn redelivered_message_never_overwrites_existing() {
    let first = hydrate_fresh(&[user("x", &at(0), "original")]);
    let out = apply(
        &first.messages,
        &[user("x", &at(0), "changed"), assistant("y", &at(1), "new")],
        &first.hydration_state,
        &PayloadNormalizer,
    );
    assert_eq!(ids(&out), vec!["x", "y"]);
    assert_eq!(out.messages[0].content, "original");
    assert_eq!(out.duplicates, vec!["user:x"]);
}

#[test]
fn reapplying_a_batch_is_a_no_op() {
    let batch = vec![
        user("u1", &at(0), "Hello"),
        assistant("a1", &at(1), "Hi!"),
        user("bad", "not-a-time", "dropped"),
    ];
    let first = hydrate_fresh(&batch);
    let second = apply(
        &first.messages,
        &batch,
        &first.hydration_state,
        &PayloadNormalizer,
    );
    assert!(second.accepted.is_empty());
    assert_eq!(second.messages, first.messages);
    assert_eq!(second.duplicates.len(), 2);
}

#[test]
fn escape_decoder_examples() {
    assert_eq!(decode(r"a\nb\tc\\d"), "a\nb\tc\\d");
    assert_eq!(decode(r"\x41"), r"\x41");
}

#[test]
fn double_encoded_json_payload_recovers_text() {
    let once = json!({"text": "X"}).to_string();
    let twice = serde_json::to_string(&once).expect("encode");
    let out = hydrate_fresh(&[serialized(
        "a1",
        Role::Assistant,
        &at(0),
        &twice,
        SerializedEncoding::Json,
    )]);
    assert_eq!(out.messages[0].content, "X");
}

#[test]
fn malformed_json_drops_only_that_message() {
    let out = hydrate_fresh(&[
        user("u1", &at(0), "kept"),
        serialized("a1", Role::Assistant, &at(1), "{broken", SerializedEncoding::Json),
        assistant("a2", &at(2), "also kept"),
    ]);
    assert_eq!(ids(&out), vec!["u1", "a2"]);
    assert_eq!(out.dropped.len(), 1);
    assert_eq!(out.dropped[0].id, "a1");
    assert_eq!(out.dropped[0].reason, DropReason::DecodeFailed);
    assert_eq!(out.dropped[0].reason.to_string(), "decode-failed");
}

#[test]
fn two_chunks_equal_one_concatenated_chunk() {
    let chunk_one = vec![
        user("u1", &at(0), "q1"),
        assistant("a1", &at(1), "r1"),
        user("bad", "??", "x"),
    ];
    let chunk_two = vec![
        user("u2", &at(2), "q2"),
        assistant("a1", &at(1), "r1"),
        assistant("a2", &at(3), "r2"),
    ];

    let s1 = hydrate_fresh(&chunk_one);
    let s2 = apply(
        &s1.messages,
        &chunk_two,
        &s1.hydration_state,
        &PayloadNormalizer,
    );

    let combined = chunk_one
        .iter()
        .chain(chunk_two.iter())
        .cloned()
        .collect::<Vec<_>>();
    let once = hydrate_fresh(&combined);

    assert_eq!(s2.messages, once.messages);
    assert_eq!(s2.hydration_state, once.hydration_state);
}

#[test]
fn earlier_second_chunk_matches_concatenated_order() {
    let chunk_one = vec![user("u2", &at(10), "later")];
    let chunk_two = vec![user("u1", &at(0), "earlier")];

    let s1 = hydrate_fresh(&chunk_one);
    let s2 = apply(
        &s1.messages,
        &chunk_two,
        &s1.hydration_state,
        &PayloadNormalizer,
    );
    let combined = chunk_one
        .iter()
        .chain(chunk_two.iter())
        .cloned()
        .collect::<Vec<_>>();
    let once = hydrate_fresh(&combined);

    assert_eq!(ids(&s2), vec!["u1", "u2"]);
    assert_eq!(s2.messages, once.messages);
}

#[test]
fn system_messages_and_json_blocks_flow_through() {
    let value = json!({
        "text": "",
        "blocks": [
            {"type": "tool-use", "id": "t1", "name": "bash", "args": {"command": "cargo test"}},
            {"type": "tool-result", "id": "t1", "result": {"stdout": "test result: FAILED"}, "error": "true"}
        ]
    })
    .to_string();
    let out = hydrate_fresh(&[
        structured("s1", Role::System, &at(0), "session restored"),
        serialized("a1", Role::Assistant, &at(1), &value, SerializedEncoding::Json),
    ]);
    assert_eq!(out.messages[0].role, Role::System);
    let call = &out.messages[1].tool_calls.as_ref().expect("tool calls")[0];
    assert_eq!(call.status, ToolCallStatus::Error);
    assert_eq!(
        call.simplified_text.as_deref(),
        Some("$ cargo test\ntest result: FAILED")
    );
}

fn batch_strategy() -> impl Strategy<Value = Vec<RawHistoryMessage>> {
    prop::collection::vec(("[a-e]", 0i64..4, any::<bool>(), any::<bool>()), 0..16).prop_map(
        |entries| {
            entries
                .into_iter()
                .map(|(id, second, is_user, valid)| {
                    let created_at = if valid { at(second) } else { "bogus".to_string() };
                    if is_user {
                        user(&id, &created_at, &id)
                    } else {
                        assistant(&id, &created_at, &id)
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn reapplying_yields_no_new_messages(batch in batch_strategy()) {
        let first = hydrate_fresh(&batch);
        let second = apply(&first.messages, &batch, &first.hydration_state, &PayloadNormalizer);
        prop_assert!(second.accepted.is_empty());
        prop_assert_eq!(second.messages, first.messages);
    }

    #[test]
    fn equal_timestamps_sort_by_arrival(count in 1usize..12, second in 0i64..100) {
        let batch = (0..count)
            .map(|i| user(&format!("m{i}"), &at(second), "same time"))
            .collect::<Vec<_>>();
        let out = hydrate_fresh(&batch);
        let expected = (0..count).map(|i| format!("m{i}")).collect::<Vec<_>>();
        prop_assert_eq!(out.accepted, expected);
    }

    #[test]
    fn split_batches_match_one_concatenated_batch(
        first in batch_strategy(),
        second in batch_strategy(),
    ) {
        let s1 = hydrate_fresh(&first);
        let s2 = apply(&s1.messages, &second, &s1.hydration_state, &PayloadNormalizer);
        let combined = first.iter().chain(second.iter()).cloned().collect::<Vec<_>>();
        let once = hydrate_fresh(&combined);
        prop_assert_eq!(s2.messages, once.messages);
        prop_assert_eq!(s2.hydration_state, once.hydration_state);
    }

    #[test]
    fn output_is_chronological(batch in batch_strategy()) {
        let out = hydrate_fresh(&batch);
        let times = out
            .messages
            .iter()
            .map(|m| m.created_at.clone())
            .collect::<Vec<_>>();
        let mut sorted = times.clone();
        sorted.sort();
        prop_assert_eq!(times, sorted);
    }
}
