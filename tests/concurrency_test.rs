//! Two events racing for the same user: the first write wins, the loser is told
//!
//! Run with: cargo test --test concurrency_test

mod common;

use anonbot::relay::texts;
use anonbot::relay::{CallbackToken, Composing, ConversationState, Handle, MessagePointer, UserStore, UserUpdate};
use anonbot::testing::CallKind;
use common::{force_state, press, text, Harness, ALICE, BOB};
use pretty_assertions::assert_eq;

fn composing_to(contact: &anonbot::relay::StableId) -> ConversationState {
    ConversationState::ComposingOutbound(Composing {
        contact: contact.clone(),
        reply_to: None,
        pending_delivery: None,
    })
}

#[tokio::test]
async fn test_start_losing_the_race_keeps_winner_state() {
    let h = Harness::racing();
    h.user_with_handle(BOB, "bob");
    h.user_without_handle(ALICE);
    h.before_next_write(|store| force_state(store, ALICE, ConversationState::RegisteringHandle));

    h.relay.start(&text(ALICE, 1, "/start _bob"), Some("_bob")).await.unwrap();

    assert_eq!(h.transport().sent_texts(ALICE), vec![texts::CONCURRENT_UPDATE.to_string()]);
    assert_eq!(h.user(ALICE).state, ConversationState::RegisteringHandle);
}

#[tokio::test]
async fn test_reply_press_losing_the_race_keeps_winner_state() {
    let h = Harness::racing();
    let alice = h.user_without_handle(ALICE);
    h.user_without_handle(BOB);
    let token = CallbackToken::Reply(MessagePointer {
        stable_id: alice.stable_id.clone(),
        message_id: 10,
        delivery_message_id: 11,
    })
    .encode();
    h.before_next_write(|store| force_state(store, BOB, ConversationState::RegisteringHandle));

    h.relay.press(&press(BOB, &token, Some((30, None)))).await.unwrap();

    assert_eq!(h.transport().last_answer(), Some(Some(texts::CONCURRENT_UPDATE.to_string())));
    assert!(h.transport().sent_texts(BOB).is_empty());
    assert_eq!(h.user(BOB).state, ConversationState::RegisteringHandle);
}

#[tokio::test]
async fn test_set_press_losing_the_race_keeps_winner_state() {
    let h = Harness::racing();
    let bob = h.user_with_handle(BOB, "bob");
    h.user_without_handle(ALICE);
    let winner = composing_to(&bob.stable_id);
    let written = winner.clone();
    h.before_next_write(move |store| force_state(store, ALICE, written));

    h.relay.press(&press(ALICE, "u", Some((50, None)))).await.unwrap();

    assert_eq!(h.transport().last_answer(), Some(Some(texts::CONCURRENT_UPDATE.to_string())));
    assert!(h.transport().sent_texts(ALICE).is_empty());
    assert!(h.transport().calls_of(CallKind::ClearButtons).is_empty());
    assert_eq!(h.user(ALICE).state, winner);
}

#[tokio::test]
async fn test_remove_press_losing_the_race_keeps_handle() {
    let h = Harness::racing();
    h.user_with_handle(ALICE, "alice");
    h.before_next_write(|store| force_state(store, ALICE, ConversationState::RegisteringHandle));

    h.relay.press(&press(ALICE, "ru", Some((50, None)))).await.unwrap();

    assert_eq!(h.transport().last_answer(), Some(Some(texts::CONCURRENT_UPDATE.to_string())));
    let alice = h.user(ALICE);
    assert_eq!(alice.handle.map(|h| h.as_str().to_string()), Some("alice".to_string()));
    assert_eq!(alice.state, ConversationState::RegisteringHandle);
    assert!(h.transport().calls_of(CallKind::EditText).is_empty());
}

#[tokio::test]
async fn test_cancel_losing_the_race_leaves_winner_alone() {
    let h = Harness::racing();
    let bob = h.user_with_handle(BOB, "bob");
    h.user_without_handle(ALICE);
    force_state(h.store(), ALICE, ConversationState::RegisteringHandle);
    let winner = composing_to(&bob.stable_id);
    let written = winner.clone();
    h.before_next_write(move |store| force_state(store, ALICE, written));

    h.relay.press(&press(ALICE, "cu", Some((50, None)))).await.unwrap();

    assert_eq!(h.transport().last_answer(), Some(Some(texts::CANCEL_ANSWER.to_string())));
    assert_eq!(h.user(ALICE).state, winner);
}

#[tokio::test]
async fn test_relay_still_delivers_when_final_reset_loses() {
    let h = Harness::racing();
    h.user_with_handle(BOB, "bob");
    h.relay.start(&text(ALICE, 1, "/start _bob"), Some("_bob")).await.unwrap();
    h.transport().take();
    h.before_next_write(|store| force_state(store, ALICE, ConversationState::RegisteringHandle));

    h.relay.text(&text(ALICE, 2, "hi")).await.unwrap();

    assert_eq!(h.transport().sent_texts(BOB), vec![texts::NEW_MESSAGE.to_string()]);
    assert_eq!(h.user(ALICE).state, ConversationState::RegisteringHandle);
}

#[tokio::test]
async fn test_handle_taken_between_lookup_and_write() {
    let h = Harness::racing();
    h.user_without_handle(BOB);
    h.user_without_handle(ALICE);
    force_state(h.store(), ALICE, ConversationState::RegisteringHandle);
    h.before_next_write(|store| {
        let bob = store.find_by_platform_id(BOB).unwrap().unwrap();
        let claim = UserUpdate::reset().with_handle(Handle::parse("zed").unwrap());
        store.update(&bob, &claim).unwrap();
    });

    h.relay.text(&text(ALICE, 2, "Zed")).await.unwrap();

    assert_eq!(h.transport().sent_texts(ALICE), vec![texts::HANDLE_TAKEN.to_string()]);
    let alice = h.user(ALICE);
    assert_eq!(alice.state, ConversationState::RegisteringHandle);
    assert_eq!(alice.handle, None);
    assert_eq!(
        h.store().find_by_handle("zed").unwrap().map(|u| u.platform_id),
        Some(BOB)
    );
}
