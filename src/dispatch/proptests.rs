//! Property-based tests for the dispatcher
//!
//! Random sequences of sends, notices and resets against scripted replies
//! must keep the conversation well formed.

use super::testing::MockTransport;
use super::*;
use crate::conversation::Role;
use crate::transport::TransportError;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Send {
        text: String,
        mode: TransportMode,
        succeed: bool,
    },
    Notice(String),
    NewChat,
}

fn arb_mode() -> impl Strategy<Value = TransportMode> {
    prop_oneof![Just(TransportMode::Regular), Just(TransportMode::Streaming)]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => ("[ a-z]{0,8}", arb_mode(), any::<bool>())
            .prop_map(|(text, mode, succeed)| Op::Send { text, mode, succeed }),
        2 => "[a-z]{1,8}".prop_map(Op::Notice),
        1 => Just(Op::NewChat),
    ]
}

/// Script the mock for one send
fn script(mock: &MockTransport, mode: TransportMode, succeed: bool) {
    match (mode, succeed) {
        (TransportMode::Regular, true) => mock.queue_reply("reply"),
        (TransportMode::Regular, false) => mock.queue_chat_error(TransportError::status(500, "boom")),
        (TransportMode::Streaming, true) => mock.queue_stream(&["data: re", "ply\ndata: done\n"]),
        (TransportMode::Streaming, false) => mock.queue_stream(&["data: re\ndata: error:boom\n"]),
    }
}

proptest! {
    #[test]
    fn prop_history_stays_well_formed(ops in proptest::collection::vec(arb_op(), 1..25)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async {
            let dispatcher = Dispatcher::new(Arc::new(MockTransport::new()), &Settings::default());

            for op in ops {
                let before = dispatcher.history().len();
                match op {
                    Op::Send { text, mode, succeed } => {
                        dispatcher.set_mode(mode);
                        if !text.trim().is_empty() {
                            script(dispatcher.transport(), mode, succeed);
                        }
                        let outcome = dispatcher.send(&text).await;
                        let history = dispatcher.history();

                        if text.trim().is_empty() {
                            prop_assert_eq!(outcome, SendOutcome::Ignored(IgnoreReason::EmptyInput));
                            prop_assert_eq!(history.len(), before);
                        } else if succeed {
                            prop_assert!(matches!(outcome, SendOutcome::Completed(_)));
                            prop_assert_eq!(history.len(), before + 2);
                            prop_assert_eq!(history[before].role, Role::User);
                            prop_assert_eq!(&history[before].content, text.trim());
                            prop_assert_eq!(history[before + 1].role, Role::Assistant);
                            prop_assert_eq!(&history[before + 1].content, "reply");
                        } else {
                            prop_assert!(matches!(outcome, SendOutcome::Failed(_)));
                            prop_assert_eq!(history.len(), before + 1);
                            prop_assert_eq!(history[before].role, Role::User);
                        }
                    }
                    Op::Notice(text) => {
                        dispatcher.post_notice(text);
                        prop_assert_eq!(dispatcher.history().len(), before + 1);
                    }
                    Op::NewChat => {
                        dispatcher.new_chat();
                        prop_assert!(dispatcher.history().is_empty());
                    }
                }

                prop_assert!(!dispatcher.is_generating());
                prop_assert!(dispatcher.transport_view().iter().all(|m| m.role != Role::System));
            }

            Ok::<(), TestCaseError>(())
        })?;
    }
}
