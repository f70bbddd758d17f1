//! Property tests for the sliding-window memory buffer.

use parkchat_session::MessageBuffer;
use parkchat_store::{MemoryCache, MemoryMessageStore, MessageRole};
use proptest::prelude::*;
use std::sync::Arc;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// After any number of appends the window holds exactly the newest
    /// `min(appends, max_size)` messages, in chronological order.
    #[test]
    fn window_holds_newest_messages(max_size in 1usize..16, appends in 0usize..48) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        rt.block_on(async move {
            let buffer = MessageBuffer::new(
                Arc::new(MemoryMessageStore::new()),
                Arc::new(MemoryCache::new()),
                max_size,
                60,
            );

            for i in 0..appends {
                buffer
                    .add_message("s1", MessageRole::User, &format!("m{i}"))
                    .await
                    .unwrap();
            }

            let window = buffer.get("s1").await;
            let expected = appends.min(max_size);
            prop_assert_eq!(window.messages.len(), expected);

            let first = appends - expected;
            for (offset, message) in window.messages.iter().enumerate() {
                prop_assert_eq!(&message.content, &format!("m{}", first + offset));
            }
            Ok(())
        })?;
    }
}
