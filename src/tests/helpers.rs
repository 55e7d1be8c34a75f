use crate::chat::ChatThread;
use crate::model::{Message, MessageDraft};
use crate::store::{CreateMessage, Credential, MemoryStore};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

pub const THREAD: &str = "T1";
pub const ENTREPRENEUR: &str = "U1";
pub const INVESTOR: &str = "U2";
pub const ENTREPRENEUR_TOKEN: &str = "tok-u1";
pub const INVESTOR_TOKEN: &str = "tok-u2";

/// Store with both negotiation parties registered
pub async fn create_test_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.register_token(ENTREPRENEUR_TOKEN, ENTREPRENEUR).await;
    store.register_token(INVESTOR_TOKEN, INVESTOR).await;
    store
}

/// Chat view of thread T1 for U1
pub fn create_test_chat(store: &MemoryStore) -> ChatThread<MemoryStore> {
    ChatThread::new(
        Arc::new(store.clone()),
        THREAD,
        ENTREPRENEUR,
        Some(Credential::new(ENTREPRENEUR_TOKEN)),
    )
}

/// Store a message from the investor directly
pub async fn seed_inbound(store: &MemoryStore, content: &str) -> Message {
    let request = CreateMessage::from_draft(&MessageDraft::text(content), None);
    store.create_as(INVESTOR, THREAD, &request).await
}

pub fn count(counter: &AtomicUsize) -> usize {
    crate::store::memory::StoreStats::get(counter)
}
