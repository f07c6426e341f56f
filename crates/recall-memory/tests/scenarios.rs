use std::sync::Arc;

use recall_core::{ChunkKind, LLMProvider, Role, SnapshotStorage};
use recall_llm::MockLLMProvider;
use recall_memory::{ConversationStore, MemoryConfig};
use recall_storage::LocalStorage;
use tempfile::TempDir;

fn store_with(llm: MockLLMProvider, temp_dir: &TempDir, config: MemoryConfig) -> ConversationStore {
    let llm: Arc<dyn LLMProvider> = Arc::new(llm);
    ConversationStore::new(llm, Arc::new(LocalStorage::new(temp_dir.path())), config)
}

fn scripted() -> MockLLMProvider {
    let mut mock = MockLLMProvider::new("scripted");
    mock.set_responses(
        vec![
            "FACTS: introductions\nUSER DETAILS: Maya, Lisbon\nTOPICS: travel".to_string(),
            r#"{"name": "Maya", "location": "Lisbon", "profession": null,
                "interests": ["travel"], "personalDetails": [], "relationships": [],
                "preferences": []}"#
                .to_string(),
        ],
        true,
    );
    mock
}

#[tokio::test]
async fn buffer_stays_below_threshold_and_chunks_are_sequential() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());
    let session = store.get(None).await;

    for i in 0..65 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        session.add_message(role, format!("message {}", i)).await.unwrap();
        assert!(session.active_messages().len() < 20);
    }

    let history = session.compression_history();
    assert_eq!(history.len(), 3);
    for (i, chunk) in history.iter().enumerate() {
        assert_eq!(chunk.chunk_number, i + 1);
        assert_eq!(chunk.message_count, 20);
    }
    let summed: usize = history.iter().map(|c| c.message_count).sum();
    assert_eq!(session.total_processed_count(), summed);
    assert_eq!(session.get_stats().total_processed_messages, 65);
}

#[tokio::test]
async fn always_failing_model_never_surfaces_an_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(
        MockLLMProvider::failing("service unavailable"),
        &temp_dir,
        MemoryConfig::default(),
    );
    let session = store.get(Some("offline")).await;

    for i in 0..25 {
        session
            .add_message(Role::User, format!("note {}", i))
            .await
            .unwrap();
    }

    assert!(session.active_messages().len() < 20);
    let history = session.compression_history();
    assert!(!history.is_empty());
    assert_eq!(history[0].kind, ChunkKind::Fallback);
    assert_eq!(history[0].chunk_number, 1);
    assert_eq!(session.total_processed_count(), 20);
}

#[tokio::test]
async fn early_introduction_fills_profile_after_first_compression() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());
    let session = store.get(None).await;

    session
        .add_message(Role::User, "Hi! I'm Maya and I live in Lisbon.")
        .await
        .unwrap();
    for i in 1..20 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        session.add_message(role, format!("turn {}", i)).await.unwrap();
    }

    assert_eq!(session.compression_history().len(), 1);
    let profile = session.user_profile();
    assert!(profile.name.as_deref().is_some_and(|n| !n.is_empty()));
    assert_eq!(profile.location.as_deref(), Some("Lisbon"));
}

#[tokio::test]
async fn early_introduction_is_found_without_a_model() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(
        MockLLMProvider::failing("offline"),
        &temp_dir,
        MemoryConfig::default(),
    );
    let session = store.get(None).await;

    session
        .add_message(Role::User, "Hello, my name is Viktor and I live in Tallinn.")
        .await
        .unwrap();
    for i in 1..20 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        session.add_message(role, format!("turn {}", i)).await.unwrap();
    }

    assert_eq!(session.compression_history().len(), 1);
    assert_eq!(session.user_profile().name.as_deref(), Some("Viktor"));
}

#[tokio::test]
async fn optimized_prompt_carries_history_and_recent_messages() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());
    let session = store.get(None).await;

    for i in 0..23 {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        session.add_message(role, format!("line {}", i)).await.unwrap();
    }

    let messages = session.get_optimized_messages();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].role, Role::System);
    assert!(messages[0].content.contains("Chunk 1"));
    assert!(messages[0].content.contains("USER PROFILE:"));
    assert_eq!(messages[1].content, "line 20");
    assert_eq!(messages[3].content, "line 22");

    // rendering is pure
    assert_eq!(messages, session.get_optimized_messages());
}

#[tokio::test]
async fn store_hands_out_fresh_and_shared_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());

    let first = store.get(None).await;
    let second = store.get(None).await;
    assert_ne!(first.id(), second.id());

    let a = store.get(Some("shared")).await;
    let b = store.get(Some("shared")).await;
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn registry_keeps_most_recently_created_sessions() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());

    let mut ids = Vec::new();
    for _ in 0..105 {
        ids.push(store.get(None).await.id().to_string());
    }

    assert_eq!(store.len(), 100);
    for id in &ids[..5] {
        assert!(!store.contains(id));
    }
    for id in &ids[5..] {
        assert!(store.contains(id));
    }
    assert_eq!(store.ids(), ids[5..].to_vec());
}

#[tokio::test]
async fn compressed_state_survives_eviction() {
    let temp_dir = TempDir::new().unwrap();
    let config = MemoryConfig::default().with_registry_capacity(1);
    let store = store_with(scripted(), &temp_dir, config);

    let session = store.get(Some("durable")).await;
    for i in 0..22 {
        session.add_message(Role::User, format!("m{}", i)).await.unwrap();
    }
    let before = session.snapshot();
    drop(session);

    store.get(Some("someone-else")).await;
    assert!(!store.contains("durable"));

    let reloaded = store.get(Some("durable")).await;
    assert_eq!(reloaded.compression_history(), before.compression_history);
    assert_eq!(reloaded.user_profile(), before.user_profile);
    assert_eq!(reloaded.total_processed_count(), 20);
    // the unsaved tail is gone
    assert!(reloaded.active_messages().is_empty());
}

#[tokio::test]
async fn snapshot_round_trips_through_local_storage() {
    let temp_dir = TempDir::new().unwrap();
    let store = store_with(scripted(), &temp_dir, MemoryConfig::default());
    let session = store.get(Some("roundtrip")).await;

    for i in 0..20 {
        session.add_message(Role::User, format!("m{}", i)).await.unwrap();
    }

    let storage = LocalStorage::new(temp_dir.path());
    let stored = storage.load("roundtrip").await.unwrap().unwrap();
    let live = session.snapshot();
    assert_eq!(stored.conversation_id, live.conversation_id);
    assert_eq!(stored.user_profile, live.user_profile);
    assert_eq!(stored.compression_history, live.compression_history);
    assert_eq!(stored.total_processed_count, live.total_processed_count);
    assert_eq!(store.persisted_ids().await.unwrap(), vec!["roundtrip"]);
}
