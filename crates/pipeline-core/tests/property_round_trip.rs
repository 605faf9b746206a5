//! Property tests for the round-trip laws in spec §8:
//! `Snapshot Save ∘ Load` and `Sink Save ∘ GetById` are both the identity.

use proptest::prelude::*;

use pipeline_core::{InMemorySink, Message, ProcessedRecord, Sink, SnapshotStore};

fn arb_message() -> impl Strategy<Value = Message> {
    ("[a-zA-Z0-9_-]{1,16}", "[a-zA-Z0-9 _-]{1,32}").prop_map(|(source, payload)| {
        let mut msg = Message::new(source, payload);
        msg.status = pipeline_core::MessageStatus::Sent;
        msg
    })
}

fn record_for(msg: &Message) -> ProcessedRecord {
    pipeline_core::transform(msg)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn snapshot_round_trips_arbitrary_message_batches(messages in prop::collection::vec(arb_message(), 0..16)) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshot.json")).unwrap();

        store.save(&messages).unwrap();
        let loaded = store.load();

        prop_assert_eq!(loaded, messages);
    }

    #[test]
    fn sink_round_trips_arbitrary_processed_records(msg in arb_message()) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let sink = InMemorySink::new();
            let record = record_for(&msg);

            sink.save(record.clone()).await.unwrap();
            let fetched = sink.get_by_id(msg.id).await.unwrap();

            prop_assert_eq!(fetched, Some(record));
            Ok(())
        })?;
    }
}
