//! End-to-end ingestion scenarios through the public Ingestor surface

use std::io::Read;
use std::sync::Arc;

use sigdex::term_table::{BankedTermTable, TermTable};
use sigdex::testing::{FailingDocument, TermListDocument};
use sigdex::{
    DocumentDataSchema, FileManager, Ingestor, ShardDefinition, SigdexError,
    SliceBufferAllocator,
};

struct Fixture {
    ingestor: Ingestor,
    allocator: Arc<SliceBufferAllocator>,
    _dir: tempfile::TempDir,
}

fn fixture(shard_definition: ShardDefinition) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let file_manager = FileManager::new(dir.path().join("build"), dir.path().join("index"));
    let term_table: Arc<dyn TermTable> = Arc::new(BankedTermTable::new(vec![32], 3));
    let allocator = Arc::new(SliceBufferAllocator::new(1024));
    let ingestor = Ingestor::new(
        file_manager,
        &DocumentDataSchema::new(),
        term_table,
        shard_definition,
        Arc::clone(&allocator),
    )
    .unwrap();
    Fixture {
        ingestor,
        allocator,
        _dir: dir,
    }
}

#[test]
fn add_delete_contains_ordering() {
    let fx = fixture(ShardDefinition::single());
    let doc = TermListDocument::from_tokens(&["cat", "dog"]);

    assert!(!fx.ingestor.contains(7));
    fx.ingestor.add(7, &doc).unwrap();
    assert!(fx.ingestor.contains(7));
    assert_eq!(fx.ingestor.document_count(), 1);

    assert!(fx.ingestor.delete(7).unwrap());
    assert!(!fx.ingestor.contains(7));

    // Re-adding the same id after deletion is a fresh document.
    fx.ingestor.add(7, &doc).unwrap();
    assert!(fx.ingestor.contains(7));
}

#[test]
fn delete_of_absent_id_returns_false() {
    let fx = fixture(ShardDefinition::single());
    assert!(!fx.ingestor.delete(42).unwrap());
}

#[test]
fn duplicate_add_fails_and_rolls_back() {
    let fx = fixture(ShardDefinition::single());
    let doc = TermListDocument::from_tokens(&["cat"]);

    fx.ingestor.add(1, &doc).unwrap();
    let err = fx.ingestor.add(1, &doc).unwrap_err();
    assert!(matches!(err, SigdexError::DuplicateDocument(1)));

    // The original mapping survives; the duplicate's column was expired.
    assert!(fx.ingestor.contains(1));
    let slice = fx.ingestor.shard(0).active_slice().unwrap();
    assert_eq!(slice.committed_count(), 2);
    assert_eq!(slice.expired_count(), 1);

    // The index keeps working after the failure.
    fx.ingestor.add(2, &doc).unwrap();
    assert!(fx.ingestor.contains(2));
}

#[test]
fn failed_ingest_rolls_back_unmasked() {
    let fx = fixture(ShardDefinition::single());

    let err = fx.ingestor.add(5, &FailingDocument::new(3)).unwrap_err();
    assert!(matches!(err, SigdexError::TermResolution(_)));
    assert!(!fx.ingestor.contains(5));

    fx.ingestor
        .add(6, &TermListDocument::from_tokens(&["cat"]))
        .unwrap();
    assert!(fx.ingestor.contains(6));
}

#[test]
fn documents_route_to_shards_by_posting_count() {
    let fx = fixture(ShardDefinition::new(vec![0, 4]));
    assert_eq!(fx.ingestor.shard_count(), 2);

    fx.ingestor
        .add(1, &TermListDocument::from_tokens(&["a", "b"]))
        .unwrap();
    fx.ingestor
        .add(2, &TermListDocument::from_tokens(&["a", "b", "c", "d", "e"]))
        .unwrap();

    assert!(fx.ingestor.shard(0).active_slice().is_some());
    assert!(fx.ingestor.shard(1).active_slice().is_some());
    assert!(fx.ingestor.contains(1));
    assert!(fx.ingestor.contains(2));
}

#[test]
fn postings_set_bits_for_each_term_row() {
    let fx = fixture(ShardDefinition::single());
    fx.ingestor
        .add(9, &TermListDocument::from_tokens(&["cat"]))
        .unwrap();

    let shard = fx.ingestor.shard(0);
    let slice = shard.active_slice().unwrap();
    let term = sigdex::Term::new("cat", 0, 0);
    for row in shard.term_table().row_ids(&term) {
        assert!(shard
            .layout()
            .row_table(row.rank())
            .get_bit(slice.buffer(), row.index(), 0));
    }
}

#[test]
fn deleting_every_document_recycles_the_slice() {
    let fx = fixture(ShardDefinition::single());
    let capacity = fx.ingestor.shard(0).slice_capacity();
    let doc = TermListDocument::from_tokens(&["cat", "dog"]);

    for id in 0..capacity as u64 {
        fx.ingestor.add(id, &doc).unwrap();
    }
    assert_eq!(fx.allocator.in_use_count(), 1);

    for id in 0..capacity as u64 {
        assert!(fx.ingestor.delete(id).unwrap());
    }

    fx.ingestor.recycler().flush();
    assert_eq!(fx.allocator.in_use_count(), 0);
    assert!(fx.ingestor.shard(0).active_slice().is_none());

    // The shard starts a fresh slice for the next document.
    fx.ingestor.add(1000, &doc).unwrap();
    assert!(fx.ingestor.contains(1000));
    assert_eq!(fx.allocator.in_use_count(), 1);
}

#[test]
fn filling_a_slice_rolls_over_and_keeps_lookups_working() {
    let fx = fixture(ShardDefinition::single());
    let capacity = fx.ingestor.shard(0).slice_capacity();
    let doc = TermListDocument::from_tokens(&["cat"]);

    let total = capacity as u64 + 3;
    for id in 0..total {
        fx.ingestor.add(id, &doc).unwrap();
    }
    assert_eq!(fx.allocator.in_use_count(), 2);

    for id in 0..total {
        assert!(fx.ingestor.contains(id));
    }

    let token = fx.ingestor.token_manager().request_token().unwrap();
    assert_eq!(fx.ingestor.shard(0).slice_list(&token).len(), 2);
}

#[test]
fn blob_payloads_survive_ingestion() {
    let dir = tempfile::tempdir().unwrap();
    let file_manager = FileManager::new(dir.path().join("build"), dir.path().join("index"));
    let term_table: Arc<dyn TermTable> = Arc::new(BankedTermTable::new(vec![32], 3));

    let mut schema = DocumentDataSchema::new();
    let var0 = schema.register_variable_size_blob();
    let fixed0 = schema.register_fixed_size_blob(8);

    let allocator = Arc::new(SliceBufferAllocator::new(4096));
    let ingestor = Ingestor::new(
        file_manager,
        &schema,
        term_table,
        ShardDefinition::single(),
        allocator,
    )
    .unwrap();

    let doc = TermListDocument::from_tokens(&["cat"])
        .with_fixed_payload(fixed0, b"fixedpay".to_vec())
        .with_variable_payload(var0, b"variable payload".to_vec());
    ingestor.add(11, &doc).unwrap();

    // The map hands back a handle naming the same column the document
    // wrote through.
    let shard = ingestor.shard(0);
    let slice = shard.active_slice().unwrap();
    let layout = shard.layout();

    let mut fixed = [0u8; 8];
    layout
        .doc_table()
        .read_fixed_size_blob(slice.buffer(), 0, fixed0, &mut fixed);
    assert_eq!(&fixed, b"fixedpay");

    let payload = layout
        .doc_table()
        .get_variable_size_blob(slice.buffer(), 0, var0)
        .unwrap();
    assert_eq!(
        layout.doc_table().variable_size_blob_len(slice.buffer(), 0, var0),
        Some(16)
    );
    let mut variable = vec![0u8; 16];
    unsafe {
        std::ptr::copy_nonoverlapping(payload.as_ptr(), variable.as_mut_ptr(), 16)
    };
    assert_eq!(&variable, b"variable payload");
}

#[test]
fn reserved_operations_report_not_implemented() {
    let fx = fixture(ShardDefinition::single());
    assert!(matches!(
        fx.ingestor.assert_fact(1, sigdex::FactHandle(2), true),
        Err(SigdexError::NotImplemented(_))
    ));
    assert!(matches!(
        fx.ingestor.open_group(1),
        Err(SigdexError::NotImplemented(_))
    ));
    assert!(matches!(
        fx.ingestor.close_group(),
        Err(SigdexError::NotImplemented(_))
    ));
    assert!(matches!(
        fx.ingestor.expire_group(1),
        Err(SigdexError::NotImplemented(_))
    ));
    assert!(matches!(
        fx.ingestor.used_capacity_in_bytes(),
        Err(SigdexError::NotImplemented(_))
    ));
}

#[test]
fn statistics_write_through_the_file_manager() {
    let dir = tempfile::tempdir().unwrap();
    let file_manager = FileManager::new(dir.path().join("build"), dir.path().join("index"));
    let term_table: Arc<dyn TermTable> = Arc::new(BankedTermTable::new(vec![32], 3));
    let allocator = Arc::new(SliceBufferAllocator::new(1024));
    let ingestor = Ingestor::new(
        file_manager,
        &DocumentDataSchema::new(),
        term_table,
        ShardDefinition::single(),
        allocator,
    )
    .unwrap();

    for id in 0..5u64 {
        ingestor
            .add(id, &TermListDocument::from_tokens(&["cat", "dog"]))
            .unwrap();
    }

    let mut summary = Vec::new();
    ingestor.print_statistics(&mut summary).unwrap();
    let summary = String::from_utf8(summary).unwrap();
    assert!(summary.contains("Shard count: 1"));
    assert!(summary.contains("Document count: 5"));
    assert!(summary.contains("Posting count: 10"));

    ingestor.write_statistics().unwrap();

    let check = FileManager::new(dir.path().join("build"), dir.path().join("index"));
    assert!(check.document_length_histogram().exists());
    assert!(check.cumulative_term_counts(0).exists());
    assert!(check.doc_freq_table(0).exists());
    assert!(check.indexed_idf_table(0).exists());

    let mut contents = String::new();
    check
        .doc_freq_table(0)
        .open_for_read()
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    // Two terms, each in every document.
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.lines().all(|line| line.ends_with(",1")));
}

#[test]
fn shutdown_refuses_further_deletes() {
    let fx = fixture(ShardDefinition::single());
    fx.ingestor
        .add(1, &TermListDocument::from_tokens(&["cat"]))
        .unwrap();

    fx.ingestor.shutdown();
    assert!(matches!(
        fx.ingestor.delete(1),
        Err(SigdexError::TokensShutDown)
    ));
    // Lookup has no token requirement.
    assert!(fx.ingestor.contains(1));
}
