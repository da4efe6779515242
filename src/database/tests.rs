use super::*;
use crate::file::DEFAULT_POOL_PAGES;
use crate::index::{HashScheme, IndexError};
use crate::record::{Op, RecordError, Type};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn people_desc() -> TupleDesc {
    TupleDesc::with_names(vec![(Type::Int, "id"), (Type::Str, "name")]).unwrap()
}

fn setup_test_db(pool_pages: usize) -> (TempDir, Database) {
    let temp_dir = TempDir::new().unwrap();
    let mut db = Database::create(temp_dir.path(), pool_pages).unwrap();
    db.create_table("people", people_desc()).unwrap();
    (temp_dir, db)
}

fn row(id: i32, name: &str) -> Vec<Field> {
    vec![Field::Int(id), Field::string(name).unwrap()]
}

fn ids(tuples: &[Tuple]) -> BTreeSet<i32> {
    tuples
        .iter()
        .map(|t| match t.field(0).unwrap() {
            Field::Int(v) => *v,
            other => panic!("unexpected id field {}", other),
        })
        .collect()
}

#[test]
fn test_single_page_pool_scan() {
    let (_temp_dir, mut db) = setup_test_db(1);
    db.insert("people", row(1, "a")).unwrap();
    db.insert("people", row(2, "b")).unwrap();
    db.insert("people", row(3, "c")).unwrap();

    let tuples = db.scan_all("people").unwrap();
    let names: Vec<String> = tuples.iter().map(|t| t.field(1).unwrap().to_string()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert_eq!(ids(&tuples), BTreeSet::from([1, 2, 3]));
    assert_eq!(db.pool_stats().peak_resident, 1);
}

#[test]
fn test_scan_spills_past_pool_capacity() {
    let (_temp_dir, mut db) = setup_test_db(2);
    // 30 rows of (int, string) fit on one page
    for i in 0..100 {
        db.insert("people", row(i, &format!("p{}", i))).unwrap();
    }

    let tuples = db.scan_all("people").unwrap();
    assert_eq!(tuples.len(), 100);
    assert_eq!(tuples[64].field(0).unwrap(), &Field::Int(64));
    let stats = db.pool_stats();
    assert!(stats.peak_resident <= 2);
    assert!(stats.evictions > 0);
}

#[test]
fn test_index_finds_every_key() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    for i in 0..100 {
        db.insert("people", row(i, &format!("p{}", i))).unwrap();
    }
    // Half the rows exist before the index, half are added through it
    db.create_index("people_id", "people", "id", 97).unwrap();
    for i in 100..200 {
        db.insert("people", row(i, &format!("p{}", i))).unwrap();
    }

    for i in 0..200 {
        let found = db
            .index_search("people_id", &AccessPredicate::equals(Field::Int(i)))
            .unwrap();
        assert_eq!(found.len(), 1, "key {}", i);
        assert_eq!(found[0].field(1).unwrap().to_string(), format!("p{}", i));
    }

    let entries = db.index_entries("people_id").unwrap();
    assert_eq!(entries.len(), 200);
    let stats = db.bucket_stats("people_id").unwrap();
    assert_eq!(stats.len(), 97);
    assert_eq!(stats.iter().map(|s| s.entries).sum::<usize>(), 200);
    assert!(stats.iter().all(|s| s.pages == 1));
}

#[test]
fn test_colliding_keys_overflow() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.create_index("people_id", "people", "id", 97).unwrap();
    // Multiples of 97 all hash to bucket 0; 337 int entries fit per page
    for k in 0..400 {
        db.insert("people", row(k * 97, "x")).unwrap();
    }

    let stats = db.bucket_stats("people_id").unwrap();
    assert_eq!(stats[0].entries, 400);
    assert_eq!(stats[0].pages, 2);
    assert!(stats[1..].iter().all(|s| s.entries == 0 && s.pages == 1));

    for k in [0, 1, 336, 337, 338, 399] {
        let found = db
            .index_search("people_id", &AccessPredicate::equals(Field::Int(k * 97)))
            .unwrap();
        assert_eq!(ids(&found), BTreeSet::from([k * 97]));
    }
}

#[test]
fn test_index_search_matches_full_scan() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    for i in 0..150 {
        db.insert("people", row(i, &format!("g{}", i % 5))).unwrap();
    }
    db.create_index("people_name", "people", "name", 97).unwrap();
    db.create_index("people_id", "people", "id", 97).unwrap();

    let all = db.scan_all("people").unwrap();
    let cases = [
        ("people_name", AccessPredicate::equals(Field::string("g3").unwrap())),
        ("people_id", AccessPredicate::new(Op::GreaterThan, Field::Int(120))),
        ("people_id", AccessPredicate::new(Op::LessThanOrEq, Field::Int(7))),
        ("people_id", AccessPredicate::new(Op::NotEquals, Field::Int(3))),
    ];
    for (index, pred) in cases {
        let field = if index == "people_name" { 1 } else { 0 };
        let expected: Vec<Tuple> = all
            .iter()
            .filter(|t| pred.filter(t, field).unwrap())
            .cloned()
            .collect();
        let found = db.index_search(index, &pred).unwrap();
        assert_eq!(found.len(), expected.len(), "{} {}", index, pred);
        assert_eq!(ids(&found), ids(&expected), "{} {}", index, pred);
    }
}

#[test]
fn test_filter_scan_returns_entries() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.create_index("people_id", "people", "id", 97).unwrap();
    let rid = db.insert("people", row(42, "x")).unwrap();
    db.insert("people", row(43, "y")).unwrap();

    let mut iter = db
        .filter_scan("people_id", &AccessPredicate::equals(Field::Int(42)))
        .unwrap();
    iter.open().unwrap();
    let entries = iter.collect_tuples().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].fields(),
        &[
            Field::Int(42),
            Field::Int(rid.page_id.page_no as i32),
            Field::Int(rid.slot as i32)
        ]
    );

    let rids = db
        .index_rids("people_id", &AccessPredicate::equals(Field::Int(42)))
        .unwrap();
    assert_eq!(rids, vec![rid]);
}

#[test]
fn test_insert_delete_restores_bucket() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.create_index("people_id", "people", "id", 97).unwrap();
    for i in 0..20 {
        db.insert("people", row(i, "x")).unwrap();
    }
    let bucket = HashScheme::for_buckets(97).bucket(&Field::Int(500), 97);
    let before = db.bucket_stats("people_id").unwrap()[bucket].entries;

    let rid = db.insert("people", row(500, "new")).unwrap();
    assert_eq!(db.bucket_stats("people_id").unwrap()[bucket].entries, before + 1);

    let tuple = db.fetch_tuple(rid).unwrap();
    let dirtied = db.delete_tuple(TransactionId::new(), &tuple).unwrap();
    assert!(dirtied.contains(&rid.page_id));
    assert!(dirtied.contains(&PageId::bucket(db.index("people_id").unwrap().id(), bucket)));

    assert_eq!(db.bucket_stats("people_id").unwrap()[bucket].entries, before);
    assert!(
        db.index_search("people_id", &AccessPredicate::equals(Field::Int(500)))
            .unwrap()
            .is_empty()
    );
    assert_eq!(db.scan_all("people").unwrap().len(), 20);
}

#[test]
fn test_deleted_slot_is_reused() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.insert("people", row(1, "a")).unwrap();
    let rid = db.insert("people", row(2, "b")).unwrap();
    db.insert("people", row(3, "c")).unwrap();

    let tuple = db.fetch_tuple(rid).unwrap();
    db.delete_tuple(TransactionId::new(), &tuple).unwrap();
    assert!(matches!(
        db.fetch_tuple(rid),
        Err(DatabaseError::RecordError(RecordError::TupleNotFound { .. }))
    ));

    let reused = db.insert("people", row(4, "d")).unwrap();
    assert_eq!(reused, rid);
    assert_eq!(ids(&db.scan_all("people").unwrap()), BTreeSet::from([1, 3, 4]));
}

#[test]
fn test_delete_without_index_entry_fails() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.create_index("people_id", "people", "id", 97).unwrap();
    let rid = db.insert("people", row(7, "x")).unwrap();

    let mut tuple = db.fetch_tuple(rid).unwrap();
    tuple.set_field(0, Field::Int(8)).unwrap();
    assert!(matches!(
        db.delete_tuple(TransactionId::new(), &tuple),
        Err(DatabaseError::IndexError(IndexError::EntryNotFound { .. }))
    ));

    let missing_rid = Tuple::new(Arc::new(people_desc()), row(7, "x")).unwrap();
    assert!(matches!(
        db.delete_tuple(TransactionId::new(), &missing_rid),
        Err(DatabaseError::RecordError(RecordError::MissingRecordId))
    ));
}

#[test]
fn test_failed_delete_keeps_every_index_entry() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    db.create_index("people_id", "people", "id", 97).unwrap();
    db.create_index("people_name", "people", "name", 97).unwrap();
    let rid = db.insert("people", row(7, "x")).unwrap();

    // The id entry matches but the name entry does not
    let mut tuple = db.fetch_tuple(rid).unwrap();
    tuple.set_field(1, Field::string("zz").unwrap()).unwrap();
    assert!(matches!(
        db.delete_tuple(TransactionId::new(), &tuple),
        Err(DatabaseError::IndexError(IndexError::EntryNotFound { .. }))
    ));

    assert_eq!(db.scan_all("people").unwrap().len(), 1);
    let by_id = AccessPredicate::new(Op::Equals, Field::Int(7));
    assert_eq!(db.index_rids("people_id", &by_id).unwrap(), vec![rid]);
    let by_name = AccessPredicate::new(Op::Equals, Field::string("x").unwrap());
    assert_eq!(db.index_rids("people_name", &by_name).unwrap(), vec![rid]);

    // The unmodified row still deletes cleanly from everything
    let tuple = db.fetch_tuple(rid).unwrap();
    db.delete_tuple(TransactionId::new(), &tuple).unwrap();
    assert!(db.scan_all("people").unwrap().is_empty());
    assert!(db.index_rids("people_id", &by_id).unwrap().is_empty());
    assert!(db.index_rids("people_name", &by_name).unwrap().is_empty());
}

#[test]
fn test_failed_insert_takes_back_row_and_entries() {
    let (temp_dir, mut db) = setup_test_db(4);
    db.create_index("people_id", "people", "id", 97).unwrap();
    db.create_index("people_name", "people", "name", 97).unwrap();
    db.flush().unwrap();

    // "x" hashes to bucket 64, which can no longer be read back
    assert_eq!(HashScheme::for_buckets(97).bucket(&Field::string("x").unwrap(), 97), 64);
    std::fs::OpenOptions::new()
        .write(true)
        .open(temp_dir.path().join("people_name.idx"))
        .unwrap()
        .set_len(0)
        .unwrap();

    let mut tuple = Tuple::new(Arc::new(people_desc()), row(7, "x")).unwrap();
    let table_id = db.table_id("people").unwrap();
    let result = db.insert_tuple(TransactionId::new(), table_id, &mut tuple);
    assert!(matches!(result, Err(DatabaseError::IndexError(_))));
    assert_eq!(tuple.record_id(), None);

    assert!(db.scan_all("people").unwrap().is_empty());
    let by_id = AccessPredicate::new(Op::Equals, Field::Int(7));
    assert!(db.index_rids("people_id", &by_id).unwrap().is_empty());
}

#[test]
fn test_reopen_keeps_rows_and_indexes() {
    let temp_dir = TempDir::new().unwrap();
    {
        let mut db = Database::create(temp_dir.path(), 4).unwrap();
        db.create_table("people", people_desc()).unwrap();
        db.create_index("people_id", "people", "id", 97).unwrap();
        for k in 0..350 {
            db.insert("people", row(k * 97, &format!("p{}", k))).unwrap();
        }
        db.close().unwrap();
    }

    let mut db = Database::open(temp_dir.path(), 4).unwrap();
    assert_eq!(db.table_names(), vec!["people"]);
    assert_eq!(db.index_names(), vec!["people_id"]);
    assert_eq!(db.scan_all("people").unwrap().len(), 350);

    let found = db
        .index_search("people_id", &AccessPredicate::equals(Field::Int(340 * 97)))
        .unwrap();
    assert_eq!(found[0].field(1).unwrap().to_string(), "p340");

    // The overflow counter resumes after the pages already on disk
    for k in 350..700 {
        db.insert("people", row(k * 97, "q")).unwrap();
    }
    assert_eq!(db.bucket_stats("people_id").unwrap()[0].pages, 3);
    for k in [0, 349, 350, 699] {
        let found = db
            .index_search("people_id", &AccessPredicate::equals(Field::Int(k * 97)))
            .unwrap();
        assert_eq!(found.len(), 1, "key {}", k * 97);
    }
}

#[test]
fn test_load_schema_and_csv() {
    let temp_dir = TempDir::new().unwrap();
    let schema = temp_dir.path().join("schema.txt");
    fs::write(&schema, "people (id int, name string)\nscores (id int, score int)\n").unwrap();
    let csv_path = temp_dir.path().join("people.csv");
    fs::write(&csv_path, "1,ann\n2, bob\n3,cy\n").unwrap();

    let mut db = Database::create(temp_dir.path().join("db"), DEFAULT_POOL_PAGES).unwrap();
    let tables = db.load_schema(&schema).unwrap();
    assert_eq!(tables, vec!["people", "scores"]);
    assert_eq!(db.schema("scores").unwrap().field_type(1).unwrap(), Type::Int);

    assert_eq!(db.load_csv("people", &csv_path).unwrap(), 3);
    let tuples = db.scan_all("people").unwrap();
    assert_eq!(tuples[1].field(1).unwrap(), &Field::string("bob").unwrap());

    let bad_csv = temp_dir.path().join("bad.csv");
    fs::write(&bad_csv, "1,2,3\n").unwrap();
    assert!(matches!(
        db.load_csv("scores", &bad_csv),
        Err(DatabaseError::RecordError(RecordError::ArityMismatch { expected: 2, actual: 3 }))
    ));
    fs::write(&bad_csv, "1,lots\n").unwrap();
    assert!(db.load_csv("scores", &bad_csv).is_err());
}

#[test]
fn test_lifecycle_errors() {
    let temp_dir = TempDir::new().unwrap();
    assert!(matches!(
        Database::open(temp_dir.path(), 4),
        Err(DatabaseError::DatabaseNotFound(_))
    ));

    let db = Database::open_or_create(temp_dir.path(), 4).unwrap();
    drop(db);
    assert!(matches!(
        Database::create(temp_dir.path(), 4),
        Err(DatabaseError::DatabaseExists(_))
    ));

    let mut db = Database::open_or_create(temp_dir.path(), 4).unwrap();
    assert!(matches!(
        db.index_search("nope", &AccessPredicate::equals(Field::Int(1))),
        Err(DatabaseError::IndexNotFound(_))
    ));
    assert!(matches!(
        db.insert("nope", row(1, "a")),
        Err(DatabaseError::CatalogError(CatalogError::TableNotFound(_)))
    ));

    db.create_table("people", people_desc()).unwrap();
    assert!(matches!(
        db.insert("people", vec![Field::Int(1)]),
        Err(DatabaseError::RecordError(RecordError::ArityMismatch { .. }))
    ));
    assert!(matches!(
        db.create_index("people_age", "people", "age", 97),
        Err(DatabaseError::RecordError(RecordError::UnknownField(_)))
    ));
}

#[test]
fn test_writes_are_tagged_with_writer() {
    let (_temp_dir, mut db) = setup_test_db(DEFAULT_POOL_PAGES);
    let table_id = db.table_id("people").unwrap();
    let tid = TransactionId::new();
    let mut tuple = Tuple::new(Arc::new(people_desc()), row(1, "a")).unwrap();

    let dirtied = db.insert_tuple(tid, table_id, &mut tuple).unwrap();
    let pool = db.pool();
    let pool = lock_pool(&pool);
    for page in dirtied {
        assert!(pool.is_dirty(page));
        assert_eq!(pool.last_writer(page), Some(tid));
    }
}
