use litefile::{
    build_minimal_database, build_minimal_database_with, find_table, scan_table, write_database,
    BuildOptions, Error, SqlValue, StoredDb, TableDef,
};

fn mytable() -> TableDef {
    TableDef::new(
        "mytable",
        "CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)",
    )
}

fn alice_and_bob() -> Vec<Vec<SqlValue>> {
    vec![
        vec![SqlValue::Int(1), "Alice".into()],
        vec![SqlValue::Int(2), "Bob".into()],
    ]
}

#[test]
fn test_build_then_read_mytable() {
    let db = build_minimal_database(&mytable(), &alice_and_bob()).expect("Should have built db.");
    let root = find_table(&db, "mytable")
        .expect("Should have read schema.")
        .expect("Should have found table.");
    assert_eq!(root, 2);
    let rows: Vec<(u64, String)> = scan_table(&db, root)
        .expect("Should have opened scan.")
        .collect::<Result<_, _>>()
        .expect("Should have decoded rows.");
    assert_eq!(
        rows,
        vec![(1, "1 | 'Alice'".to_string()), (2, "2 | 'Bob'".to_string())]
    );
}

#[test]
fn test_table_not_found() {
    let db = StoredDb::from_bytes(build_minimal_database(&mytable(), &alice_and_bob()).unwrap())
        .unwrap();
    assert!(matches!(db.find_table("missing"), Ok(None)));
    assert!(matches!(
        db.root_pagenum("missing"),
        Err(Error::TableNotFound(_))
    ));
}

#[test]
fn test_short_file_and_bad_magic() {
    use litefile::dbheader;
    assert!(matches!(
        find_table(&[0_u8; 99], "mytable"),
        Err(Error::DbHdr(dbheader::Error::TruncatedFile { .. }))
    ));
    let mut db = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    assert!(matches!(
        find_table(&db[..600], "mytable"),
        Err(Error::DbHdr(dbheader::Error::TruncatedFile {
            needed: 1024,
            actual: 600
        }))
    ));
    db[..16].copy_from_slice(b"Not SQLite file\0");
    assert!(matches!(
        find_table(&db, "mytable"),
        Err(Error::DbHdr(dbheader::Error::NotASqliteFile))
    ));
}

#[test]
fn test_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let bytes = build_minimal_database(&mytable(), &alice_and_bob()).unwrap();
    write_database(&path, &bytes).unwrap();

    let db = StoredDb::open(&path).expect("Should have opened db.");
    assert_eq!(db.header().num_pages, 2);
    let rows = db.read_table("mytable").unwrap();
    assert_eq!(rows[1].rowid, 2);
    assert_eq!(rows[1].values, vec![SqlValue::Int(2), "Bob".into()]);
}

#[test]
fn test_open_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        StoredDb::open(dir.path().join("nothing.db")),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_all_value_classes_survive_a_round_trip() {
    let table = TableDef::new("t", "CREATE TABLE t(a, b, c, d, e)");
    let rows = vec![
        vec![
            SqlValue::Null,
            SqlValue::Int(-40_000),
            SqlValue::Real(0.1),
            "x".into(),
            SqlValue::Blob(vec![1, 2]),
        ],
        vec![
            SqlValue::Int(1 << 40),
            SqlValue::Real(1e20),
            "".into(),
            SqlValue::Blob(vec![]),
            SqlValue::Int(i64::MIN),
        ],
    ];
    let options = BuildOptions { page_size: 512 };
    let db = build_minimal_database_with(&options, &table, &rows).unwrap();
    let db = StoredDb::from_bytes(db).unwrap();
    let read = db.read_table("t").unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read[0].values, rows[0]);
    assert_eq!(read[1].values, rows[1]);
    assert_eq!(read[0].render(), " | -40000 | 0.1 | 'x' | BLOB(2)");
    assert_eq!(
        read[1].render(),
        "1099511627776 | 1e+20 | '' | BLOB(0) | -9223372036854775808"
    );
}

#[test]
fn test_tables_listing() {
    let db = StoredDb::from_bytes(build_minimal_database(&mytable(), &[]).unwrap()).unwrap();
    let tables = db.tables().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].object_type, "table");
    assert_eq!(tables[0].tbl_name, "mytable");
    assert_eq!(
        tables[0].sql.as_deref(),
        Some("CREATE TABLE mytable(id INTEGER PRIMARY KEY, name TEXT)")
    );
    assert_eq!(db.read_table("mytable").unwrap(), vec![]);
}
