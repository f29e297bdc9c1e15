use std::collections::HashSet;

use tarndb::Database;

fn setup(statements: &[&str]) -> Database {
    let db = Database::new();
    for statement in statements {
        let response = db.process_query(statement);
        assert!(
            response.starts_with("OK "),
            "setup statement '{}' failed: {}",
            statement,
            response
        );
    }
    db
}

/// Compare a serialized result against expected data rows, ignoring row
/// order (group-by partitions come back in unspecified order).
fn assert_rows_unordered(response: &str, header: &[&str], rows: &[&str]) {
    let lines: Vec<&str> = response.lines().collect();
    assert_eq!(&lines[..2], header, "header mismatch in: {}", response);
    let actual: HashSet<&str> = lines[2..].iter().copied().collect();
    let expected: HashSet<&str> = rows.iter().copied().collect();
    assert_eq!(actual, expected, "rows mismatch in: {}", response);
}

#[test]
fn create_and_duplicate_table() {
    let db = Database::new();
    assert_eq!(
        db.process_query("CREATE TABLE users (id INT, name STRING);"),
        "OK Table users created"
    );
    let response = db.process_query("CREATE TABLE users (id INT);");
    assert!(response.starts_with("ERROR "), "{}", response);
    assert!(response.contains("already exists"), "{}", response);
}

#[test]
fn keywords_are_case_insensitive() {
    let db = Database::new();
    assert_eq!(
        db.process_query("cReaTE table tabel123 (id iNt);"),
        "OK Table tabel123 created"
    );
    assert!(db
        .process_query("select id from tabel123;")
        .starts_with("id,"));
}

#[test]
fn drop_table() {
    let db = setup(&["CREATE TABLE users (id INT);"]);
    assert_eq!(db.process_query("DROP TABLE users;"), "OK Table users dropped");
    let response = db.process_query("DROP TABLE users;");
    assert!(response.contains("does not exist"), "{}", response);
}

#[test]
fn reserved_column_names_are_rejected() {
    let db = Database::new();
    let response = db.process_query("CREATE TABLE bad (select INT);");
    assert!(response.contains("reserved keyword"), "{}", response);
}

#[test]
fn insert_and_select() {
    let db = setup(&[
        "CREATE TABLE t (a INT, b STRING);",
        "INSERT INTO t (a, b) VALUES (1, \"x\");",
        "INSERT INTO t VALUES (2, \"y\");",
    ]);
    assert_eq!(
        db.process_query("SELECT a, b FROM t;"),
        "a,b,\nINT,STRING,\n1,x,\n2,y,\n"
    );
    assert_eq!(
        db.process_query("SELECT * FROM t;"),
        "a,b,\nINT,STRING,\n1,x,\n2,y,\n"
    );
}

#[test]
fn insert_count_mismatch_and_bad_literal() {
    let db = setup(&["CREATE TABLE t (a INT, b STRING);"]);
    let response = db.process_query("INSERT INTO t VALUES (1);");
    assert!(response.contains("column count mismatch"), "{}", response);
    let response = db.process_query("INSERT INTO t (a) VALUES (1, 2);");
    assert!(response.contains("column count mismatch"), "{}", response);
    let response = db.process_query("INSERT INTO t VALUES (\"abc\", \"x\");");
    assert!(response.contains("invalid conversion"), "{}", response);
    let response = db.process_query("INSERT INTO missing VALUES (1);");
    assert!(response.contains("does not exist"), "{}", response);
}

#[test]
fn null_arithmetic() {
    let db = setup(&[
        "CREATE TABLE t (a INT, b STRING);",
        "INSERT INTO t (a) VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT a + b FROM t WHERE a = 3;"),
        "a + b,\nSTRING,\n\\x,\n"
    );
}

#[test]
fn aggregate_with_group_by() {
    let db = setup(&[
        "CREATE TABLE s (k STRING, v INT);",
        "INSERT INTO s VALUES (\"a\", 1);",
        "INSERT INTO s VALUES (\"a\", 2);",
        "INSERT INTO s VALUES (\"b\", 5);",
    ]);
    assert_rows_unordered(
        &db.process_query("SELECT k, SUM(v) FROM s GROUP BY k;"),
        &["k,SUM(v),", "STRING,INT,"],
        &["a,3,", "b,5,"],
    );
}

#[test]
fn having_filters_partitions() {
    let db = setup(&[
        "CREATE TABLE s (k STRING, v INT);",
        "INSERT INTO s VALUES (\"a\", 1);",
        "INSERT INTO s VALUES (\"a\", 2);",
        "INSERT INTO s VALUES (\"b\", 5);",
    ]);
    assert_eq!(
        db.process_query("SELECT k, SUM(v) FROM s GROUP BY k HAVING SUM(v) > 3;"),
        "k,SUM(v),\nSTRING,INT,\nb,5,\n"
    );
    // All partitions filtered out: the projected header survives with zero
    // rows; aggregates over the empty input infer the null type.
    assert_eq!(
        db.process_query("SELECT k, SUM(v) FROM s GROUP BY k HAVING SUM(v) > 100;"),
        "k,SUM(v),\nSTRING,NULL,\n"
    );
    let response =
        db.process_query("SELECT k, SUM(v) FROM s GROUP BY k HAVING v > 1;");
    assert!(response.contains("non-aggregate"), "{}", response);
}

#[test]
fn correlated_exists_subquery() {
    let db = setup(&[
        "CREATE TABLE p (id INT);",
        "CREATE TABLE q (id INT, p_id INT);",
        "INSERT INTO p VALUES (1);",
        "INSERT INTO p VALUES (2);",
        "INSERT INTO q VALUES (10, 1);",
    ]);
    assert_eq!(
        db.process_query(
            "SELECT id FROM p WHERE EXISTS (SELECT id FROM q WHERE q.p_id = p.id);"
        ),
        "id,\nINT,\n1,\n"
    );
}

#[test]
fn like_and_distinct() {
    let db = setup(&[
        "CREATE TABLE w (s STRING);",
        "INSERT INTO w VALUES (\"abc\");",
        "INSERT INTO w VALUES (\"axc\");",
        "INSERT INTO w VALUES (\"ac\");",
        "INSERT INTO w VALUES (\"abc\");",
    ]);
    assert_eq!(
        db.process_query("SELECT DISTINCT s FROM w WHERE s LIKE \"a_c\";"),
        "s,\nSTRING,\nabc,\naxc,\n"
    );
}

#[test]
fn aggregates_on_an_empty_table() {
    let db = setup(&["CREATE TABLE e (x INT);"]);
    assert_eq!(
        db.process_query("SELECT COUNT(*) FROM e;"),
        "COUNT(*),\nINT,\n0,\n"
    );
    assert_eq!(
        db.process_query("SELECT SUM(x) FROM e;"),
        "SUM(x),\nNULL,\n\\x,\n"
    );
    assert_eq!(
        db.process_query("SELECT MAX(x) FROM e;"),
        "MAX(x),\nNULL,\n\\x,\n"
    );
}

#[test]
fn aggregate_functions() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (5);",
    ]);
    assert_eq!(
        db.process_query("SELECT COUNT(x), SUM(x), MIN(x), MAX(x), AVG(x) FROM n;"),
        "COUNT(x),SUM(x),MIN(x),MAX(x),AVG(x),\nINT,INT,INT,INT,INT,\n4,10,1,5,2,\n"
    );
    assert_eq!(
        db.process_query("SELECT COUNT(DISTINCT x) FROM n;"),
        "COUNT(DISTINCT x),\nINT,\n3,\n"
    );
    assert_eq!(
        db.process_query("SELECT SUM(DISTINCT x) FROM n;"),
        "SUM(DISTINCT x),\nINT,\n8,\n"
    );
}

#[test]
fn count_ignores_nulls() {
    let db = setup(&[
        "CREATE TABLE t (a INT, b STRING);",
        "INSERT INTO t (a) VALUES (1);",
        "INSERT INTO t VALUES (2, \"x\");",
    ]);
    assert_eq!(
        db.process_query("SELECT COUNT(b) FROM t;"),
        "COUNT(b),\nINT,\n1,\n"
    );
    assert_eq!(
        db.process_query("SELECT COUNT(*) FROM t;"),
        "COUNT(*),\nINT,\n2,\n"
    );
}

#[test]
fn between_is_inclusive() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x BETWEEN 1 AND 2;"),
        "x,\nINT,\n1,\n2,\n"
    );
}

#[test]
fn in_literal_list() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x IN (1, 3);"),
        "x,\nINT,\n1,\n3,\n"
    );
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE NOT x IN (1, 3);"),
        "x,\nINT,\n2,\n"
    );
}

#[test]
fn in_subquery_membership() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "CREATE TABLE m (y INT);",
        "INSERT INTO m VALUES (2);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x IN (SELECT y FROM m);"),
        "x,\nINT,\n2,\n"
    );
}

#[test]
fn comparison_with_subquery() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
        "CREATE TABLE m (y INT);",
        "INSERT INTO m VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x = (SELECT MAX(y) FROM m);"),
        "x,\nINT,\n3,\n"
    );
}

#[test]
fn any_and_all_over_empty_subquery() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "CREATE TABLE e (y INT);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x > ANY (SELECT y FROM e);"),
        "x,\nINT,\n"
    );
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x > ALL (SELECT y FROM e);"),
        "x,\nINT,\n1,\n2,\n"
    );
}

#[test]
fn any_and_all_comparisons() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
        "CREATE TABLE m (y INT);",
        "INSERT INTO m VALUES (2);",
        "INSERT INTO m VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x >= ALL (SELECT y FROM m);"),
        "x,\nINT,\n3,\n"
    );
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x >= ANY (SELECT y FROM m);"),
        "x,\nINT,\n2,\n3,\n"
    );
}

#[test]
fn is_null_predicates() {
    let db = setup(&[
        "CREATE TABLE t (a INT, b STRING);",
        "INSERT INTO t (a) VALUES (1);",
        "INSERT INTO t VALUES (2, \"x\");",
    ]);
    assert_eq!(
        db.process_query("SELECT a FROM t WHERE b IS NULL;"),
        "a,\nINT,\n1,\n"
    );
    assert_eq!(
        db.process_query("SELECT a FROM t WHERE b IS NOT NULL;"),
        "a,\nINT,\n2,\n"
    );
    // Null never satisfies equality, not even against null.
    assert_eq!(
        db.process_query("SELECT a FROM t WHERE b = NULL;"),
        "a,\nINT,\n"
    );
}

#[test]
fn boolean_connectives() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x = 1 OR x = 3;"),
        "x,\nINT,\n1,\n3,\n"
    );
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE x > 1 AND x < 3;"),
        "x,\nINT,\n2,\n"
    );
    assert_eq!(
        db.process_query("SELECT x FROM n WHERE NOT x = 2;"),
        "x,\nINT,\n1,\n3,\n"
    );
}

#[test]
fn cross_product_and_qualified_names() {
    let db = setup(&[
        "CREATE TABLE j1 (c INT);",
        "CREATE TABLE j2 (c INT);",
        "INSERT INTO j1 VALUES (1);",
        "INSERT INTO j1 VALUES (2);",
        "INSERT INTO j2 VALUES (10);",
    ]);
    let response = db.process_query("SELECT c FROM j1, j2;");
    assert!(response.contains("ambiguous"), "{}", response);

    assert_eq!(
        db.process_query("SELECT j1.c FROM j1, j2;"),
        "j1.c,\nINT,\n1,\n2,\n"
    );
    assert_eq!(
        db.process_query("SELECT a.c, b.c FROM j1 a, j2 b;"),
        "a.c,b.c,\nINT,INT,\n1,10,\n2,10,\n"
    );
}

#[test]
fn division_by_zero_is_reported() {
    let db = setup(&["CREATE TABLE n (x INT);", "INSERT INTO n VALUES (1);"]);
    let response = db.process_query("SELECT x / 0 FROM n;");
    assert!(response.starts_with("ERROR "), "{}", response);
    assert!(response.contains("division by zero"), "{}", response);
}

#[test]
fn delete_removes_matching_rows() {
    let db = setup(&[
        "CREATE TABLE n (x INT);",
        "INSERT INTO n VALUES (1);",
        "INSERT INTO n VALUES (2);",
        "INSERT INTO n VALUES (3);",
    ]);
    assert_eq!(
        db.process_query("DELETE FROM n WHERE x = 2;"),
        "OK Rows deleted"
    );
    assert_eq!(db.process_query("SELECT x FROM n;"), "x,\nINT,\n1,\n3,\n");

    assert_eq!(
        db.process_query("DELETE FROM n WHERE x > 0;"),
        "OK Rows deleted"
    );
    assert_eq!(db.process_query("SELECT x FROM n;"), "x,\nINT,\n");
}

#[test]
fn projection_expressions() {
    let db = setup(&[
        "CREATE TABLE n (x INT, y FLOAT);",
        "INSERT INTO n VALUES (3, 0.5);",
    ]);
    assert_eq!(
        db.process_query("SELECT x + 1, x * y FROM n;"),
        "x + 1,x * y,\nINT,FLOAT,\n4,1.5,\n"
    );
    assert_eq!(
        db.process_query("SELECT x + 1 - 1 FROM n;"),
        "x + 1 - 1,\nINT,\n3,\n"
    );
}

#[test]
fn unknown_column_is_reported() {
    let db = setup(&["CREATE TABLE n (x INT);"]);
    let response = db.process_query("SELECT missing FROM n;");
    assert!(response.contains("unknown column"), "{}", response);
}

#[test]
fn group_by_unknown_column_is_reported() {
    let db = setup(&["CREATE TABLE n (x INT);", "INSERT INTO n VALUES (1);"]);
    let response = db.process_query("SELECT x FROM n GROUP BY missing;");
    assert!(response.contains("unknown column"), "{}", response);
}

#[test]
fn garbage_statements_are_errors() {
    let db = Database::new();
    assert!(db.process_query("FLY TO THE MOON;").starts_with("ERROR "));
    assert!(db.process_query("SELECT").starts_with("ERROR "));
    assert!(db
        .process_query("SELECT 'unterminated FROM t;")
        .starts_with("ERROR "));
}
