//! # Transaction Scope Tests
//!
//! Events applied through a committed block and checked against the
//! database as another connection sees it.
//!
//! ## Test Categories
//!
//! 1. **RunSql** - Multi-statement writes and transaction rollback
//! 2. **ACL** - GRANT/REVOKE statements and events
//! 3. **Policies** - Controller policies, where clauses and `with_check`
//! 4. **Row Limits** - Per-table maximum row count

mod common;

use common::*;
use table_executor::prelude::*;

// =============================================================================
// RUNSQL
// =============================================================================

#[test]
fn test_one_insert() {
    let mut h = Harness::with_table();
    let result = h.run(vec![owner_sql("insert into foo_1337_100 values ('one')")]);

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.table_id, Some(table_id()));
    assert_eq!(h.row_count(), 1);
}

#[test]
fn test_multiple_inserts_in_one_event() {
    let mut h = Harness::with_table();
    let result = h.run(vec![owner_sql(
        "insert into foo_1337_100 values ('one');
         insert into foo_1337_100 values ('two');
         insert into foo_1337_100 values ('three');
         insert into foo_1337_100 values ('four');",
    )]);

    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.row_count(), 4);
}

#[test]
fn test_failed_statement_reverts_whole_event() {
    let mut h = Harness::with_table();
    assert!(h
        .run(vec![owner_sql(
            "insert into foo_1337_100 values ('one'); insert into foo_1337_100 values ('two')"
        )])
        .is_success());

    let result = h.run(vec![owner_sql(
        "insert into foo_1337_100 values ('three'); insert into foo_1337_101 values ('four')",
    )]);

    assert_failed(&result, 0, "query targets table id 101 and not 100");
    assert_eq!(h.row_count(), 2);
}

#[test]
fn test_failed_event_reverts_earlier_events_of_txn() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        owner_sql("insert into foo_1337_100 values ('one')"),
        owner_sql("insert into foo_1337_100 values ('two')"),
        owner_sql("insert into foo_1337_100 values (random())"),
    ]);

    assert_failed(&result, 2, "non-deterministic function random is not allowed");
    assert_eq!(h.row_count(), 0);
}

#[test]
fn test_failed_txn_does_not_affect_other_txns_of_block() {
    let mut h = Harness::with_table();
    let results = h.block(vec![
        txn(vec![owner_sql("insert into foo_1337_100 values ('one')")]),
        txn(vec![owner_sql("insert into foo_1337_100 values ('two', 'extra')")]),
        txn(vec![owner_sql("insert into foo_1337_100 values ('three')")]),
    ]);

    assert!(results[0].is_success());
    assert_eq!(results[1].error_event_index, Some(0));
    let error = results[1].error.as_deref().unwrap();
    assert!(error.starts_with("db query execution failed"), "{error}");
    assert!(results[2].is_success());
    assert_eq!(
        h.column("SELECT zar FROM foo_1337_100 ORDER BY rowid"),
        vec!["one", "three"]
    );
}

#[test]
fn test_abrupt_close_discards_uncommitted_block() {
    let h = Harness::with_table();
    let height = h.next_height();
    {
        let mut scope = h.executor.new_block_scope(height).unwrap();
        let result = scope
            .execute_txn_events(&txn(vec![owner_sql("insert into foo_1337_100 values ('one')")]))
            .unwrap();
        assert!(result.is_success());
        h.executor.close().unwrap();
    }

    assert_eq!(h.row_count(), 0);
    assert_eq!(
        h.executor.new_block_scope(height).err().map(|e| e.to_string()),
        Some(ExecutorError::Closed.to_string())
    );
}

#[test]
fn test_unknown_table() {
    let mut h = Harness::new(ExecutorConfig::new(CHAIN_ID));
    let result = h.run(vec![owner_sql("insert into foo_1337_100 values ('one')")]);
    assert_failed(&result, 0, "table id 100 not found");
}

#[test]
fn test_create_table_twice() {
    let mut h = Harness::with_table();
    let result = h.run(vec![create_table("create table bar_1337 (a int)")]);
    assert_failed(&result, 0, "table id 100 already exists");
}

#[test]
fn test_without_rowid_table_is_rejected() {
    let mut h = Harness::new(ExecutorConfig::new(CHAIN_ID));
    let result = h.run(vec![create_table(
        "create table foo_1337 (zar text primary key) without rowid",
    )]);
    assert_failed(&result, 0, "WITHOUT ROWID is not allowed");

    let scope = h.executor.new_block_scope(h.next_height()).unwrap();
    scope.state_hash().unwrap();
}

#[test]
fn test_clock_functions_fail_event() {
    let mut h = Harness::with_table();
    for (statement, name) in [
        ("insert into foo_1337_100 values (datetime('now'))", "datetime"),
        ("insert into foo_1337_100 values (unixepoch())", "unixepoch"),
        ("insert into foo_1337_100 values (date())", "date"),
        ("insert into foo_1337_100 values (strftime('%s', 'now'))", "strftime"),
    ] {
        let result = h.run(vec![owner_sql(statement)]);
        assert_failed(
            &result,
            0,
            &format!("non-deterministic function {name} is not allowed"),
        );
    }
    assert_eq!(h.row_count(), 0);
}

#[test]
fn test_receipts_are_persisted() {
    let mut h = Harness::with_table();
    let failing = txn(vec![owner_sql("delete from foo_1337_100 where rowid in (select 1)")]);
    let hash = failing.txn_hash;
    h.block(vec![failing]);

    let mut scope = h.executor.new_block_scope(h.next_height()).unwrap();
    assert!(scope.txn_receipt_exists(&hash).unwrap());
    let receipt = scope.txn_receipt(&hash).unwrap().unwrap();
    assert_eq!(receipt.error.as_deref(), Some("sub-queries are not allowed"));
    assert_eq!(receipt.error_event_index, Some(0));
    assert_eq!(receipt.table_id, Some(table_id()));
    scope.close().unwrap();
}

// =============================================================================
// ACL
// =============================================================================

#[test]
fn test_non_owner_without_privileges() {
    let mut h = Harness::with_table();
    let result = h.run(vec![sql_as(
        stranger(),
        "insert into foo_1337_100 values ('one')",
        PolicyData::allow_all(),
    )]);
    assert_failed(&result, 0, "not enough privileges");
}

#[test]
fn test_one_grant() {
    let mut h = Harness::with_table();
    let result = h.run(vec![owner_sql(&format!(
        "grant insert, update on foo_1337_100 to '{}'",
        stranger()
    ))]);
    assert!(result.is_success(), "{result:?}");

    let expected: Privileges = [Privilege::Insert, Privilege::Update].into_iter().collect();
    assert_eq!(h.privileges(&stranger()), expected);

    let insert = h.run(vec![sql_as(
        stranger(),
        "insert into foo_1337_100 values ('one')",
        PolicyData::allow_all(),
    )]);
    assert!(insert.is_success(), "{insert:?}");

    let delete = h.run(vec![sql_as(stranger(), "delete from foo_1337_100", PolicyData::allow_all())]);
    assert_failed(&delete, 0, "not enough privileges");
    assert_eq!(h.row_count(), 1);
}

#[test]
fn test_grant_upsert() {
    let mut h = Harness::with_table();
    let grantee = stranger();
    assert!(h
        .run(vec![owner_sql(&format!("grant insert on foo_1337_100 to '{grantee}'"))])
        .is_success());
    assert!(h
        .run(vec![owner_sql(&format!("grant update on foo_1337_100 to '{grantee}'"))])
        .is_success());

    let expected: Privileges = [Privilege::Insert, Privilege::Update].into_iter().collect();
    assert_eq!(h.privileges(&grantee), expected);
}

#[test]
fn test_grant_revoke() {
    let mut h = Harness::with_table();
    let grantee = stranger();
    let result = h.run(vec![owner_sql(&format!(
        "grant insert, update on foo_1337_100 to '{grantee}';
         revoke insert on foo_1337_100 from '{grantee}'"
    ))]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.privileges(&grantee), Privileges::from(Privilege::Update));

    assert!(h
        .run(vec![owner_sql(&format!("revoke update on foo_1337_100 from '{grantee}'"))])
        .is_success());
    assert!(h.privileges(&grantee).is_empty());
}

#[test]
fn test_non_owner_grant() {
    let mut h = Harness::with_table();
    let result = h.run(vec![sql_as(
        stranger(),
        &format!("grant insert on foo_1337_100 to '{}'", stranger()),
        PolicyData::allow_all(),
    )]);
    assert_failed(&result, 0, "non owner cannot execute grant stmt");
    assert!(h.privileges(&stranger()).is_empty());
}

#[test]
fn test_grant_and_revoke_events() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        Event::Grant {
            table_id: table_id(),
            grantor: owner(),
            grantees: vec![stranger(), controller()],
            privileges: Privileges::ALL,
        },
        Event::Revoke {
            table_id: table_id(),
            grantees: vec![controller()],
            privileges: Privilege::Delete.into(),
        },
    ]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.privileges(&stranger()), Privileges::ALL);
    assert_eq!(
        h.privileges(&controller()),
        [Privilege::Insert, Privilege::Update]
            .into_iter()
            .collect::<Privileges>()
    );
}

// =============================================================================
// POLICIES
// =============================================================================

fn policy() -> PolicyData {
    PolicyData {
        allow_insert: false,
        allow_update: false,
        allow_delete: false,
        ..PolicyData::default()
    }
}

#[test]
fn test_insert_not_allowed_by_policy() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(stranger(), "insert into foo_1337_100 values ('one')", policy()),
    ]);
    assert_failed(&result, 1, "insert is not allowed by policy");
    assert_eq!(h.row_count(), 0);
}

#[test]
fn test_update_not_allowed_by_policy() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(stranger(), "update foo_1337_100 set zar = 'two'", policy()),
    ]);
    assert_failed(&result, 1, "update is not allowed by policy");
}

#[test]
fn test_delete_not_allowed_by_policy() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(stranger(), "delete from foo_1337_100", policy()),
    ]);
    assert_failed(&result, 1, "delete is not allowed by policy");
}

#[test]
fn test_policy_replaces_acl() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one')",
            PolicyData {
                allow_insert: true,
                ..policy()
            },
        ),
    ]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.row_count(), 1);
}

#[test]
fn test_removed_controller_restores_acl() {
    let mut h = Harness::with_table();
    assert!(h.run(vec![set_controller(controller())]).is_success());
    assert!(h.run(vec![set_controller(Address::ZERO)]).is_success());

    let result = h.run(vec![sql_as(
        stranger(),
        "insert into foo_1337_100 values ('one')",
        PolicyData::allow_all(),
    )]);
    assert_failed(&result, 0, "not enough privileges");
}

#[test]
fn test_column_not_allowed_by_policy() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text, zaz int)",
        ExecutorConfig::new(CHAIN_ID),
    );
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "update foo_1337_100 set zar = 'two', zaz = 2",
            PolicyData {
                allow_update: true,
                updatable_columns: vec!["zaz".into()],
                ..policy()
            },
        ),
    ]);
    assert_failed(&result, 1, "column zar is not allowed");
}

#[test]
fn test_update_with_where_policy() {
    let mut h = Harness::with_table();
    assert!(h
        .run(vec![owner_sql(
            "insert into foo_1337_100 values ('one'); insert into foo_1337_100 values ('two')"
        )])
        .is_success());

    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "update foo_1337_100 set zar = 'three'",
            PolicyData {
                allow_update: true,
                where_clause: "zar = 'two'".into(),
                ..policy()
            },
        ),
    ]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(
        h.column("SELECT zar FROM foo_1337_100 ORDER BY rowid"),
        vec!["one", "three"]
    );
}

#[test]
fn test_invalid_policy_fails_event() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one')",
            PolicyData {
                allow_insert: true,
                where_clause: "zar = random()".into(),
                ..policy()
            },
        ),
    ]);
    assert_eq!(result.error_event_index, Some(1));
    assert!(result.error.unwrap().starts_with("invalid policy"));
}

#[test]
fn test_where_policy_does_not_constrain_inserts() {
    let mut h = Harness::with_table();
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one')",
            PolicyData {
                allow_insert: true,
                where_clause: "zar = 'two'".into(),
                ..policy()
            },
        ),
    ]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.row_count(), 1);
}

#[test]
fn test_insert_with_check_violation() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text, zaz int)",
        ExecutorConfig::new(CHAIN_ID),
    );
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one', 1)",
            PolicyData {
                allow_insert: true,
                with_check: "zaz > 1".into(),
                ..policy()
            },
        ),
    ]);
    assert_failed(&result, 1, "number of affected rows 1 does not match auditing count 0");
    assert_eq!(h.row_count(), 0);
}

#[test]
fn test_update_with_check_violation() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text, zaz int)",
        ExecutorConfig::new(CHAIN_ID),
    );
    assert!(h
        .run(vec![owner_sql("insert into foo_1337_100 values ('one', 5)")])
        .is_success());

    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "update foo_1337_100 set zaz = 0",
            PolicyData {
                allow_update: true,
                with_check: "zaz > 1".into(),
                ..policy()
            },
        ),
    ]);
    assert_failed(&result, 1, "number of affected rows 1 does not match auditing count 0");
    assert_eq!(h.column("SELECT CAST(zaz AS TEXT) FROM foo_1337_100"), vec!["5"]);
}

#[test]
fn test_with_check_satisfied() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text, zaz int)",
        ExecutorConfig::new(CHAIN_ID),
    );
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one', 2); insert into foo_1337_100 values ('two', 3)",
            PolicyData {
                allow_insert: true,
                with_check: "zaz > 1".into(),
                ..policy()
            },
        ),
    ]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.row_count(), 2);
}

// =============================================================================
// ROW LIMITS
// =============================================================================

#[test]
fn test_row_count_limit() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text)",
        ExecutorConfig::new(CHAIN_ID).with_max_row_count(10),
    );
    let inserts = (0..10)
        .map(|i| format!("insert into foo_1337_100 values ('{i}')"))
        .collect::<Vec<_>>()
        .join(";");
    assert!(h.run(vec![owner_sql(&inserts)]).is_success());
    assert_eq!(h.row_count(), 10);

    let result = h.run(vec![owner_sql("insert into foo_1337_100 values ('eleven')")]);
    assert_failed(&result, 0, "table maximum row count exceeded (before 10, after 11)");
    assert_eq!(h.row_count(), 10);
}

#[test]
fn test_row_count_override() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text)",
        ExecutorConfig::new(CHAIN_ID)
            .with_max_row_count(1)
            .with_row_count_override(table_id(), 0),
    );
    let result = h.run(vec![owner_sql(
        "insert into foo_1337_100 values ('one'); insert into foo_1337_100 values ('two')",
    )]);
    assert!(result.is_success(), "{result:?}");
    assert_eq!(h.row_count(), 2);
}

#[test]
fn test_row_count_limit_with_check() {
    let mut h = Harness::with_table_config(
        "create table foo_1337 (zar text, zaz int)",
        ExecutorConfig::new(CHAIN_ID).with_max_row_count(2),
    );
    let result = h.run(vec![
        set_controller(controller()),
        sql_as(
            stranger(),
            "insert into foo_1337_100 values ('one', 2), ('two', 3), ('three', 4)",
            PolicyData {
                allow_insert: true,
                with_check: "zaz > 1".into(),
                ..policy()
            },
        ),
    ]);
    assert_failed(&result, 1, "table maximum row count exceeded (before 0, after 3)");
    assert_eq!(h.row_count(), 0);
}
