//! Deterministic digest of a chain's database state.
//!
//! Sections are hashed in a fixed order: registry (by table id), controllers
//! (by table id), ACL (by table id, controller), then every registered user
//! table's rows in rowid order. Values carry a type tag so that `1`, `'1'`
//! and `x'31'` hash differently.

use crate::adapters::decode;
use crate::domain::entities::StateHash;
use crate::domain::errors::ExecutorError;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use shared_types::{ChainId, TableId};

pub(crate) fn compute(conn: &Connection, chain_id: ChainId) -> Result<StateHash, ExecutorError> {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.get().to_be_bytes());

    let mut tables: Vec<(TableId, String, String, String, i64)> = Vec::new();
    {
        let mut stmt = conn.prepare(
            "SELECT id, controller, prefix, structure, created_at FROM registry WHERE chain_id = ?1",
        )?;
        let rows = stmt.query_map(params![chain_id.get()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;
        for row in rows {
            let (id, owner, prefix, structure, created_at) = row?;
            tables.push((decode::table_id(&id)?, owner, prefix, structure, created_at));
        }
    }
    tables.sort_by(|a, b| a.0.cmp(&b.0));

    section(&mut hasher, b"registry");
    for (id, owner, prefix, structure, created_at) in &tables {
        text(&mut hasher, &id.to_string());
        text(&mut hasher, owner);
        text(&mut hasher, prefix);
        text(&mut hasher, structure);
        hasher.update(created_at.to_be_bytes());
    }

    section(&mut hasher, b"controllers");
    let mut controllers = keyed_rows(
        conn,
        "SELECT table_id, controller FROM system_controller WHERE chain_id = ?1",
        chain_id,
    )?;
    controllers.sort();
    for (table_id, rest) in &controllers {
        text(&mut hasher, &table_id.to_string());
        text(&mut hasher, rest);
    }

    section(&mut hasher, b"acl");
    let mut acl = keyed_rows(
        conn,
        "SELECT table_id, controller || ':' || privileges FROM system_acl WHERE chain_id = ?1",
        chain_id,
    )?;
    acl.sort();
    for (table_id, rest) in &acl {
        text(&mut hasher, &table_id.to_string());
        text(&mut hasher, rest);
    }

    for (id, _, prefix, _, _) in &tables {
        let name = format!("{prefix}_{chain_id}_{id}");
        section(&mut hasher, name.as_bytes());
        let mut stmt = conn.prepare(&format!("SELECT * FROM {name} ORDER BY rowid"))?;
        let columns = stmt.column_count();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for i in 0..columns {
                value(&mut hasher, row.get_ref(i)?);
            }
        }
    }

    Ok(StateHash(hasher.finalize().into()))
}

fn keyed_rows(
    conn: &Connection,
    sql: &str,
    chain_id: ChainId,
) -> Result<Vec<(TableId, String)>, ExecutorError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![chain_id.get()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (table_id, rest) = row?;
        out.push((decode::table_id(&table_id)?, rest));
    }
    Ok(out)
}

fn section(hasher: &mut Sha256, name: &[u8]) {
    hasher.update([0xff]);
    hasher.update((name.len() as u64).to_be_bytes());
    hasher.update(name);
}

fn text(hasher: &mut Sha256, s: &str) {
    hasher.update((s.len() as u64).to_be_bytes());
    hasher.update(s.as_bytes());
}

fn value(hasher: &mut Sha256, value: ValueRef<'_>) {
    match value {
        ValueRef::Null => hasher.update([0u8]),
        ValueRef::Integer(i) => {
            hasher.update([1u8]);
            hasher.update(i.to_be_bytes());
        }
        ValueRef::Real(f) => {
            hasher.update([2u8]);
            hasher.update(f.to_bits().to_be_bytes());
        }
        ValueRef::Text(t) => {
            hasher.update([3u8]);
            hasher.update((t.len() as u64).to_be_bytes());
            hasher.update(t);
        }
        ValueRef::Blob(b) => {
            hasher.update([4u8]);
            hasher.update((b.len() as u64).to_be_bytes());
            hasher.update(b);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::schema;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::install(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO registry VALUES ('100', 1337, '0x0000000000000000000000000000000000000001', 'foo', 's', 1);
             CREATE TABLE foo_1337_100 (zar TEXT);",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_hash_changes_with_user_rows() {
        let conn = setup();
        let empty = compute(&conn, ChainId(1337)).unwrap();
        assert_eq!(empty, compute(&conn, ChainId(1337)).unwrap());

        conn.execute("INSERT INTO foo_1337_100 VALUES ('one')", []).unwrap();
        let one = compute(&conn, ChainId(1337)).unwrap();
        assert_ne!(empty, one);
    }

    #[test]
    fn test_value_types_are_distinguished() {
        let conn = setup();
        conn.execute("INSERT INTO foo_1337_100 VALUES (1)", []).unwrap();
        let integer = compute(&conn, ChainId(1337)).unwrap();
        conn.execute("UPDATE foo_1337_100 SET zar = CAST('1' AS BLOB)", []).unwrap();
        let blob = compute(&conn, ChainId(1337)).unwrap();
        assert_ne!(integer, blob);
    }

    #[test]
    fn test_other_chains_are_ignored() {
        let conn = setup();
        let before = compute(&conn, ChainId(1337)).unwrap();
        conn.execute(
            "INSERT INTO system_controller VALUES (1, '100', '0x0000000000000000000000000000000000000002')",
            [],
        )
        .unwrap();
        assert_eq!(before, compute(&conn, ChainId(1337)).unwrap());
    }
}
