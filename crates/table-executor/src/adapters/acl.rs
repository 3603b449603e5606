//! `SQLite` ACL store over `system_acl`.

use crate::adapters::decode;
use crate::domain::entities::AclEntry;
use crate::domain::errors::ExecutorError;
use crate::domain::privileges::Privileges;
use crate::ports::outbound::Acl;
use rusqlite::{params, Connection, OptionalExtension};
use shared_types::{Address, ChainId, TableId};
use tracing::debug;

/// ACL rows of one chain.
#[derive(Debug, Clone)]
pub struct SqliteAcl {
    chain_id: ChainId,
}

impl SqliteAcl {
    #[must_use]
    pub fn new(chain_id: ChainId) -> Self {
        Self { chain_id }
    }
}

impl Acl for SqliteAcl {
    fn privileges(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<Privileges, ExecutorError> {
        Ok(self
            .entry(conn, table_id, controller)?
            .map_or(Privileges::NONE, |e| e.privileges))
    }

    fn entry(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controller: &Address,
    ) -> Result<Option<AclEntry>, ExecutorError> {
        let row = conn
            .query_row(
                "SELECT privileges, created_at, updated_at FROM system_acl
                 WHERE chain_id = ?1 AND table_id = ?2 AND controller = ?3",
                params![self.chain_id.get(), table_id.to_string(), controller.to_string()],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, Option<i64>>(2)?,
                    ))
                },
            )
            .optional()?;

        row.map(|(bits, created_at, updated_at)| {
            Ok(AclEntry {
                table_id: *table_id,
                controller: *controller,
                privileges: Privileges::from_bits(bits),
                created_at: decode::unsigned(created_at)?,
                updated_at: updated_at.map(decode::unsigned).transpose()?,
            })
        })
        .transpose()
    }

    fn grant(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controllers: &[Address],
        privileges: Privileges,
        height: u64,
    ) -> Result<(), ExecutorError> {
        if privileges.is_empty() {
            return Ok(());
        }
        let mut stmt = conn.prepare_cached(
            "INSERT INTO system_acl (chain_id, table_id, controller, privileges, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (chain_id, table_id, controller)
             DO UPDATE SET privileges = privileges | excluded.privileges, updated_at = excluded.created_at",
        )?;
        for controller in controllers {
            stmt.execute(params![
                self.chain_id.get(),
                table_id.to_string(),
                controller.to_string(),
                privileges.bits(),
                height,
            ])?;
            debug!(%table_id, %controller, %privileges, "granted privileges");
        }
        Ok(())
    }

    fn revoke(
        &self,
        conn: &Connection,
        table_id: &TableId,
        controllers: &[Address],
        privileges: Privileges,
        height: u64,
    ) -> Result<(), ExecutorError> {
        let mut update = conn.prepare_cached(
            "UPDATE system_acl SET privileges = privileges & ~?4, updated_at = ?5
             WHERE chain_id = ?1 AND table_id = ?2 AND controller = ?3",
        )?;
        let mut prune = conn.prepare_cached(
            "DELETE FROM system_acl
             WHERE chain_id = ?1 AND table_id = ?2 AND controller = ?3 AND privileges = 0",
        )?;
        for controller in controllers {
            let key = (self.chain_id.get(), table_id.to_string(), controller.to_string());
            update.execute(params![key.0, key.1, key.2, privileges.bits(), height])?;
            prune.execute(params![key.0, key.1, key.2])?;
            debug!(%table_id, %controller, %privileges, "revoked privileges");
        }
        Ok(())
    }
}
