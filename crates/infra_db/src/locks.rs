//! Advisory locks for serialized critical sections
//!
//! Sequential number allocation and per-target billing runs serialize on
//! PostgreSQL transaction-scoped advisory locks. Lock keys are string names
//! (e.g. `CXC-2026`, a company id) hashed to the 64-bit key space that
//! `pg_advisory_xact_lock` expects; the lock releases automatically at
//! commit or rollback.

use sqlx::{PgConnection, Postgres, Transaction};

use core_kernel::PortError;

use crate::error::sqlx_to_port;

/// FNV-1a 64-bit hash of a lock name
///
/// Stable across processes, which is all an advisory lock key needs.
pub fn lock_key(name: &str) -> i64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in name.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash as i64
}

/// Takes a transaction-scoped advisory lock on a named resource
pub async fn advisory_lock(
    tx: &mut Transaction<'_, Postgres>,
    name: &str,
) -> Result<(), PortError> {
    let conn: &mut PgConnection = &mut *tx;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(lock_key(name))
        .execute(conn)
        .await
        .map_err(sqlx_to_port)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable() {
        assert_eq!(lock_key("CXC-2026"), lock_key("CXC-2026"));
        assert_ne!(lock_key("CXC-2026"), lock_key("CXC-2027"));
        assert_ne!(lock_key("CXC-2026"), lock_key("CXP-2026"));
    }

    #[test]
    fn test_lock_key_of_empty_name() {
        // FNV-1a offset basis reinterpreted as i64
        assert_eq!(lock_key(""), 0xcbf2_9ce4_8422_2325_u64 as i64);
    }
}
