//! Session pool
//!
//! Pooled sessions serve one transaction at a time and go back to the idle
//! list when the handle is dropped. The pool grows on demand up to
//! `max_sessions` and never shrinks until it is closed.

use crate::error::{Result, Status};
use crate::rpc::Backend;
use crate::types::{DatabasePath, SessionId};
use parking_lot::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct PoolInner {
    idle: Vec<SessionId>,
    all: Vec<SessionId>,
    closed: bool,
}

/// Bounded pool of single-use-at-a-time sessions
pub struct SessionPool {
    database: DatabasePath,
    max_sessions: usize,
    inner: Mutex<PoolInner>,
}

impl SessionPool {
    /// Create a pool and eagerly open `min_sessions` sessions
    pub fn new(
        backend: &dyn Backend,
        database: DatabasePath,
        min_sessions: usize,
        max_sessions: usize,
    ) -> Result<Self> {
        if max_sessions == 0 || min_sessions > max_sessions {
            return Err(Status::invalid_argument(format!(
                "invalid session pool bounds: min {} max {}",
                min_sessions, max_sessions
            )));
        }
        let pool = Self {
            database,
            max_sessions,
            inner: Mutex::new(PoolInner::default()),
        };
        for _ in 0..min_sessions {
            let id = backend.create_session(&pool.database, false)?;
            let mut inner = pool.inner.lock();
            inner.all.push(id.clone());
            inner.idle.push(id);
        }
        Ok(pool)
    }

    /// Check out a session, creating one if none is idle
    pub fn take<'a>(&'a self, backend: &dyn Backend) -> Result<PooledSession<'a>> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(Status::failed_precondition("session pool is closed"));
        }
        if let Some(id) = inner.idle.pop() {
            return Ok(PooledSession { pool: self, id });
        }
        if inner.all.len() >= self.max_sessions {
            return Err(Status::unavailable(format!(
                "session pool exhausted ({} sessions in use)",
                inner.all.len()
            )));
        }
        let id = backend.create_session(&self.database, false)?;
        debug!(session = %id, total = inner.all.len() + 1, "pool grew");
        inner.all.push(id.clone());
        Ok(PooledSession { pool: self, id })
    }

    /// Total sessions owned by the pool
    pub fn len(&self) -> usize {
        self.inner.lock().all.len()
    }

    /// Whether the pool owns no sessions
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delete every session the pool created
    ///
    /// Returns the first deletion error after attempting all of them.
    pub fn close(&self, backend: &dyn Backend) -> Result<()> {
        let sessions = {
            let mut inner = self.inner.lock();
            inner.closed = true;
            inner.idle.clear();
            std::mem::take(&mut inner.all)
        };
        let mut first_err = None;
        for id in sessions {
            if let Err(e) = backend.delete_session(&id) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn give_back(&self, id: SessionId) {
        let mut inner = self.inner.lock();
        if !inner.closed {
            inner.idle.push(id);
        }
    }
}

/// A checked-out pooled session, returned to the pool on drop
pub struct PooledSession<'a> {
    pool: &'a SessionPool,
    id: SessionId,
}

impl PooledSession<'_> {
    /// Session name
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        self.pool.give_back(self.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmulatorConfig;
    use crate::error::Code;
    use crate::rpc::AdminBackend;
    use crate::server::Emulator;
    use crate::store::{InstanceMeta, Store};
    use crate::types::InstancePath;
    use tempfile::TempDir;

    fn emulator(dir: &TempDir) -> (Emulator, DatabasePath) {
        let emu = Emulator::with_config(
            Store::open(dir.path()).unwrap(),
            EmulatorConfig::default(),
        );
        let instance = InstancePath::new("p", "i");
        emu.create_instance(
            &instance,
            InstanceMeta {
                config: "emulator-config".into(),
                display_name: "Test Instance".into(),
                node_count: 1,
            },
        )
        .unwrap()
        .wait()
        .unwrap();
        let db = emu
            .create_database(&instance, "CREATE DATABASE `d`", &[])
            .unwrap()
            .wait()
            .unwrap();
        (emu, db)
    }

    #[test]
    fn test_min_sessions_opened_eagerly() {
        let dir = TempDir::new().unwrap();
        let (emu, db) = emulator(&dir);
        let pool = SessionPool::new(&emu, db, 2, 4).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(emu.session_count(), 2);
    }

    #[test]
    fn test_invalid_bounds() {
        let dir = TempDir::new().unwrap();
        let (emu, db) = emulator(&dir);
        let err = SessionPool::new(&emu, db.clone(), 3, 2).err().unwrap();
        assert_eq!(err.code, Code::InvalidArgument);
        assert!(SessionPool::new(&emu, db, 0, 0).is_err());
    }

    #[test]
    fn test_grows_to_max_then_exhausts() {
        let dir = TempDir::new().unwrap();
        let (emu, db) = emulator(&dir);
        let pool = SessionPool::new(&emu, db, 0, 2).unwrap();
        assert!(pool.is_empty());

        let a = pool.take(&emu).unwrap();
        let b = pool.take(&emu).unwrap();
        assert_ne!(a.id(), b.id());
        let err = pool.take(&emu).err().unwrap();
        assert_eq!(err.code, Code::Unavailable);

        let returned = a.id().clone();
        drop(a);
        assert_eq!(pool.take(&emu).unwrap().id(), &returned);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_close_deletes_sessions() {
        let dir = TempDir::new().unwrap();
        let (emu, db) = emulator(&dir);
        let pool = SessionPool::new(&emu, db, 1, 3).unwrap();
        drop(pool.take(&emu).unwrap());
        pool.close(&emu).unwrap();
        assert_eq!(emu.session_count(), 0);
        let err = pool.take(&emu).err().unwrap();
        assert_eq!(err.code, Code::FailedPrecondition);
    }
}
