//! In-memory implementations of the three store traits.
//!
//! Used by the engine and API test suites, and handy for demos. Each store
//! counts its writes and can be told to fail, so tests can observe
//! idempotence and exercise the failure paths without a database.

use std::{
  collections::{HashMap, HashSet},
  io,
  sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
};

use placement_core::{
  Error, Result,
  archive::ArchiveEntry,
  mirror::MirrorProjection,
  record::{DerivedFields, Record},
  store::{ArchiveStore, MirrorStore, PrimaryStore},
};
use uuid::Uuid;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(|e| e.into_inner()) }

fn unavailable(what: &str) -> Error {
  Error::store(io::Error::new(io::ErrorKind::ConnectionRefused, format!("{what} unavailable")))
}

/// Shared fault switch and write counter.
#[derive(Debug, Default)]
struct Faults {
  unavailable: AtomicBool,
  writes:      AtomicUsize,
}

impl Faults {
  fn check(&self, what: &str) -> Result<()> {
    if self.unavailable.load(Ordering::SeqCst) { Err(unavailable(what)) } else { Ok(()) }
  }

  fn wrote(&self) { self.writes.fetch_add(1, Ordering::SeqCst); }
}

// ─── Primary ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryPrimary {
  records:        Mutex<HashMap<Uuid, Record>>,
  failing_derive: Mutex<HashSet<Uuid>>,
  faults:         Faults,
}

impl MemoryPrimary {
  pub fn new() -> Self { Self::default() }

  /// Successful writes so far, derived write-backs included.
  pub fn writes(&self) -> usize { self.faults.writes.load(Ordering::SeqCst) }

  /// Make every operation fail with a store error.
  pub fn set_unavailable(&self, on: bool) { self.faults.unavailable.store(on, Ordering::SeqCst); }

  /// Make derived write-backs for `id` fail while leaving everything else
  /// working.
  pub fn fail_derived_writes_for(&self, id: Uuid) { lock(&self.failing_derive).insert(id); }

  /// Put a record in place directly, bypassing version checks.
  pub fn seed(&self, record: Record) { lock(&self.records).insert(record.id, record); }

  pub fn snapshot(&self, id: Uuid) -> Option<Record> { lock(&self.records).get(&id).cloned() }

  fn guard(records: &HashMap<Uuid, Record>, id: Uuid, expected: u64) -> Result<()> {
    match records.get(&id) {
      None => Err(Error::RecordNotFound(id)),
      Some(r) if r.version != expected => {
        Err(Error::Conflict { id, expected, actual: r.version })
      }
      Some(_) => Ok(()),
    }
  }
}

impl PrimaryStore for MemoryPrimary {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<Record>> {
    self.faults.check("primary store")?;
    Ok(lock(&self.records).get(&id).cloned())
  }

  async fn list(&self) -> Result<Vec<Record>> {
    self.faults.check("primary store")?;
    let mut all: Vec<Record> = lock(&self.records).values().cloned().collect();
    all.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(all)
  }

  async fn insert(&self, record: Record) -> Result<()> {
    self.faults.check("primary store")?;
    let mut records = lock(&self.records);
    if records.contains_key(&record.id) {
      return Err(Error::AlreadyActive(record.id));
    }
    records.insert(record.id, record);
    self.faults.wrote();
    Ok(())
  }

  async fn update(&self, record: Record, expected_version: u64) -> Result<()> {
    self.faults.check("primary store")?;
    let mut records = lock(&self.records);
    Self::guard(&records, record.id, expected_version)?;
    records.insert(record.id, record);
    self.faults.wrote();
    Ok(())
  }

  async fn write_derived(
    &self,
    id: Uuid,
    expected_version: u64,
    derived: DerivedFields,
  ) -> Result<()> {
    self.faults.check("primary store")?;
    if lock(&self.failing_derive).contains(&id) {
      return Err(unavailable("derived write-back"));
    }
    let mut records = lock(&self.records);
    Self::guard(&records, id, expected_version)?;
    let record = records.get_mut(&id).ok_or(Error::RecordNotFound(id))?;
    record.apply_derived(derived);
    self.faults.wrote();
    Ok(())
  }

  async fn delete(&self, id: Uuid, expected_version: u64) -> Result<()> {
    self.faults.check("primary store")?;
    let mut records = lock(&self.records);
    Self::guard(&records, id, expected_version)?;
    records.remove(&id);
    self.faults.wrote();
    Ok(())
  }
}

// ─── Archive ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryArchive {
  entries: Mutex<HashMap<Uuid, ArchiveEntry>>,
  faults:  Faults,
}

impl MemoryArchive {
  pub fn new() -> Self { Self::default() }

  pub fn set_unavailable(&self, on: bool) { self.faults.unavailable.store(on, Ordering::SeqCst); }

  pub fn contains(&self, id: Uuid) -> bool { lock(&self.entries).contains_key(&id) }
}

impl ArchiveStore for MemoryArchive {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<ArchiveEntry>> {
    self.faults.check("archive store")?;
    Ok(lock(&self.entries).get(&id).cloned())
  }

  async fn list(&self) -> Result<Vec<ArchiveEntry>> {
    self.faults.check("archive store")?;
    let mut all: Vec<ArchiveEntry> = lock(&self.entries).values().cloned().collect();
    all.sort_by(|a, b| b.deleted_at.cmp(&a.deleted_at));
    Ok(all)
  }

  async fn put(&self, entry: ArchiveEntry) -> Result<()> {
    self.faults.check("archive store")?;
    lock(&self.entries).insert(entry.id(), entry);
    self.faults.wrote();
    Ok(())
  }

  async fn delete(&self, id: Uuid) -> Result<bool> {
    self.faults.check("archive store")?;
    let removed = lock(&self.entries).remove(&id).is_some();
    if removed {
      self.faults.wrote();
    }
    Ok(removed)
  }
}

// ─── Mirror ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryMirror {
  entries: Mutex<HashMap<Uuid, MirrorProjection>>,
  faults:  Faults,
}

impl MemoryMirror {
  pub fn new() -> Self { Self::default() }

  /// Successful puts and deletes so far.
  pub fn writes(&self) -> usize { self.faults.writes.load(Ordering::SeqCst) }

  pub fn set_unavailable(&self, on: bool) { self.faults.unavailable.store(on, Ordering::SeqCst); }

  pub fn seed(&self, id: Uuid, projection: MirrorProjection) {
    lock(&self.entries).insert(id, projection);
  }

  pub fn snapshot(&self, id: Uuid) -> Option<MirrorProjection> { lock(&self.entries).get(&id).cloned() }

  pub fn len(&self) -> usize { lock(&self.entries).len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl MirrorStore for MemoryMirror {
  type Error = Error;

  async fn get(&self, id: Uuid) -> Result<Option<MirrorProjection>> {
    self.faults.check("mirror store")?;
    Ok(lock(&self.entries).get(&id).cloned())
  }

  async fn list(&self) -> Result<Vec<(Uuid, MirrorProjection)>> {
    self.faults.check("mirror store")?;
    let mut all: Vec<(Uuid, MirrorProjection)> =
      lock(&self.entries).iter().map(|(id, p)| (*id, p.clone())).collect();
    all.sort_by(|a, b| a.1.name.cmp(&b.1.name));
    Ok(all)
  }

  async fn put(&self, id: Uuid, projection: MirrorProjection) -> Result<()> {
    self.faults.check("mirror store")?;
    lock(&self.entries).insert(id, projection);
    self.faults.wrote();
    Ok(())
  }

  async fn delete(&self, id: Uuid) -> Result<bool> {
    self.faults.check("mirror store")?;
    let removed = lock(&self.entries).remove(&id).is_some();
    if removed {
      self.faults.wrote();
    }
    Ok(removed)
  }
}
