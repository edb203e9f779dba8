//! Engine behaviour against the in-memory stores.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use placement_core::{
  Error,
  clock::{Clock, FixedClock},
  error::ErrorKind,
  mirror::MirrorProjection,
  record::{Attribution, ModeOfWork, RecordDraft},
  status::MoaStatus,
};
use uuid::Uuid;

use crate::{
  Engine, EngineConfig, RecordFilter, RetryPolicy,
  memory::{MemoryArchive, MemoryMirror, MemoryPrimary},
  sync_loop::SyncLoop,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> { Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap() }

fn draft(name: &str, start: NaiveDate, years: u32) -> RecordDraft {
  RecordDraft {
    name:               name.into(),
    description:        "Placement partner".into(),
    address:            "1 Main St".into(),
    contact_email:      "hr@partner.test".into(),
    website:            "https://partner.test".into(),
    fields:             vec!["Web".into(), "web".into(), "Data".into()],
    skills_required:    vec!["Rust".into()],
    mode_of_work:       BTreeSet::from([ModeOfWork::Onsite]),
    moa_present:        true,
    moa_validity_years: Some(years),
    moa_start_date:     Some(start),
  }
}

fn admin() -> Option<Attribution> {
  Some(Attribution { username: "coordinator".into(), role: "admin".into() })
}

struct Harness {
  engine:  Arc<Engine<MemoryPrimary, MemoryArchive, MemoryMirror>>,
  primary: Arc<MemoryPrimary>,
  archive: Arc<MemoryArchive>,
  mirror:  Arc<MemoryMirror>,
  clock:   Arc<FixedClock>,
}

/// Engine pinned to 2024-06-01 with millisecond mirror retries.
fn harness() -> Harness {
  let primary = Arc::new(MemoryPrimary::new());
  let archive = Arc::new(MemoryArchive::new());
  let mirror = Arc::new(MemoryMirror::new());
  let clock = Arc::new(FixedClock::on(date(2024, 6, 1)));
  let config = EngineConfig {
    mirror_retry: RetryPolicy {
      max_attempts: 3,
      initial_backoff_ms: 1,
      max_backoff_ms: 4,
      ..Default::default()
    },
    ..Default::default()
  };
  let engine = Arc::new(Engine::new(
    primary.clone(),
    archive.clone(),
    mirror.clone(),
    clock.clone() as Arc<dyn Clock>,
    config,
  ));
  Harness { engine, primary, archive, mirror, clock }
}

/// Poll `check` until it holds, failing the test after five seconds.
async fn eventually(mut check: impl FnMut() -> bool) {
  let reached = tokio::time::timeout(Duration::from_secs(5), async {
    while !check() {
      tokio::time::sleep(Duration::from_millis(5)).await;
    }
  })
  .await;
  assert!(reached.is_ok(), "condition not reached in time");
}

// ─── Create / update ─────────────────────────────────────────────────────────

#[tokio::test]
async fn create_evaluates_and_mirrors() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), admin()).await.unwrap();

  assert_eq!(r.version, 1);
  assert_eq!(r.moa_expiration_date, Some(date(2025, 1, 1)));
  assert_eq!(r.moa_status, MoaStatus::Valid);
  assert!(r.visible_to_mobile);
  assert_eq!(r.fields, vec!["Web".to_string(), "Data".to_string()]);

  h.engine.wait_mirror_idle().await;
  let projection = h.mirror.snapshot(r.id).unwrap();
  assert_eq!(projection, MirrorProjection::from(&r));
  assert!(projection.moa_present);
}

#[tokio::test]
async fn invalid_draft_touches_no_store() {
  let h = harness();
  let mut d = draft("  ", date(2024, 1, 1), 1);
  d.contact_email = "not-an-email".into();

  let err = h.engine.create(d, None).await.unwrap_err();
  let Error::Validation(fields) = err else { panic!("expected a validation error") };
  let names: Vec<&str> = fields.iter().map(|f| f.field).collect();
  assert_eq!(names, vec!["name", "contact_email"]);

  assert_eq!(h.primary.writes(), 0);
  assert!(h.mirror.is_empty());
}

#[tokio::test]
async fn update_is_version_checked() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), admin()).await.unwrap();

  let mut edit = draft("Acme Corp", date(2024, 1, 1), 3);
  edit.moa_start_date = Some(date(2023, 3, 1));
  let updated = h.engine.update(r.id, 1, edit.clone()).await.unwrap();
  assert_eq!(updated.version, 2);
  assert_eq!(updated.name, "Acme Corp");
  assert_eq!(updated.moa_expiration_date, Some(date(2026, 3, 1)));
  assert_eq!(updated.created_at, r.created_at);
  assert_eq!(updated.created_by, r.created_by);

  let err = h.engine.update(r.id, 1, edit).await.unwrap_err();
  assert!(matches!(err, Error::Conflict { expected: 1, actual: 2, .. }));

  h.engine.wait_mirror_idle().await;
  assert_eq!(h.mirror.snapshot(r.id).unwrap().name, "Acme Corp");
}

#[tokio::test]
async fn update_missing_record_is_not_found() {
  let h = harness();
  let err = h
    .engine
    .update(Uuid::new_v4(), 1, draft("Ghost", date(2024, 1, 1), 1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::RecordNotFound(_)));
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_and_summary_counts() {
  let h = harness();
  h.engine.create(draft("Valid", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.create(draft("Soon", date(2023, 6, 15), 1), None).await.unwrap();
  h.engine.create(draft("Lapsed", date(2020, 1, 1), 1), None).await.unwrap();

  let expired = h
    .engine
    .list(&RecordFilter { status: Some(MoaStatus::Expired), visible: None })
    .await
    .unwrap();
  assert_eq!(expired.len(), 1);
  assert_eq!(expired[0].name, "Lapsed");

  let visible = h
    .engine
    .list(&RecordFilter { status: None, visible: Some(true) })
    .await
    .unwrap();
  let names: Vec<&str> = visible.iter().map(|r| r.name.as_str()).collect();
  assert_eq!(names, vec!["Soon", "Valid"]);

  let counts = h.engine.status_summary().await.unwrap();
  assert_eq!((counts.valid, counts.expiring_soon, counts.expired, counts.no_moa), (1, 1, 1, 0));
  assert_eq!(counts.visible(), 2);
}

// ─── Reconciliation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn date_rollover_expires_and_hides() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.wait_mirror_idle().await;

  h.clock.set(at(2025, 1, 2));
  let report = h.engine.reconcile_all().await.unwrap();
  assert_eq!(report.examined, 1);
  assert_eq!(report.derived_written, 1);
  assert_eq!(report.mirror_pushed, 1);
  assert!(report.failed.is_empty());

  let stored = h.primary.snapshot(r.id).unwrap();
  assert_eq!(stored.moa_status, MoaStatus::Expired);
  assert!(!stored.visible_to_mobile);
  assert_eq!(stored.version, 1);

  h.engine.wait_mirror_idle().await;
  assert!(!h.mirror.snapshot(r.id).unwrap().moa_present);
}

#[tokio::test]
async fn second_pass_writes_nothing() {
  let h = harness();
  h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.create(draft("Globex", date(2023, 6, 15), 1), None).await.unwrap();
  h.clock.set(at(2024, 12, 20));

  h.engine.reconcile_all().await.unwrap();
  h.engine.wait_mirror_idle().await;
  let primary_writes = h.primary.writes();
  let mirror_writes = h.mirror.writes();

  let report = h.engine.reconcile_all().await.unwrap();
  h.engine.wait_mirror_idle().await;
  assert_eq!(report.derived_written, 0);
  assert_eq!(report.mirror_pushed, 0);
  assert_eq!(h.primary.writes(), primary_writes);
  assert_eq!(h.mirror.writes(), mirror_writes);
}

#[tokio::test]
async fn reconcile_one_is_idempotent() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.wait_mirror_idle().await;
  h.clock.set(at(2024, 12, 15));

  let stored = h.primary.snapshot(r.id).unwrap();
  let first = h.engine.synchronizer().reconcile_one(&stored).await.unwrap();
  assert_eq!(first.derived.map(|d| d.moa_status), Some(MoaStatus::ExpiringSoon));
  h.engine.wait_mirror_idle().await;
  let primary_writes = h.primary.writes();
  let mirror_writes = h.mirror.writes();

  let stored = h.primary.snapshot(r.id).unwrap();
  assert_eq!(stored.moa_status, MoaStatus::ExpiringSoon);
  assert!(stored.visible_to_mobile);
  let second = h.engine.synchronizer().reconcile_one(&stored).await.unwrap();
  assert!(second.is_noop());

  h.engine.wait_mirror_idle().await;
  assert_eq!(h.primary.writes(), primary_writes);
  assert_eq!(h.mirror.writes(), mirror_writes);
}

#[tokio::test]
async fn outdated_copy_does_not_overwrite_a_newer_edit() {
  let h = harness();
  let original = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let edited = h
    .engine
    .update(original.id, 1, draft("Acme", date(2025, 1, 1), 3))
    .await
    .unwrap();
  assert_eq!(edited.moa_expiration_date, Some(date(2028, 1, 1)));
  h.engine.wait_mirror_idle().await;

  // The original copy would expire on this date; the edited one would not.
  h.clock.set(at(2025, 1, 2));
  let plan = h.engine.synchronizer().reconcile_one(&original).await.unwrap();
  assert!(plan.derived.is_none());

  let stored = h.primary.snapshot(original.id).unwrap();
  assert_eq!(stored.version, 2);
  assert_eq!(stored.moa_start_date, Some(date(2025, 1, 1)));
  assert_eq!(stored.moa_validity_years, Some(3));
  assert_eq!(stored.moa_expiration_date, Some(date(2028, 1, 1)));
  assert_eq!(stored.moa_status, MoaStatus::Valid);
  assert!(stored.visible_to_mobile);

  h.engine.wait_mirror_idle().await;
  let projection = h.mirror.snapshot(original.id).unwrap();
  assert!(projection.moa_present);
  assert_eq!(projection.moa_validity_years, Some(3));
}

#[tokio::test]
async fn outdated_copy_in_sync_does_not_push_its_projection() {
  let h = harness();
  let original = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let edited = h
    .engine
    .update(original.id, 1, draft("Acme Corp", date(2024, 1, 1), 2))
    .await
    .unwrap();
  h.engine.wait_mirror_idle().await;

  // Each copy's derived fields are current; only the projections differ.
  let plan = h.engine.synchronizer().reconcile_one(&original).await.unwrap();
  assert!(plan.is_noop());

  h.engine.wait_mirror_idle().await;
  assert_eq!(h.mirror.snapshot(original.id), Some(MirrorProjection::from(&edited)));
}

#[tokio::test]
async fn failed_write_back_is_isolated() {
  let h = harness();
  let a = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let b = h.engine.create(draft("Globex", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.wait_mirror_idle().await;

  h.primary.fail_derived_writes_for(a.id);
  h.clock.set(at(2025, 2, 1));
  let report = h.engine.reconcile_all().await.unwrap();

  assert_eq!(report.derived_written, 1);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].id, a.id);
  assert_eq!(report.failed[0].kind, ErrorKind::SyncFailure);

  assert_eq!(h.primary.snapshot(b.id).unwrap().moa_status, MoaStatus::Expired);
  // The mirror keeps agreeing with the primary store for the failed record.
  h.engine.wait_mirror_idle().await;
  assert!(h.mirror.snapshot(a.id).unwrap().moa_present);
  assert!(!h.mirror.snapshot(b.id).unwrap().moa_present);
}

#[tokio::test]
async fn orphan_mirror_entries_are_removed() {
  let h = harness();
  let kept = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let orphan = Uuid::new_v4();
  h.mirror.seed(orphan, MirrorProjection {
    name:               "Gone Ltd".into(),
    moa_present:        true,
    moa_validity_years: Some(1),
    updated_at:         at(2023, 1, 1),
  });

  let report = h.engine.reconcile_all().await.unwrap();
  assert_eq!(report.orphans_removed, 1);

  h.engine.wait_mirror_idle().await;
  assert!(h.mirror.snapshot(orphan).is_none());
  assert!(h.mirror.snapshot(kept.id).is_some());
}

// ─── Mirror failures ─────────────────────────────────────────────────────────

#[tokio::test]
async fn mirror_outage_is_absorbed_and_repaired() {
  let h = harness();
  h.mirror.set_unavailable(true);

  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  assert!(h.primary.snapshot(r.id).is_some());

  h.engine.wait_mirror_idle().await;
  let stats = h.engine.mirror_stats();
  assert_eq!(stats.dead_lettered, 1);
  assert_eq!(stats.failed_attempts, 3);
  assert_eq!(stats.pushed, 0);
  let letters = h.engine.dead_letters();
  assert_eq!(letters.len(), 1);
  assert_eq!((letters[0].id, letters[0].op), (r.id, "upsert"));

  h.mirror.set_unavailable(false);
  let report = h.engine.reconcile_all().await.unwrap();
  assert_eq!(report.mirror_pushed, 1);
  h.engine.wait_mirror_idle().await;
  assert_eq!(h.mirror.snapshot(r.id), Some(MirrorProjection::from(&r)));
}

// ─── Archive / restore ───────────────────────────────────────────────────────

#[tokio::test]
async fn archive_moves_record_out_of_primary_and_mirror() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.wait_mirror_idle().await;

  let entry = h.engine.archive(r.id, "admin", Some(1)).await.unwrap();
  assert_eq!(entry.record, r);
  assert_eq!(entry.deleted_by_role, "admin");
  assert_eq!(entry.deleted_at, at(2024, 6, 1));

  assert!(h.primary.snapshot(r.id).is_none());
  assert!(h.archive.contains(r.id));
  h.engine.wait_mirror_idle().await;
  assert!(h.mirror.snapshot(r.id).is_none());

  let err = h.engine.get(r.id).await.unwrap_err();
  assert!(matches!(err, Error::RecordNotFound(_)));
}

#[tokio::test]
async fn archive_with_stale_version_changes_nothing() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();

  let err = h.engine.archive(r.id, "admin", Some(7)).await.unwrap_err();
  assert!(matches!(err, Error::Conflict { expected: 7, actual: 1, .. }));
  assert!(h.primary.snapshot(r.id).is_some());
  assert!(!h.archive.contains(r.id));
}

#[tokio::test]
async fn archive_failure_leaves_record_active() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.archive.set_unavailable(true);

  assert!(h.engine.archive(r.id, "admin", None).await.is_err());
  assert!(h.primary.snapshot(r.id).is_some());
}

#[tokio::test]
async fn restore_recomputes_status_against_today() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.archive(r.id, "admin", None).await.unwrap();
  h.engine.wait_mirror_idle().await;

  h.clock.set(at(2025, 3, 1));
  let restored = h.engine.restore(r.id, "admin").await.unwrap();

  assert_eq!(restored.id, r.id);
  assert_eq!(restored.created_at, r.created_at);
  assert_eq!(restored.version, r.version);
  assert_eq!(restored.moa_status, MoaStatus::Expired);
  assert!(!restored.visible_to_mobile);
  assert_eq!(h.primary.snapshot(r.id).unwrap(), restored);
  assert!(!h.archive.contains(r.id));

  h.engine.wait_mirror_idle().await;
  assert!(!h.mirror.snapshot(r.id).unwrap().moa_present);
}

#[tokio::test]
async fn restore_into_active_id_is_refused() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.archive(r.id, "admin", None).await.unwrap();
  h.primary.seed(r.clone());

  let err = h.engine.restore(r.id, "admin").await.unwrap_err();
  assert!(matches!(err, Error::AlreadyActive(id) if id == r.id));
  assert!(h.archive.contains(r.id));
}

#[tokio::test]
async fn restore_missing_entry_is_not_found() {
  let h = harness();
  let err = h.engine.restore(Uuid::new_v4(), "admin").await.unwrap_err();
  assert!(matches!(err, Error::ArchiveEntryNotFound(_)));
}

#[tokio::test]
async fn bulk_archive_of_five_with_one_missing() {
  let h = harness();
  let mut ids = Vec::new();
  for name in ["Acme", "Globex", "Initech", "Umbrella"] {
    ids.push(h.engine.create(draft(name, date(2024, 1, 1), 1), None).await.unwrap().id);
  }
  let missing = Uuid::new_v4();
  ids.insert(2, missing);
  assert_eq!(ids.len(), 5);

  let report = h.engine.archive_many(&ids, "admin").await;
  assert_eq!(report.succeeded.len(), 4);
  assert!(!report.succeeded.contains(&missing));
  assert_eq!(report.failed.len(), 1);
  assert_eq!((report.failed[0].id, report.failed[0].kind), (missing, ErrorKind::NotFound));
  assert!(report.is_partial());

  for id in ids.iter().copied().filter(|id| *id != missing) {
    assert!(h.primary.snapshot(id).is_none());
    assert!(h.archive.contains(id));
  }
  assert!(h.engine.list(&RecordFilter::default()).await.unwrap().is_empty());

  h.engine.wait_mirror_idle().await;
  assert!(h.mirror.is_empty());
}

#[tokio::test]
async fn bulk_archive_reports_each_id() {
  let h = harness();
  let a = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let b = h.engine.create(draft("Globex", date(2024, 1, 1), 1), None).await.unwrap();
  let missing = Uuid::new_v4();

  let report = h.engine.archive_many(&[a.id, missing, b.id], "admin").await;
  assert_eq!(report.succeeded, vec![a.id, b.id]);
  assert_eq!(report.failed.len(), 1);
  assert_eq!(report.failed[0].id, missing);
  assert_eq!(report.failed[0].kind, ErrorKind::NotFound);
  assert!(report.is_partial());

  let report = h.engine.restore_many(&[a.id, b.id], "admin").await;
  assert_eq!(report.succeeded.len(), 2);
  assert!(!report.is_partial());
}

#[tokio::test]
async fn purge_deletes_archive_entry() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.engine.archive(r.id, "admin", None).await.unwrap();

  assert_eq!(h.engine.list_archived().await.unwrap().len(), 1);
  h.engine.purge(r.id, "admin").await.unwrap();
  assert!(matches!(
    h.engine.get_archived(r.id).await.unwrap_err(),
    Error::ArchiveEntryNotFound(_)
  ));
  assert!(matches!(
    h.engine.purge(r.id, "admin").await.unwrap_err(),
    Error::ArchiveEntryNotFound(_)
  ));
}

// ─── Sync loop ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn sync_loop_runs_a_pass_on_start() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  h.clock.set(at(2025, 1, 2));

  let sync = SyncLoop::spawn(h.engine.clone(), Duration::from_secs(3600));
  eventually(|| h.primary.snapshot(r.id).is_some_and(|s| s.moa_status == MoaStatus::Expired)).await;

  sync.shutdown().await;
  h.engine.wait_mirror_idle().await;
  assert!(!h.mirror.snapshot(r.id).unwrap().moa_present);
}

#[tokio::test]
async fn sync_loop_reconciles_ids_from_the_feed() {
  let h = harness();
  let r = h.engine.create(draft("Acme", date(2024, 1, 1), 1), None).await.unwrap();
  let orphan = Uuid::new_v4();
  h.mirror.seed(orphan, MirrorProjection {
    name:               "Gone Ltd".into(),
    moa_present:        true,
    moa_validity_years: Some(1),
    updated_at:         at(2023, 1, 1),
  });

  let sync = SyncLoop::spawn(h.engine.clone(), Duration::from_secs(3600));
  // The orphan going away marks the end of the start-up pass.
  eventually(|| h.mirror.snapshot(orphan).is_none()).await;

  // A write from outside the engine leaves the derived fields wrong, and
  // the next interval pass is an hour away.
  let mut drifted = h.primary.snapshot(r.id).unwrap();
  drifted.moa_status = MoaStatus::Expired;
  drifted.visible_to_mobile = false;
  h.primary.seed(drifted);

  h.engine.notify_changed(r.id);
  eventually(|| {
    h.primary
      .snapshot(r.id)
      .is_some_and(|s| s.moa_status == MoaStatus::Valid && s.visible_to_mobile)
  })
  .await;

  sync.shutdown().await;
  h.engine.wait_mirror_idle().await;
  assert!(h.mirror.snapshot(r.id).unwrap().moa_present);
}
