use notary_core::db::{open_db, open_db_in_memory};
use notary_core::{
    provision_registry, AdminPolicy, ContentDigest, DocumentId, DocumentNotarized, Identity,
    ManualClock, NotarizationObserver, RegistryError, RegistryService,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn identity(value: &str) -> Identity {
    Identity::parse(value).unwrap()
}

#[derive(Default)]
struct Counter {
    seen: AtomicUsize,
}

impl NotarizationObserver for Counter {
    fn on_document_notarized(&self, _event: &DocumentNotarized) {
        self.seen.fetch_add(1, Ordering::SeqCst);
    }
}

fn provision_with_org(conn: &rusqlite::Connection, clock: &ManualClock) {
    provision_registry(conn, &identity("owner"), AdminPolicy::Exclusive, clock).unwrap();
    let service = RegistryService::with_clock(conn, clock);
    service
        .register_org(&identity("owner"), &identity("org-a"))
        .unwrap();
    service
        .add_org_admin(&identity("org-a"), &identity("org-a"), &identity("a1"))
        .unwrap();
}

#[test]
fn failed_index_write_rolls_back_the_binding_and_emits_nothing() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::starting_at(10_000);
    provision_with_org(&conn, &clock);
    conn.execute_batch(
        "CREATE TEMP TRIGGER fail_content_index
         BEFORE INSERT ON content_index
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let counter = Arc::new(Counter::default());
    let mut service = RegistryService::with_clock(&conn, &clock);
    service.subscribe(counter.clone());
    let id = DocumentId::parse("doc-1").unwrap();
    let digest = ContentDigest::sha256(b"payload");

    let err = service
        .store_document_hash(&identity("a1"), &id, &digest)
        .unwrap_err();
    assert!(matches!(err, RegistryError::Db(_)));
    assert_eq!(err.code(), "storage_error");
    assert_eq!(service.get_binding(&id).unwrap(), None);
    assert_eq!(service.get_content_timestamp(&digest).unwrap(), None);
    assert_eq!(counter.seen.load(Ordering::SeqCst), 0);

    conn.execute_batch("DROP TRIGGER temp.fail_content_index;")
        .unwrap();
    service
        .store_document_hash(&identity("a1"), &id, &digest)
        .unwrap();
    assert_eq!(counter.seen.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_home_org_write_rolls_back_admin_membership() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::starting_at(10_000);
    provision_with_org(&conn, &clock);
    conn.execute_batch(
        "CREATE TEMP TRIGGER fail_admin_index
         BEFORE INSERT ON admin_index
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let service = RegistryService::with_clock(&conn, &clock);
    let err = service
        .add_org_admin(&identity("a1"), &identity("org-a"), &identity("a2"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Db(_)));

    assert_eq!(service.admin_org(&identity("a2")).unwrap(), None);
    let admins = service.list_org_admins(&identity("org-a")).unwrap();
    assert!(admins.iter().all(|row| row.admin.as_str() != "a2"));
}

#[test]
fn failed_org_registration_leaves_no_partial_org() {
    let conn = open_db_in_memory().unwrap();
    let clock = ManualClock::starting_at(10_000);
    provision_with_org(&conn, &clock);
    conn.execute_batch(
        "CREATE TEMP TRIGGER fail_org_admins
         BEFORE INSERT ON org_admins
         BEGIN
             SELECT RAISE(ABORT, 'injected failure');
         END;",
    )
    .unwrap();

    let service = RegistryService::with_clock(&conn, &clock);
    let err = service
        .register_org(&identity("owner"), &identity("org-b"))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Db(_)));
    assert_eq!(service.list_organizations().unwrap(), vec![identity("org-a")]);
}

#[test]
fn concurrent_submissions_for_one_id_bind_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    {
        let conn = open_db(&path).unwrap();
        provision_with_org(&conn, &ManualClock::starting_at(10_000));
    }

    let results = std::thread::scope(|scope| {
        let handles = (0..6)
            .map(|_| {
                let path = path.clone();
                scope.spawn(move || {
                    let conn = open_db(&path).unwrap();
                    let service = RegistryService::new(&conn);
                    service.store_document_hash(
                        &identity("a1"),
                        &DocumentId::parse("contested").unwrap(),
                        &ContentDigest::sha256(b"contested"),
                    )
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    let successes = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(results.iter().filter_map(|result| result.as_ref().err()).all(
        |err| matches!(err, RegistryError::AlreadyNotarized(id) if id.as_str() == "contested")
    ));

    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM documents;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn concurrent_admin_registration_keeps_one_home_org() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.db");
    {
        let conn = open_db(&path).unwrap();
        let clock = ManualClock::starting_at(10_000);
        provision_with_org(&conn, &clock);
        RegistryService::with_clock(&conn, &clock)
            .register_org(&identity("owner"), &identity("org-b"))
            .unwrap();
    }

    let results = std::thread::scope(|scope| {
        let handles = ["org-a", "org-b"]
            .into_iter()
            .map(|org| {
                let path = path.clone();
                scope.spawn(move || {
                    let conn = open_db(&path).unwrap();
                    RegistryService::new(&conn).add_org_admin(
                        &identity(org),
                        &identity(org),
                        &identity("contested-admin"),
                    )
                })
            })
            .collect::<Vec<_>>();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect::<Vec<_>>()
    });

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, RegistryError::AdminAlreadyAssigned { .. })));
}
