mod common;

use common::{Ticket, autocommit, tenant};
use tenantorm::prelude::*;
use tenantorm::SessionState;

fn two_tenants() -> MemoryDatabase {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);
    s.save(&mut Ticket::new("mine-1", 1)).unwrap();
    s.save(&mut Ticket::new("mine-2", 2)).unwrap();
    s.run_with_tenant(TenantId(2), |s| s.save(&mut Ticket::new("theirs", 3)))
        .unwrap();
    db
}

#[test]
fn list_only_returns_the_session_tenant() {
    let db = two_tenants();
    let mut s = Session::new(db.connect(), tenant(1));
    let titles: Vec<String> = s
        .list::<Ticket>()
        .unwrap()
        .into_iter()
        .map(|t| t.title)
        .collect();
    assert_eq!(titles, vec!["mine-1", "mine-2"]);
    assert_eq!(s.count::<Ticket>().unwrap(), 2);
}

#[test]
fn ignoring_the_tenant_filter_returns_everything() {
    let db = two_tenants();
    let mut s = Session::new(db.connect(), tenant(1).with_ignore_tenant_filter(true));
    assert_eq!(s.list::<Ticket>().unwrap().len(), 3);

    let config = SessionConfig::from_json(r#"{"ignore_tenant_filter": true}"#).unwrap();
    let mut s = Session::with_config(db.connect(), tenant(1), config);
    assert_eq!(s.count::<Ticket>().unwrap(), 3);
}

fn stored(db: &MemoryDatabase, title: &str) -> Row {
    db.rows("tickets")
        .into_iter()
        .find(|r| r.get_named::<String>("title").unwrap() == title)
        .unwrap()
}

#[test]
fn other_tenants_rows_are_invisible_by_id() {
    let db = two_tenants();
    let theirs = stored(&db, "theirs").get_named::<i64>("id").unwrap();

    let mut s = Session::new(db.connect(), tenant(1));
    assert!(s.get::<Ticket>(theirs).unwrap().is_none());
    assert!(!s.exists::<Ticket>(theirs).unwrap());
}

#[test]
fn save_stamps_an_unset_tenant() {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);
    let mut ticket = Ticket::new("new", 1);
    s.save(&mut ticket).unwrap();
    assert_eq!(ticket.tenant_id, Some(TenantId(1)));

    let stored = db.rows("tickets");
    assert_eq!(
        stored[0].get_named::<Option<TenantId>>("tenant_id").unwrap(),
        Some(TenantId(1))
    );
}

#[test]
fn save_keeps_an_explicit_tenant() {
    let db = MemoryDatabase::new();
    let mut s = Session::with_config(
        db.connect(),
        tenant(1).with_authorized_tenants([TenantId(2)]),
        SessionConfig {
            transactional: false,
            ..SessionConfig::default()
        },
    );
    let mut ticket = Ticket::new("for two", 1);
    ticket.tenant_id = Some(TenantId(2));
    s.save(&mut ticket).unwrap();
    assert_eq!(ticket.tenant_id, Some(TenantId(2)));
    assert_eq!(
        db.rows("tickets")[0]
            .get_named::<Option<TenantId>>("tenant_id")
            .unwrap(),
        Some(TenantId(2))
    );
}

#[test]
fn writes_for_unauthorized_tenants_are_rejected() {
    let db = two_tenants();
    let mut s = autocommit(&db, 1);
    db.clear_operations();

    let mut foreign = Ticket::new("sneaky", 1);
    foreign.tenant_id = Some(TenantId(2));
    assert!(s.save(&mut foreign).unwrap_err().is_authorization());

    foreign.id = 3;
    assert!(s.update(&mut foreign).unwrap_err().is_authorization());
    assert!(s.remove(&mut foreign).unwrap_err().is_authorization());
    assert!(db.operations().is_empty());

    let mut admin = Session::new(
        db.connect(),
        tenant(1).with_ignore_authorized_tenant_check(true),
    );
    admin.update(&mut foreign).unwrap();
}

#[test]
fn bare_ids_cannot_reach_other_tenants_rows() {
    let db = two_tenants();
    let theirs = stored(&db, "theirs").get_named::<i64>("id").unwrap();
    let mut s = autocommit(&db, 1);

    let mut bare = Ticket {
        id: theirs,
        ..Default::default()
    };
    assert!(s.remove(&mut bare).unwrap_err().is_authorization());

    let mut claimed = Ticket {
        id: theirs,
        tenant_id: Some(TenantId(1)),
        ..Default::default()
    };
    s.remove(&mut claimed).unwrap();
    assert_eq!(db.len("tickets"), 3);

    let mut forged = Ticket {
        id: theirs,
        title: "hijacked".into(),
        ..Default::default()
    };
    assert!(s.update(&mut forged).unwrap_err().is_query());

    let row = stored(&db, "theirs");
    assert_eq!(
        row.get_named::<Option<TenantId>>("tenant_id").unwrap(),
        Some(TenantId(2))
    );
    assert_eq!(row.get_named::<i64>("id").unwrap(), theirs);
}

#[test]
fn authorized_tenants_write_their_own_rows_only() {
    let db = two_tenants();
    let theirs = stored(&db, "theirs").get_named::<i64>("id").unwrap();
    let mut s = Session::with_config(
        db.connect(),
        tenant(1).with_authorized_tenants([TenantId(2)]),
        SessionConfig {
            transactional: false,
            ..SessionConfig::default()
        },
    );

    let mut ticket = Ticket::new("renamed", 3);
    ticket.id = theirs;
    ticket.tenant_id = Some(TenantId(2));
    s.update(&mut ticket).unwrap();
    assert_eq!(
        stored(&db, "renamed").get_named::<i64>("id").unwrap(),
        theirs
    );

    let mut mine = Ticket::new("mine-1", 1);
    mine.id = stored(&db, "mine-1").get_named::<i64>("id").unwrap();
    mine.tenant_id = Some(TenantId(2));
    assert!(s.update(&mut mine).unwrap_err().is_query());
    assert_eq!(db.len("tickets"), 3);
}

#[test]
fn run_with_tenant_switches_and_restores() {
    let db = two_tenants();
    let mut s = autocommit(&db, 1);
    let seen = s
        .run_with_tenant(TenantId(2), |s| {
            assert_eq!(s.tenant(), Some(TenantId(2)));
            s.list::<Ticket>()
        })
        .unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(s.tenant(), Some(TenantId(1)));
}

#[test]
fn run_with_tenant_restores_after_failure() {
    let db = two_tenants();
    let mut s = Session::new(db.connect(), tenant(1));
    let result = s.run_with_tenant(TenantId(2), |s| {
        let mut ghost = Ticket::new("ghost", 1);
        ghost.id = 999;
        s.update(&mut ghost)
    });
    assert!(result.is_err());
    assert_eq!(s.state(), SessionState::Failed);
    assert_eq!(s.tenant(), Some(TenantId(1)));

    s.close().unwrap();
    assert_eq!(db.len("tickets"), 3);
}
