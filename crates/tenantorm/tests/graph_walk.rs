mod common;

use common::{Author, Book, Document, Folder, Note, autocommit};
use tenantorm::prelude::*;
use tenantorm::{MemoryConnection, OpKind, SessionState};

/// Author and book referencing each other, committed.
fn mutual_pair(db: &MemoryDatabase) -> i64 {
    let mut s = autocommit(db, 1);
    let mut book = Book {
        title: "Solaris".into(),
        ..Default::default()
    };
    s.save(&mut book).unwrap();
    let mut author = Author {
        name: "Stanislaw".into(),
        favorite: Related::reference(book.id),
        ..Default::default()
    };
    s.save(&mut author).unwrap();
    book.author = Related::reference(author.id);
    s.update(&mut book).unwrap();
    author.id
}

fn loaded_author(s: &mut Session<MemoryConnection>, id: i64) -> Author {
    let mut author = s.get::<Author>(id).unwrap().unwrap();
    s.eager(&mut author);
    author
}

fn depth(author: &Author) -> usize {
    let mut depth = 0;
    let mut current = author;
    while let Some(book) = current.favorite.get().filter(|b| !b.title.is_empty()) {
        depth += 1;
        match book.author.get().filter(|a| !a.name.is_empty()) {
            Some(next) => current = next,
            None => break,
        }
    }
    depth
}

#[test]
fn eager_on_a_cycle_stops_after_five_visits_per_edge() {
    let db = MemoryDatabase::new();
    let id = mutual_pair(&db);
    let mut s = autocommit(&db, 1);

    let mut author = s.get::<Author>(id).unwrap().unwrap();
    let walk = s.eager(&mut author);
    assert_eq!(walk.visits("Author", "favorite"), 5);
    assert_eq!(walk.visits("Book", "author"), 5);
    assert_eq!(walk.cutoffs(), 1);
    assert_eq!(depth(&author), 5);
}

#[test]
fn eager_force_ignores_the_eager_flag() {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);
    let mut folder = Folder {
        name: "docs".into(),
        readme: Related::new(Document {
            title: "README".into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    s.save_or_update_cascade(&mut folder).unwrap();

    let mut plain = s.get::<Folder>(folder.id).unwrap().unwrap();
    let walk = s.eager(&mut plain);
    assert_eq!(walk.visits("Folder", "readme"), 0);
    assert_eq!(plain.readme.get().unwrap().title, "");

    let walk = s.eager_force(&mut plain);
    assert_eq!(walk.visits("Folder", "readme"), 1);
    assert_eq!(plain.readme.get().unwrap().title, "README");
    assert!(plain.license.is_empty());
}

#[test]
fn cascade_save_on_a_cycle_stops_after_five_visits_per_edge() {
    let db = MemoryDatabase::new();
    let id = mutual_pair(&db);
    let mut s = autocommit(&db, 1);
    let mut author = loaded_author(&mut s, id);

    author.name = "S. Lem".into();
    let walk = s.save_or_update_cascade(&mut author).unwrap();
    assert_eq!(walk.visits("Author", "favorite"), 5);
    assert_eq!(walk.visits("Book", "author"), 5);

    assert_eq!(db.len("authors"), 1);
    assert_eq!(db.len("books"), 1);
    // the root is written last
    let stored = s.get::<Author>(id).unwrap().unwrap();
    assert_eq!(stored.name, "S. Lem");
}

#[test]
fn cascade_remove_on_a_cycle_terminates() {
    let db = MemoryDatabase::new();
    let id = mutual_pair(&db);
    let mut s = autocommit(&db, 1);
    let mut author = loaded_author(&mut s, id);

    let walk = s.remove_cascade(&mut author).unwrap();
    assert_eq!(walk.visits("Author", "favorite"), 5);
    assert_eq!(walk.visits("Book", "author"), 5);
    assert!(db.is_empty("authors"));
    assert!(db.is_empty("books"));
}

#[test]
fn cascade_remove_takes_parent_then_both_children() {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);
    let mut folder = Folder {
        name: "release".into(),
        readme: Related::new(Document {
            title: "README".into(),
            ..Default::default()
        }),
        license: Related::new(Document {
            title: "LICENSE".into(),
            ..Default::default()
        }),
        ..Default::default()
    };
    s.save_or_update_cascade(&mut folder).unwrap();
    let readme = folder.readme.id().unwrap();
    let license = folder.license.id().unwrap();
    db.clear_operations();

    s.remove_cascade(&mut folder).unwrap();
    let deletes: Vec<(String, Option<i64>)> = db
        .operations_of(OpKind::Delete)
        .into_iter()
        .map(|op| (op.target, op.id))
        .collect();
    assert_eq!(
        deletes,
        vec![
            ("folders".to_string(), Some(folder.id)),
            ("documents".to_string(), Some(readme)),
            ("documents".to_string(), Some(license)),
        ]
    );
    assert!(db.is_empty("documents"));
}

#[test]
fn cascade_save_fills_foreign_keys_and_back_references() {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);
    let mut folder = Folder {
        name: "notes".into(),
        readme: Related::new(Document {
            title: "README".into(),
            ..Default::default()
        }),
        notes: vec![
            Note {
                body: "one".into(),
                ..Default::default()
            },
            Note {
                body: "two".into(),
                ..Default::default()
            },
        ]
        .into(),
        ..Default::default()
    };
    s.save_or_update_cascade(&mut folder).unwrap();

    let mut stored = s.get::<Folder>(folder.id).unwrap().unwrap();
    assert_eq!(stored.readme.id(), folder.readme.id());
    assert!(stored.notes.is_empty());

    s.eager(&mut stored);
    let bodies: Vec<&str> = stored.notes.iter().map(|n| n.body.as_str()).collect();
    assert_eq!(bodies, vec!["one", "two"]);
    assert!(stored.notes.iter().all(|n| n.tenant_id == Some(TenantId(1))));
}

#[test]
fn cascade_failure_propagates_and_fails_the_session() {
    let db = MemoryDatabase::new();
    let mut s = Session::new(db.connect(), common::tenant(1));
    let mut folder = Folder {
        notes: vec![Note::default()].into(),
        ..Default::default()
    };
    let err = s.save_or_update_cascade(&mut folder).unwrap_err();
    assert!(matches!(err, Error::Custom(_)));
    assert_eq!(s.state(), SessionState::Failed);
    s.close().unwrap();
    assert!(db.is_empty("folders"));
}

#[test]
fn set_defaults_then_eager_does_not_panic() {
    let db = MemoryDatabase::new();
    let mut s = autocommit(&db, 1);

    let mut author = Author::default();
    let walk = s.set_defaults(&mut author);
    assert_eq!(walk.visits("Author", "favorite"), 5);

    let book = author.favorite.get_mut().unwrap();
    book.title = "Draft".into();
    let walk = s.eager(&mut author);
    assert_eq!(walk.visits("Author", "favorite"), 0);
    assert_eq!(author.favorite.get().unwrap().title, "Draft");

    let mut folder = Folder::default();
    s.set_defaults(&mut folder);
    assert!(folder.readme.get().is_some());
    assert!(folder.notes.is_empty());
    s.eager_force(&mut folder);
}
