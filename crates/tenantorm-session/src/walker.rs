//! Depth-guarded traversals over entity graphs.
//!
//! Four walks are driven by the field capability table:
//!
//! - [`set_defaults`]: give every empty to-one association a default value.
//! - [`eager`] / [`eager_force`]: load referenced associations from the backend.
//! - [`Session::save_or_update_cascade`]: persist children together with the root.
//! - [`Session::remove_cascade`]: remove the root, then its children.
//!
//! Each call owns a fresh [`Traversal`] that counts how often every
//! `(type, field)` edge was crossed. An edge is skipped once it reaches the
//! ceiling, so walks over self-referencing or mutually referencing models
//! always terminate.

use std::collections::BTreeMap;

use tenantorm_core::{Connection, Entity, FieldFlags, FieldInfo, FieldKind, Result, Value};
use tenantorm_query::{QuerySource, ScopedLoader};

use crate::Session;

/// Default number of times one edge may be crossed per traversal.
pub const DEFAULT_MAX_EDGE_VISITS: u32 = 5;

/// Visit counters of one traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    max_edge_visits: u32,
    visits: BTreeMap<(&'static str, &'static str), u32>,
    cutoffs: u32,
}

impl Traversal {
    pub fn new(max_edge_visits: u32) -> Self {
        Self {
            max_edge_visits,
            visits: BTreeMap::new(),
            cutoffs: 0,
        }
    }

    /// Count a crossing of `type_name.field`; false once the edge is exhausted.
    fn enter(&mut self, type_name: &'static str, field: &'static str) -> bool {
        let count = self.visits.entry((type_name, field)).or_insert(0);
        if *count >= self.max_edge_visits {
            self.cutoffs += 1;
            tracing::debug!(
                edge_type = type_name,
                edge_field = field,
                visits = *count,
                "Recursion guard reached"
            );
            return false;
        }
        *count += 1;
        true
    }

    /// How often `type_name.field` was crossed.
    pub fn visits(&self, type_name: &str, field: &str) -> u32 {
        self.visits
            .iter()
            .find(|((t, f), _)| *t == type_name && *f == field)
            .map_or(0, |(_, n)| *n)
    }

    /// How many crossings the guard refused.
    pub fn cutoffs(&self) -> u32 {
        self.cutoffs
    }

    pub fn max_edge_visits(&self) -> u32 {
        self.max_edge_visits
    }

    /// Every crossed edge with its count, ordered by type then field.
    pub fn edges(&self) -> impl Iterator<Item = (&'static str, &'static str, u32)> + '_ {
        self.visits.iter().map(|(&(t, f), &n)| (t, f, n))
    }
}

impl Default for Traversal {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EDGE_VISITS)
    }
}

// ============================================================================
// Default Initialization
// ============================================================================

/// Fill every empty to-one association with a default value.
///
/// Fields flagged `ignore_set_default` are left alone; `ignore_set_default_child`
/// fills the field but does not descend into the new value.
#[tracing::instrument(level = "debug", skip(root), fields(root = root.type_name()))]
pub fn set_defaults(root: &mut dyn Entity, max_edge_visits: u32) -> Traversal {
    let mut guard = Traversal::new(max_edge_visits);
    fill_defaults(root, &mut guard);
    guard
}

fn fill_defaults(entity: &mut dyn Entity, guard: &mut Traversal) {
    let type_name = entity.type_name();
    for assoc in entity.associations_mut() {
        let field = assoc.field;
        if field.has(FieldFlags::IGNORE_SET_DEFAULT) || assoc.association.is_set() {
            continue;
        }
        if !guard.enter(type_name, field.name) {
            continue;
        }
        if !assoc.association.set_default() || field.has(FieldFlags::IGNORE_SET_DEFAULT_CHILD) {
            continue;
        }
        for child in assoc.association.entities_mut() {
            fill_defaults(child, guard);
        }
    }
}

// ============================================================================
// Eager Loading
// ============================================================================

/// Load every association flagged `eager`, then descend into what was loaded.
///
/// A failed load is logged and the walk continues with the next field; it
/// does not mark the source as failed.
#[tracing::instrument(level = "debug", skip(source, root), fields(root = root.type_name()))]
pub fn eager(
    source: &mut dyn QuerySource,
    root: &mut dyn Entity,
    max_edge_visits: u32,
) -> Traversal {
    let mut guard = Traversal::new(max_edge_visits);
    load_eager(source, root, false, &mut guard);
    guard
}

/// Like [`eager`], but loads every association regardless of the `eager` flag.
#[tracing::instrument(level = "debug", skip(source, root), fields(root = root.type_name()))]
pub fn eager_force(
    source: &mut dyn QuerySource,
    root: &mut dyn Entity,
    max_edge_visits: u32,
) -> Traversal {
    let mut guard = Traversal::new(max_edge_visits);
    load_eager(source, root, true, &mut guard);
    guard
}

fn wants_eager(field: &FieldInfo, force: bool) -> bool {
    !field.has(FieldFlags::IGNORE_EAGER) && (force || field.has(FieldFlags::EAGER))
}

fn load_eager(
    source: &mut dyn QuerySource,
    entity: &mut dyn Entity,
    force: bool,
    guard: &mut Traversal,
) {
    let type_name = entity.type_name();
    let owner_id = entity.id();
    for assoc in entity.associations_mut() {
        let field = assoc.field;
        if !wants_eager(field, force) {
            continue;
        }
        let loadable = match field.kind {
            FieldKind::ToOne => assoc.association.reference_id().is_some(),
            FieldKind::ToMany => owner_id > 0,
            FieldKind::Column => false,
        };
        if !loadable || !guard.enter(type_name, field.name) {
            continue;
        }

        let loaded = {
            let mut loader = ScopedLoader::tolerant(&mut *source);
            assoc
                .association
                .load(&mut loader, owner_id, field.remote_column)
        };
        match loaded {
            Ok(true) if !field.has(FieldFlags::IGNORE_EAGER_CHILD) => {
                for child in assoc.association.entities_mut() {
                    load_eager(source, child, force, guard);
                }
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    entity = type_name,
                    field = field.name,
                    owner_id,
                    error = %e,
                    "Eager load failed"
                );
            }
        }
    }
}

// ============================================================================
// Cascades
// ============================================================================

impl<C: Connection> Session<C> {
    /// [`set_defaults`] with this session's edge ceiling.
    pub fn set_defaults(&self, root: &mut dyn Entity) -> Traversal {
        set_defaults(root, self.config.max_edge_visits)
    }

    /// [`eager`] through this session's tenant scope.
    pub fn eager(&mut self, root: &mut dyn Entity) -> Traversal {
        let max = self.config.max_edge_visits;
        eager(self, root, max)
    }

    /// [`eager_force`] through this session's tenant scope.
    pub fn eager_force(&mut self, root: &mut dyn Entity) -> Traversal {
        let max = self.config.max_edge_visits;
        eager_force(self, root, max)
    }

    /// Save or update `root` together with its `save_or_update_cascade` children.
    ///
    /// To-one children are persisted before their parent so the parent row
    /// carries their ids; to-many children after it, with their back-reference
    /// column set to the parent id. Only the root is tenant-authorized unless
    /// `validate_cascade_children` is set. The first failure aborts the walk;
    /// nodes already written stay written until the session rolls back.
    ///
    /// A to-one value decoded from a row is a bare reference: load it before
    /// cascading, or its default fields are written back.
    #[tracing::instrument(level = "debug", skip(self, root), fields(root = root.type_name()))]
    pub fn save_or_update_cascade(&mut self, root: &mut dyn Entity) -> Result<Traversal> {
        let mut guard = Traversal::new(self.config.max_edge_visits);
        self.cascade_save(root, true, &mut guard)?;
        Ok(guard)
    }

    fn cascade_save(
        &mut self,
        entity: &mut dyn Entity,
        is_root: bool,
        guard: &mut Traversal,
    ) -> Result<()> {
        let type_name = entity.type_name();

        for assoc in entity.associations_mut() {
            let field = assoc.field;
            if field.kind != FieldKind::ToOne
                || !field.has(FieldFlags::SAVE_OR_UPDATE_CASCADE)
                || !assoc.association.is_set()
                || !guard.enter(type_name, field.name)
            {
                continue;
            }
            for child in assoc.association.entities_mut() {
                self.cascade_save(child, false, guard)?;
            }
        }

        let authorize = is_root || self.config.validate_cascade_children;
        self.persist(entity, authorize)?;
        let owner_id = entity.id();

        for assoc in entity.associations_mut() {
            let field = assoc.field;
            if field.kind != FieldKind::ToMany
                || !field.has(FieldFlags::SAVE_OR_UPDATE_CASCADE)
                || !assoc.association.is_set()
                || !guard.enter(type_name, field.name)
            {
                continue;
            }
            for child in assoc.association.entities_mut() {
                if let Some(column) = field.remote_column {
                    child.set_column(column, &Value::BigInt(owner_id))?;
                }
                self.cascade_save(child, false, guard)?;
            }
        }
        Ok(())
    }

    /// Remove `root`, then every persisted child held by a `remove_cascade` field.
    ///
    /// Removal is parent first. Only the root is tenant-authorized unless
    /// `validate_cascade_children` is set. The first failure aborts the walk.
    #[tracing::instrument(level = "debug", skip(self, root), fields(root = root.type_name()))]
    pub fn remove_cascade(&mut self, root: &mut dyn Entity) -> Result<Traversal> {
        let mut guard = Traversal::new(self.config.max_edge_visits);
        self.cascade_remove(root, true, &mut guard)?;
        Ok(guard)
    }

    fn cascade_remove(
        &mut self,
        entity: &mut dyn Entity,
        is_root: bool,
        guard: &mut Traversal,
    ) -> Result<()> {
        let authorize = is_root || self.config.validate_cascade_children;
        self.erase(entity, authorize)?;

        let type_name = entity.type_name();
        for assoc in entity.associations_mut() {
            let field = assoc.field;
            if !field.has(FieldFlags::REMOVE_CASCADE)
                || !assoc.association.is_set()
                || !guard.enter(type_name, field.name)
            {
                continue;
            }
            for child in assoc.association.entities_mut() {
                if child.is_persisted() {
                    self.cascade_remove(child, false, guard)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SessionConfig, SessionState};
    use tenantorm_core::{Related, RelatedMany, Row, TenantContext, TenantId};
    use tenantorm_macros::Model;
    use tenantorm_memory::{MemoryConnection, MemoryDatabase, OpKind};

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    #[model(table = "authors")]
    struct Author {
        #[model(primary_key)]
        id: i64,
        #[model(tenant)]
        tenant_id: Option<TenantId>,
        name: String,
        #[model(
            column = "favorite_id",
            eager,
            save_or_update_cascade,
            remove_cascade
        )]
        favorite: Related<Book>,
    }

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    #[model(table = "books")]
    struct Book {
        #[model(primary_key)]
        id: i64,
        #[model(tenant)]
        tenant_id: Option<TenantId>,
        title: String,
        #[model(column = "author_id", eager, save_or_update_cascade, remove_cascade)]
        author: Related<Author>,
    }

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    #[model(table = "posts")]
    struct Post {
        #[model(primary_key)]
        id: i64,
        title: String,
        #[model(remote_column = "post_id", save_or_update_cascade, remove_cascade)]
        comments: RelatedMany<Comment>,
        #[model(column = "cover_id", ignore_set_default_child)]
        cover: Related<Book>,
    }

    #[derive(Model, Debug, Default, Clone, PartialEq)]
    #[model(table = "comments")]
    struct Comment {
        #[model(primary_key)]
        id: i64,
        post_id: i64,
        body: String,
    }

    fn session(db: &MemoryDatabase) -> Session<MemoryConnection> {
        Session::with_config(
            db.connect(),
            TenantContext::new(TenantId(1)),
            SessionConfig {
                transactional: false,
                ..SessionConfig::default()
            },
        )
    }

    /// Author 1 and book 1 referencing each other.
    fn mutual_pair(s: &mut Session<MemoryConnection>) -> (i64, i64) {
        let mut book = Book {
            title: "Dune".into(),
            ..Default::default()
        };
        s.save(&mut book).unwrap();
        let mut author = Author {
            name: "Frank".into(),
            favorite: Related::reference(book.id),
            ..Default::default()
        };
        s.save(&mut author).unwrap();
        book.author = Related::reference(author.id);
        s.update(&mut book).unwrap();
        (author.id, book.id)
    }

    #[test]
    fn set_defaults_stops_on_cycles() {
        let mut author = Author::default();
        let walk = set_defaults(&mut author, DEFAULT_MAX_EDGE_VISITS);
        assert_eq!(walk.visits("Author", "favorite"), 5);
        assert_eq!(walk.visits("Book", "author"), 5);
        assert_eq!(walk.cutoffs(), 1);
        assert!(!author.favorite.get().unwrap().author.is_empty());
    }

    #[test]
    fn set_defaults_respects_child_flag() {
        let mut post = Post::default();
        let walk = set_defaults(&mut post, DEFAULT_MAX_EDGE_VISITS);
        let cover = post.cover.get().unwrap();
        assert!(cover.author.is_empty());
        assert_eq!(walk.visits("Book", "author"), 0);
    }

    #[test]
    fn eager_follows_mutual_references_to_the_ceiling() {
        let db = MemoryDatabase::new();
        let mut s = session(&db);
        let (author_id, book_id) = mutual_pair(&mut s);

        let mut author = s.get::<Author>(author_id).unwrap().unwrap();
        let walk = s.eager(&mut author);
        assert_eq!(walk.visits("Author", "favorite"), 5);
        assert_eq!(walk.visits("Book", "author"), 5);

        let book = author.favorite.get().unwrap();
        assert_eq!(book.id, book_id);
        assert_eq!(book.title, "Dune");
        assert_eq!(book.author.get().unwrap().name, "Frank");
    }

    #[test]
    fn eager_failure_is_not_fatal() {
        let db = MemoryDatabase::new();
        let mut s = session(&db);
        // a book row without a tenant column makes the scoped load fail
        db.connect()
            .insert(
                "books",
                "id",
                &Row::from_pairs([("id", Value::BigInt(7)), ("title", Value::Text("x".into()))]),
            )
            .unwrap();
        let mut author = Author {
            favorite: Related::reference(7),
            ..Default::default()
        };
        let walk = s.eager(&mut author);
        assert_eq!(walk.visits("Author", "favorite"), 1);
        assert_eq!(author.favorite.get().unwrap().title, "");
        assert_eq!(s.state(), SessionState::Open);
    }

    #[test]
    fn eager_failure_keeps_earlier_writes_committable() {
        let db = MemoryDatabase::new();
        db.connect()
            .insert(
                "books",
                "id",
                &Row::from_pairs([("id", Value::BigInt(7)), ("title", Value::Text("x".into()))]),
            )
            .unwrap();
        let mut s = Session::new(db.connect(), TenantContext::new(TenantId(1)));
        let mut author = Author {
            name: "Kim".into(),
            favorite: Related::reference(7),
            ..Default::default()
        };
        s.save(&mut author).unwrap();

        s.eager(&mut author);
        assert_eq!(s.state(), SessionState::Open);
        s.close().unwrap();
        assert_eq!(db.len("authors"), 1);
        assert_eq!(db.operations_of(OpKind::Rollback).len(), 0);
    }

    #[test]
    fn cascade_save_writes_to_one_children_first() {
        let db = MemoryDatabase::new();
        let mut s = session(&db);
        let mut author = Author {
            name: "Ursula".into(),
            favorite: Related::new(Book {
                title: "Earthsea".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        s.save_or_update_cascade(&mut author).unwrap();

        let book_id = author.favorite.get().unwrap().id;
        assert!(book_id > 0);
        let inserts: Vec<String> = db
            .operations_of(OpKind::Insert)
            .into_iter()
            .map(|op| op.target)
            .collect();
        assert_eq!(inserts, vec!["books", "authors"]);

        let stored = s.get::<Author>(author.id).unwrap().unwrap();
        assert_eq!(stored.favorite.id(), Some(book_id));
        assert_eq!(author.favorite.get().unwrap().tenant_id, Some(TenantId(1)));
    }

    #[test]
    fn cascade_save_sets_back_references() {
        let db = MemoryDatabase::new();
        let mut s = session(&db);
        let mut post = Post {
            title: "hello".into(),
            comments: vec![
                Comment {
                    body: "first".into(),
                    ..Default::default()
                },
                Comment {
                    body: "second".into(),
                    ..Default::default()
                },
            ]
            .into(),
            ..Default::default()
        };
        s.save_or_update_cascade(&mut post).unwrap();
        assert!(post.comments.iter().all(|c| c.post_id == post.id && c.id > 0));

        post.title = "edited".into();
        s.save_or_update_cascade(&mut post).unwrap();
        assert_eq!(db.len("posts"), 1);
        assert_eq!(db.len("comments"), 2);
    }

    #[test]
    fn cascade_children_inherit_trust_unless_validated() {
        let db = MemoryDatabase::new();
        let foreign_book = || Book {
            tenant_id: Some(TenantId(2)),
            ..Default::default()
        };

        let mut s = session(&db);
        let mut author = Author {
            favorite: Related::new(foreign_book()),
            ..Default::default()
        };
        s.save_or_update_cascade(&mut author).unwrap();

        let mut strict = Session::with_config(
            db.connect(),
            TenantContext::new(TenantId(1)),
            SessionConfig {
                validate_cascade_children: true,
                ..SessionConfig::default()
            },
        );
        let mut author = Author {
            favorite: Related::new(foreign_book()),
            ..Default::default()
        };
        let err = strict.save_or_update_cascade(&mut author).unwrap_err();
        assert!(err.is_authorization());
        assert_ne!(strict.state(), SessionState::Failed);
    }

    #[test]
    fn cascade_remove_is_parent_first() {
        let db = MemoryDatabase::new();
        let mut s = session(&db);
        let mut post = Post {
            comments: vec![Comment::default(), Comment::default()].into(),
            ..Default::default()
        };
        s.save_or_update_cascade(&mut post).unwrap();
        db.clear_operations();

        s.remove_cascade(&mut post).unwrap();
        let deletes: Vec<String> = db
            .operations_of(OpKind::Delete)
            .into_iter()
            .map(|op| op.target)
            .collect();
        assert_eq!(deletes, vec!["posts", "comments", "comments"]);
        assert!(db.is_empty("comments"));
    }
}
