#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tenantorm::prelude::*;
use tenantorm::{Cond, MemoryConnection, TableQuery};

#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "tickets")]
pub struct Ticket {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub title: String,
    pub status: String,
    pub priority: i64,
    pub assignee_id: i64,
    pub reviewer_id: i64,
}

impl Ticket {
    pub fn new(title: &str, priority: i64) -> Self {
        Self {
            title: title.into(),
            status: "open".into(),
            priority,
            ..Default::default()
        }
    }
}

/// Mutually referencing pair: an author's favorite book, a book's author.
#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "authors")]
pub struct Author {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub name: String,
    #[model(
        column = "favorite_id",
        eager,
        save_or_update_cascade,
        remove_cascade
    )]
    pub favorite: Related<Book>,
}

#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "books")]
pub struct Book {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub title: String,
    #[model(column = "author_id", eager, save_or_update_cascade, remove_cascade)]
    pub author: Related<Author>,
}

/// A parent with two cascading to-one children.
#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "folders")]
pub struct Folder {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub name: String,
    #[model(column = "readme_id", save_or_update_cascade, remove_cascade)]
    pub readme: Related<Document>,
    #[model(column = "license_id", save_or_update_cascade, remove_cascade)]
    pub license: Related<Document>,
    #[model(remote_column = "folder_id", eager, save_or_update_cascade)]
    pub notes: RelatedMany<Note>,
}

#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "documents")]
pub struct Document {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub title: String,
}

/// A model with its own lifecycle hooks.
#[derive(tenantorm::Model, Debug, Default, Clone, PartialEq)]
#[model(table = "notes", events)]
pub struct Note {
    #[model(primary_key)]
    pub id: i64,
    #[model(tenant)]
    pub tenant_id: Option<TenantId>,
    pub folder_id: i64,
    pub body: String,
    pub archived: bool,
    #[model(skip)]
    pub loaded: bool,
}

impl ModelEvents for Note {
    fn before_save(&mut self) -> Result<()> {
        if self.body.is_empty() {
            return Err(Error::Custom("note body is empty".into()));
        }
        Ok(())
    }

    fn after_load(&mut self) -> Result<()> {
        self.loaded = true;
        Ok(())
    }

    fn before_criteria(group: &mut ConditionGroup) {
        group.push(Predicate::eq("archived", false));
    }

    fn after_list(items: &mut [Self]) {
        items.sort_by(|a, b| a.body.cmp(&b.body));
    }
}

pub fn tenant(id: i64) -> TenantContext {
    TenantContext::new(TenantId(id))
}

/// A session whose writes land immediately.
pub fn autocommit(db: &MemoryDatabase, id: i64) -> Session<MemoryConnection> {
    Session::with_config(
        db.connect(),
        tenant(id),
        SessionConfig {
            transactional: false,
            ..SessionConfig::default()
        },
    )
}

/// Forwards to a connection and records every read query.
#[derive(Debug)]
pub struct Recording<C> {
    inner: C,
    pub queries: Arc<Mutex<Vec<TableQuery>>>,
}

impl<C> Recording<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            queries: Arc::default(),
        }
    }

    pub fn last_query(&self) -> TableQuery {
        self.queries.lock().unwrap().last().cloned().unwrap()
    }
}

impl<C: Connection> Connection for Recording<C> {
    fn query(&mut self, query: &TableQuery) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(query.clone());
        self.inner.query(query)
    }

    fn count(&mut self, query: &TableQuery) -> Result<u64> {
        self.queries.lock().unwrap().push(query.clone());
        self.inner.count(query)
    }

    fn insert(&mut self, table: &str, pk: &str, row: &Row) -> Result<i64> {
        self.inner.insert(table, pk, row)
    }

    fn update(&mut self, table: &str, pk: &str, id: i64, scope: &Cond, row: &Row) -> Result<u64> {
        self.inner.update(table, pk, id, scope, row)
    }

    fn delete(&mut self, table: &str, pk: &str, id: i64, scope: &Cond) -> Result<u64> {
        self.inner.delete(table, pk, id, scope)
    }

    fn update_where(&mut self, query: &TableQuery, values: &[(String, Value)]) -> Result<u64> {
        self.inner.update_where(query, values)
    }

    fn delete_where(&mut self, query: &TableQuery) -> Result<u64> {
        self.inner.delete_where(query)
    }

    fn begin(&mut self) -> Result<()> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<()> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<()> {
        self.inner.rollback()
    }

    fn in_transaction(&self) -> bool {
        self.inner.in_transaction()
    }

    fn raw_query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.inner.raw_query(sql, params)
    }
}
