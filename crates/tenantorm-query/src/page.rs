//! Paging requests for listing screens.

use serde::{Deserialize, Serialize};
use tenantorm_core::{ConditionGroup, MatchMode, OrderBy, Predicate, SortOrder, Value};

use crate::clause::{Clause, Where};

/// Offset/limit paging plus sort, search and column filters.
///
/// `limit == 0` means unlimited.
///
/// # Example
///
/// ```ignore
/// let page = Page::new(0, 20)
///     .sort_by("created_at", SortOrder::Desc)
///     .search("smith", ["name", "email"])
///     .filter("status", "open");
/// let listing = session.criteria::<Ticket>().set_page(&page).list_and_count()?;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub offset: u64,
    pub limit: u64,
    pub sort: Option<String>,
    pub order: SortOrder,
    /// Case-insensitive substring matched against every search column.
    pub search: Option<String>,
    pub search_columns: Vec<String>,
    /// Equality filters; several of them are ORed together.
    pub filter_columns: Vec<(String, Value)>,
    /// Equality filters that always must hold.
    pub and_filter_columns: Vec<(String, Value)>,
}

impl Page {
    pub fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sort_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(column.into());
        self.order = order;
        self
    }

    #[must_use]
    pub fn search<I, S>(mut self, text: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search = Some(text.into());
        self.search_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter_columns.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn and_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and_filter_columns.push((column.into(), value.into()));
        self
    }

    /// The ordering directive, if a sort column is set.
    pub fn order_by(&self) -> Option<OrderBy> {
        let column = self.sort.as_deref().filter(|c| !c.is_empty())?;
        Some(OrderBy {
            column: column.to_string(),
            order: self.order,
        })
    }

    /// Add this page's filters to a condition.
    ///
    /// One filter column becomes a plain equality, several become an OR
    /// group. `and_filter_columns` are always conjoined.
    pub fn apply_filters(&self, clause: &mut Where) {
        match self.filter_columns.as_slice() {
            [] => {}
            [(column, value)] => clause.group.push(Predicate::eq(column, value.clone())),
            many => clause.push(Clause::Or(
                many.iter()
                    .map(|(column, value)| Predicate::eq(column, value.clone()))
                    .collect(),
            )),
        }

        for (column, value) in &self.and_filter_columns {
            clause.group.push(Predicate::eq(column, value.clone()));
        }

        if let Some(text) = self.search.as_deref().filter(|t| !t.is_empty()) {
            let group: ConditionGroup = self
                .search_columns
                .iter()
                .map(|column| Predicate::like(column, text, MatchMode::IContains))
                .collect();
            clause.push(Clause::Or(group));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_filter_column_is_plain_equality() {
        let mut clause = Where::new();
        Page::new(0, 10).filter("a", 1).apply_filters(&mut clause);
        assert_eq!(clause.group.len(), 1);
        assert!(clause.clauses.is_empty());
    }

    #[test]
    fn several_filter_columns_are_ored() {
        let mut clause = Where::new();
        Page::new(0, 10)
            .filter("a", 1)
            .filter("b", 2)
            .and_filter("c", 3)
            .apply_filters(&mut clause);
        assert_eq!(
            clause.clauses,
            vec![Clause::Or(
                ConditionGroup::new().eq("a", 1).eq("b", 2)
            )]
        );
        assert_eq!(clause.group, ConditionGroup::new().eq("c", 3));
    }

    #[test]
    fn search_ors_across_columns() {
        let mut clause = Where::new();
        Page::default()
            .search("bo", ["name", "email"])
            .apply_filters(&mut clause);
        assert_eq!(
            clause.clauses,
            vec![Clause::Or(
                ConditionGroup::new()
                    .like("name", "bo", MatchMode::IContains)
                    .like("email", "bo", MatchMode::IContains)
            )]
        );
    }

    #[test]
    fn empty_search_is_ignored() {
        let mut clause = Where::new();
        Page::default().search("", ["name"]).apply_filters(&mut clause);
        assert!(clause.is_empty());
    }

    #[test]
    fn deserializes_with_defaults() {
        let page: Page = serde_json::from_str(r#"{"limit": 5, "sort": "name"}"#).unwrap();
        assert_eq!(page.limit, 5);
        assert_eq!(page.order_by(), Some(OrderBy::asc("name")));
        assert!(page.filter_columns.is_empty());
    }
}
