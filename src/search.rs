//! Free-text search and client-chosen ordering for list endpoints.

use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{ColumnTrait, Condition, EntityTrait, Order, QueryOrder, Select};

const LIKE_ESCAPE: char = '\\';

fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.to_lowercase().chars() {
        if matches!(c, '%' | '_' | LIKE_ESCAPE) {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `LOWER(column) LIKE '%term%'`, so matching ignores case on every backend.
///
/// The column is table-qualified; joined tables may share column names.
pub fn icontains<C: ColumnTrait>(column: C, term: &str) -> SimpleExpr {
    Expr::expr(Func::lower(Expr::col(column.as_column_ref())))
        .like(LikeExpr::new(like_pattern(term)).escape(LIKE_ESCAPE))
}

/// Matches when any of `columns` contains `term`, ignoring case.
pub fn any_icontains<C: ColumnTrait + Copy>(columns: &[C], term: &str) -> Condition {
    columns
        .iter()
        .fold(Condition::any(), |cond, column| cond.add(icontains(*column, term)))
}

/// A trimmed, non-empty search term.
pub fn search_term(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// One `?ordering=` choice: a whitelisted column, ascending unless the name
/// was prefixed with `-`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort<C> {
    pub column: C,
    pub descending: bool,
}

impl<C: Copy> Sort<C> {
    /// Parse `name` or `-name`. `None` when the name is not in `allowed`.
    pub fn parse(raw: &str, allowed: &[(&str, C)]) -> Option<Self> {
        let raw = raw.trim();
        let (name, descending) = match raw.strip_prefix('-') {
            Some(name) => (name, true),
            None => (raw, false),
        };
        allowed
            .iter()
            .find(|(allowed_name, _)| *allowed_name == name)
            .map(|(_, column)| Sort {
                column: *column,
                descending,
            })
    }
}

impl<C: ColumnTrait> Sort<C> {
    pub fn apply<E: EntityTrait>(self, query: Select<E>) -> Select<E> {
        let order = if self.descending { Order::Desc } else { Order::Asc };
        query.order_by(self.column, order)
    }
}
