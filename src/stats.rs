//! Grouped counts for the stats endpoints.

use crate::error::AtlasError;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QuerySelect, Select};
use std::collections::BTreeMap;

/// Count rows of `select` per distinct value of a string column.
///
/// `select` must not carry an ORDER BY, since the grouped query would then
/// reference ungrouped columns.
pub async fn count_by<C, E, Col>(
    db: &C,
    select: Select<E>,
    column: Col,
) -> Result<BTreeMap<String, i64>, AtlasError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    Col: ColumnTrait,
{
    let rows: Vec<(String, i64)> = select
        .select_only()
        .column(column)
        .column_as(Expr::cust("COUNT(*)"), "count")
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows.into_iter().filter(|(_, count)| *count > 0).collect())
}
