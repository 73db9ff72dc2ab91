//! Parameter binding for MySQL statements.

use crate::models::QueryParam;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;

pub(crate) type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// Bind a parameter to a MySQL query.
pub(crate) fn bind_mysql_param<'q>(query: MySqlQuery<'q>, param: &'q QueryParam) -> MySqlQuery<'q> {
    match param {
        QueryParam::Null => query.bind(None::<String>),
        QueryParam::Bool(v) => query.bind(*v),
        QueryParam::Int(v) => query.bind(*v),
        QueryParam::Float(v) => query.bind(*v),
        QueryParam::String(v) => query.bind(v.as_str()),
        QueryParam::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Build a query for `sql` with every argument bound in order.
pub(crate) fn build_query<'q>(sql: &'q str, args: &'q [QueryParam]) -> MySqlQuery<'q> {
    args.iter()
        .fold(sqlx::query(sql), |query, param| bind_mysql_param(query, param))
}
