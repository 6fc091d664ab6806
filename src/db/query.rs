//! Minimal SQL builder for the active-record layer
//!
//! Table and column names are `&'static str`, so they can only come from call
//! sites in this crate. Filter and column values are always bound as
//! positional parameters.

use rusqlite::types::{FromSql, Value, ValueRef};
use rusqlite::{params_from_iter, Connection, Params};

use super::error::{DbError, DbResult};
use super::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Filter {
    Eq(&'static str, Value),
    IsNull(&'static str),
}

/// One result row, columns kept in statement order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new(columns: Vec<(String, Value)>) -> Self {
        Self { columns }
    }

    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Read a typed column value
    pub fn get<T: FromSql>(&self, column: &str) -> DbResult<T> {
        let value = self
            .value(column)
            .ok_or_else(|| DbError::MissingColumn(column.to_string()))?;
        T::column_result(ValueRef::from(value)).map_err(|source| DbError::Conversion {
            column: column.to_string(),
            source,
        })
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    fn from_row(names: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            columns.push((name.clone(), row.get::<_, Value>(i)?));
        }
        Ok(Self { columns })
    }
}

/// Run a hand-written SELECT and collect its rows as records
pub fn select_records<P: Params>(conn: &Connection, sql: &str, params: P) -> DbResult<Vec<Record>> {
    let mut stmt = conn.prepare(sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let records = stmt
        .query_map(params, |row| Record::from_row(&names, row))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(records)
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: &'static str,
    filters: Vec<Filter>,
    order_by: Option<(&'static str, Direction)>,
    limit: Option<u32>,
}

impl QueryBuilder {
    pub fn table(table: &'static str) -> Self {
        Self {
            table,
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn where_eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field, value.into()));
        self
    }

    pub fn where_null(mut self, field: &'static str) -> Self {
        self.filters.push(Filter::IsNull(field));
        self
    }

    /// Replaces any previous ordering
    pub fn order_by(mut self, field: &'static str, direction: Direction) -> Self {
        self.order_by = Some((field, direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the SELECT statement and its parameters in filter order.
    pub fn to_select(&self) -> (String, Vec<Value>) {
        let mut sql = format!("SELECT * FROM {}", self.table);
        let mut params = Vec::new();

        if !self.filters.is_empty() {
            let clauses: Vec<String> = self
                .filters
                .iter()
                .map(|filter| match filter {
                    Filter::Eq(field, value) => {
                        params.push(value.clone());
                        format!("{} = ?", field)
                    }
                    Filter::IsNull(field) => format!("{} IS NULL", field),
                })
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if let Some((field, direction)) = self.order_by {
            sql.push_str(&format!(" ORDER BY {} {}", field, direction.as_str()));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }

    pub fn to_insert(&self, data: &[(&'static str, Value)]) -> (String, Vec<Value>) {
        let fields: Vec<&str> = data.iter().map(|(field, _)| *field).collect();
        let placeholders = vec!["?"; data.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            fields.join(", "),
            placeholders
        );
        (sql, data.iter().map(|(_, value)| value.clone()).collect())
    }

    pub fn to_update(&self, id: i64, data: &[(&'static str, Value)]) -> (String, Vec<Value>) {
        let sets: Vec<String> = data.iter().map(|(field, _)| format!("{} = ?", field)).collect();
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let mut params: Vec<Value> = data.iter().map(|(_, value)| value.clone()).collect();
        params.push(Value::Integer(id));
        (sql, params)
    }

    pub fn to_delete(&self) -> String {
        format!("DELETE FROM {} WHERE id = ?", self.table)
    }

    pub fn get_on(&self, conn: &Connection) -> DbResult<Vec<Record>> {
        let (sql, params) = self.to_select();
        select_records(conn, &sql, params_from_iter(params.iter()))
    }

    /// Single row or `None`; an empty result is not an error.
    pub fn first_on(self, conn: &Connection) -> DbResult<Option<Record>> {
        Ok(self.limit(1).get_on(conn)?.into_iter().next())
    }

    /// Returns the generated row id
    pub fn insert_on(&self, conn: &Connection, data: &[(&'static str, Value)]) -> DbResult<i64> {
        let (sql, params) = self.to_insert(data);
        conn.execute(&sql, params_from_iter(params.iter()))?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns the number of rows changed
    pub fn update_on(
        &self,
        conn: &Connection,
        id: i64,
        data: &[(&'static str, Value)],
    ) -> DbResult<usize> {
        let (sql, params) = self.to_update(id, data);
        Ok(conn.execute(&sql, params_from_iter(params.iter()))?)
    }

    pub fn delete_on(&self, conn: &Connection, id: i64) -> DbResult<usize> {
        Ok(conn.execute(&self.to_delete(), [id])?)
    }

    pub async fn get(&self, db: &Database) -> DbResult<Vec<Record>> {
        let conn = db.lock().await?;
        self.get_on(&conn)
    }

    pub async fn first(self, db: &Database) -> DbResult<Option<Record>> {
        let conn = db.lock().await?;
        self.first_on(&conn)
    }

    pub async fn insert(&self, db: &Database, data: &[(&'static str, Value)]) -> DbResult<i64> {
        let conn = db.lock().await?;
        self.insert_on(&conn, data)
    }

    pub async fn update(
        &self,
        db: &Database,
        id: i64,
        data: &[(&'static str, Value)],
    ) -> DbResult<usize> {
        let conn = db.lock().await?;
        self.update_on(&conn, id, data)
    }

    pub async fn delete(&self, db: &Database, id: i64) -> DbResult<usize> {
        let conn = db.lock().await?;
        self.delete_on(&conn, id)
    }
}
