//! Declarative SQLite schema with versioning.
//!
//! Tables are described as const data. A fresh database is created from the
//! latest schema; an existing one has its `PRAGMA user_version` checked, its
//! structure validated against the descriptors, and pending migrations run
//! inside one transaction.

use anyhow::{bail, Result};
use rusqlite::{params, Connection};

// Offset distinguishes our user_version values from a database some other
// tool initialized to small integers.
pub const BASE_DB_VERSION: usize = 77000;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ForeignKeyOnDelete {
    Cascade,
    SetNull,
}

impl ForeignKeyOnDelete {
    fn sql(&self) -> &'static str {
        match self {
            ForeignKeyOnDelete::Cascade => "CASCADE",
            ForeignKeyOnDelete::SetNull => "SET NULL",
        }
    }
}

pub struct ForeignKey {
    pub table: &'static str,
    pub column: &'static str,
    pub on_delete: ForeignKeyOnDelete,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub primary_key: bool,
    pub non_null: bool,
    pub unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            primary_key: false,
            non_null: false,
            unique: false,
            default_value: None,
            foreign_key: None,
        }
    }

    pub const fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub const fn non_null(mut self) -> Self {
        self.non_null = true;
        self
    }

    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub const fn default_value(mut self, value: &'static str) -> Self {
        self.default_value = Some(value);
        self
    }

    pub const fn references(
        mut self,
        table: &'static str,
        column: &'static str,
        on_delete: ForeignKeyOnDelete,
    ) -> Self {
        self.foreign_key = Some(ForeignKey {
            table,
            column,
            on_delete,
        });
        self
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// (index name, indexed column expression) pairs.
    pub indices: &'static [(&'static str, &'static str)],
    pub unique_constraints: &'static [&'static [&'static str]],
}

impl Table {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        let mut sql = format!("CREATE TABLE {} (", self.name);
        for (i, column) in self.columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&format!("{} {}", column.name, column.sql_type.sql()));
            if column.primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            if column.non_null {
                sql.push_str(" NOT NULL");
            }
            if column.unique {
                sql.push_str(" UNIQUE");
            }
            if let Some(default_value) = column.default_value {
                sql.push_str(&format!(" DEFAULT {}", default_value));
            }
            if let Some(fk) = &column.foreign_key {
                sql.push_str(&format!(
                    " REFERENCES {}({}) ON DELETE {}",
                    fk.table,
                    fk.column,
                    fk.on_delete.sql()
                ));
            }
        }
        for unique in self.unique_constraints {
            sql.push_str(&format!(", UNIQUE ({})", unique.join(", ")));
        }
        sql.push_str(");");
        conn.execute(&sql, params![])?;

        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )?;
        }
        Ok(())
    }

    /// Check that the live table has exactly the declared columns, with the
    /// declared types and nullability, and that declared indices exist.
    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual: Vec<(String, String, bool, bool)> = stmt
            .query_map(params![], |row| {
                Ok((
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i32>(3)? == 1,
                    row.get::<_, i32>(5)? >= 1,
                ))
            })?
            .collect::<rusqlite::Result<_>>()?;

        if actual.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} ({})",
                self.name,
                actual.len(),
                self.columns.len(),
                self.columns
                    .iter()
                    .map(|c| c.name)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for ((name, sql_type, non_null, is_pk), expected) in actual.iter().zip(self.columns) {
            if name != expected.name {
                bail!(
                    "Table {} column mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    name
                );
            }
            if sql_type != expected.sql_type.sql() {
                bail!(
                    "Table {} column {} type mismatch: expected {}, got {}",
                    self.name,
                    name,
                    expected.sql_type.sql(),
                    sql_type
                );
            }
            if *non_null != expected.non_null {
                bail!("Table {} column {} non-null mismatch", self.name, name);
            }
            if *is_pk != expected.primary_key {
                bail!("Table {} column {} primary key mismatch", self.name, name);
            }
        }

        for (index_name, _) in self.indices {
            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(true),
                )
                .unwrap_or(false);
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }

        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Migrate a database at `from_version` up through every later schema.
pub fn migrate(
    conn: &mut Connection,
    schemas: &[VersionedSchema],
    from_version: usize,
) -> Result<()> {
    let tx = conn.transaction()?;
    let mut reached = from_version;
    for schema in schemas.iter().filter(|s| s.version > from_version) {
        if let Some(migration) = schema.migration {
            migration(&tx)?;
        }
        reached = schema.version;
    }
    tx.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + reached),
        [],
    )?;
    tx.commit()?;
    Ok(())
}
