mod versioned_schema;

pub use versioned_schema::{
    migrate, Column, ForeignKey, ForeignKeyOnDelete, SqlType, Table, VersionedSchema,
    BASE_DB_VERSION,
};
