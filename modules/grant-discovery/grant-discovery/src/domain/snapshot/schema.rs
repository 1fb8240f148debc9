//! Fixed privilege-catalog schema provisioned in every snapshot store.
//!
//! Column lists follow the MySQL 8.0 layout of each table in ordinal order,
//! because snapshot rows arrive positionally. Every column is TEXT so
//! heterogeneous source data never fails on type affinity.

use super::escape_identifier;

/// Schemas attached next to the main database.
pub const SOURCE_SCHEMAS: [&str; 2] = ["mysql", "information_schema"];

#[derive(Debug)]
pub struct PrivilegeTable {
    pub schema: &'static str,
    pub name: &'static str,
    pub columns: &'static [&'static str],
}

impl PrivilegeTable {
    /// `schema.name`, the form used by snapshot query keys.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    fn qualified(&self) -> String {
        format!(
            "{}.{}",
            escape_identifier(self.schema),
            escape_identifier(self.name)
        )
    }

    #[must_use]
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| format!("{} TEXT", escape_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE IF NOT EXISTS {} ({columns})", self.qualified())
    }

    #[must_use]
    pub fn insert_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|c| escape_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let params = vec!["?"; self.columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({columns}) VALUES ({params})",
            self.qualified()
        )
    }
}

/// Resolve a snapshot table key (case-insensitive) to its schema definition.
#[must_use]
pub fn lookup(key: &str) -> Option<&'static PrivilegeTable> {
    TABLES.iter().find(|t| {
        key.split_once('.').is_some_and(|(schema, name)| {
            schema.eq_ignore_ascii_case(t.schema) && name.eq_ignore_ascii_case(t.name)
        })
    })
}

pub static TABLES: &[PrivilegeTable] = &[
    PrivilegeTable {
        schema: "mysql",
        name: "user",
        columns: &[
            "Host",
            "User",
            "Select_priv",
            "Insert_priv",
            "Update_priv",
            "Delete_priv",
            "Create_priv",
            "Drop_priv",
            "Reload_priv",
            "Shutdown_priv",
            "Process_priv",
            "File_priv",
            "Grant_priv",
            "References_priv",
            "Index_priv",
            "Alter_priv",
            "Show_db_priv",
            "Super_priv",
            "Create_tmp_table_priv",
            "Lock_tables_priv",
            "Execute_priv",
            "Repl_slave_priv",
            "Repl_client_priv",
            "Create_view_priv",
            "Show_view_priv",
            "Create_routine_priv",
            "Alter_routine_priv",
            "Create_user_priv",
            "Event_priv",
            "Trigger_priv",
            "Create_tablespace_priv",
            "ssl_type",
            "ssl_cipher",
            "x509_issuer",
            "x509_subject",
            "max_questions",
            "max_updates",
            "max_connections",
            "max_user_connections",
            "plugin",
            "authentication_string",
            "password_expired",
            "password_last_changed",
            "password_lifetime",
            "account_locked",
            "Create_role_priv",
            "Drop_role_priv",
            "Password_reuse_history",
            "Password_reuse_time",
            "Password_require_current",
            "User_attributes",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "db",
        columns: &[
            "Host",
            "Db",
            "User",
            "Select_priv",
            "Insert_priv",
            "Update_priv",
            "Delete_priv",
            "Create_priv",
            "Drop_priv",
            "Grant_priv",
            "References_priv",
            "Index_priv",
            "Alter_priv",
            "Create_tmp_table_priv",
            "Lock_tables_priv",
            "Create_view_priv",
            "Show_view_priv",
            "Create_routine_priv",
            "Alter_routine_priv",
            "Execute_priv",
            "Event_priv",
            "Trigger_priv",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "tables_priv",
        columns: &[
            "Host",
            "Db",
            "User",
            "Table_name",
            "Grantor",
            "Timestamp",
            "Table_priv",
            "Column_priv",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "columns_priv",
        columns: &[
            "Host",
            "Db",
            "User",
            "Table_name",
            "Column_name",
            "Timestamp",
            "Column_priv",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "procs_priv",
        columns: &[
            "Host",
            "Db",
            "User",
            "Routine_name",
            "Routine_type",
            "Grantor",
            "Proc_priv",
            "Timestamp",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "proxies_priv",
        columns: &[
            "Host",
            "User",
            "Proxied_host",
            "Proxied_user",
            "With_grant",
            "Grantor",
            "Timestamp",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "role_edges",
        columns: &[
            "FROM_HOST",
            "FROM_USER",
            "TO_HOST",
            "TO_USER",
            "WITH_ADMIN_OPTION",
        ],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "default_roles",
        columns: &["HOST", "USER", "DEFAULT_ROLE_HOST", "DEFAULT_ROLE_USER"],
    },
    PrivilegeTable {
        schema: "mysql",
        name: "global_grants",
        columns: &["USER", "HOST", "PRIV", "WITH_GRANT_OPTION"],
    },
    PrivilegeTable {
        schema: "information_schema",
        name: "USER_PRIVILEGES",
        columns: &["GRANTEE", "TABLE_CATALOG", "PRIVILEGE_TYPE", "IS_GRANTABLE"],
    },
    PrivilegeTable {
        schema: "information_schema",
        name: "SCHEMA_PRIVILEGES",
        columns: &[
            "GRANTEE",
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "PRIVILEGE_TYPE",
            "IS_GRANTABLE",
        ],
    },
    PrivilegeTable {
        schema: "information_schema",
        name: "TABLE_PRIVILEGES",
        columns: &[
            "GRANTEE",
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "PRIVILEGE_TYPE",
            "IS_GRANTABLE",
        ],
    },
    PrivilegeTable {
        schema: "information_schema",
        name: "COLUMN_PRIVILEGES",
        columns: &[
            "GRANTEE",
            "TABLE_CATALOG",
            "TABLE_SCHEMA",
            "TABLE_NAME",
            "COLUMN_NAME",
            "PRIVILEGE_TYPE",
            "IS_GRANTABLE",
        ],
    },
];
