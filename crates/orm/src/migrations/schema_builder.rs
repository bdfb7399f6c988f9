//! Schema Builder - DSL for creating tables inside migrations
//!
//! A [`Blueprint`] accumulates column, index and foreign-key fragments for a
//! single table and compiles them into one `CREATE TABLE IF NOT EXISTS`
//! statement. Modifiers (`nullable`, `default`, `unique`) rewrite the most
//! recently declared column in place; with no column declared they do nothing
//! apart from logging a warning.

use std::fmt;

/// Storage suffix appended to every generated table definition
pub const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// Quote an identifier with backticks, doubling any embedded backtick
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Value rendered after `DEFAULT` in a column definition
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnDefault {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Emitted verbatim, e.g. `CURRENT_TIMESTAMP`
    Raw(String),
}

impl ColumnDefault {
    pub fn raw(expression: impl Into<String>) -> Self {
        ColumnDefault::Raw(expression.into())
    }
}

impl fmt::Display for ColumnDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDefault::Null => write!(f, "NULL"),
            ColumnDefault::Bool(true) => write!(f, "TRUE"),
            ColumnDefault::Bool(false) => write!(f, "FALSE"),
            ColumnDefault::Int(i) => write!(f, "{}", i),
            ColumnDefault::Float(v) => write!(f, "{}", v),
            ColumnDefault::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            ColumnDefault::Raw(expr) => write!(f, "{}", expr),
        }
    }
}

impl From<bool> for ColumnDefault {
    fn from(value: bool) -> Self {
        ColumnDefault::Bool(value)
    }
}

impl From<i32> for ColumnDefault {
    fn from(value: i32) -> Self {
        ColumnDefault::Int(i64::from(value))
    }
}

impl From<i64> for ColumnDefault {
    fn from(value: i64) -> Self {
        ColumnDefault::Int(value)
    }
}

impl From<f64> for ColumnDefault {
    fn from(value: f64) -> Self {
        ColumnDefault::Float(value)
    }
}

impl From<&str> for ColumnDefault {
    fn from(value: &str) -> Self {
        ColumnDefault::Text(value.to_string())
    }
}

impl From<String> for ColumnDefault {
    fn from(value: String) -> Self {
        ColumnDefault::Text(value)
    }
}

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    on: Option<String>,
}

/// Table builder for CREATE TABLE statements
#[derive(Debug, Clone)]
pub struct Blueprint {
    table_name: String,
    columns: Vec<String>,
    indexes: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
}

impl Blueprint {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Add a column with a raw type definition
    pub fn column(&mut self, name: &str, definition: &str) -> &mut Self {
        self.push_column(name, definition)
    }

    /// Add an `id` auto-increment primary key
    pub fn id(&mut self) -> &mut Self {
        self.id_named("id")
    }

    /// Add an auto-increment primary key with a custom name
    pub fn id_named(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "INT AUTO_INCREMENT PRIMARY KEY")
    }

    /// Add a VARCHAR(255) column
    pub fn string(&mut self, name: &str) -> &mut Self {
        self.string_with_length(name, 255)
    }

    pub fn string_with_length(&mut self, name: &str, length: u32) -> &mut Self {
        self.push_column(name, &format!("VARCHAR({})", length))
    }

    pub fn text(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "TEXT")
    }

    pub fn integer(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "INT")
    }

    pub fn big_integer(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "BIGINT")
    }

    /// Add a DECIMAL(8, 2) column
    pub fn decimal(&mut self, name: &str) -> &mut Self {
        self.decimal_with(name, 8, 2)
    }

    pub fn decimal_with(&mut self, name: &str, precision: u8, scale: u8) -> &mut Self {
        self.push_column(name, &format!("DECIMAL({}, {})", precision, scale))
    }

    pub fn boolean(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "BOOLEAN")
    }

    pub fn timestamp(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "TIMESTAMP")
    }

    /// Add `created_at` and `updated_at`, the latter refreshed on every update
    pub fn timestamps(&mut self) -> &mut Self {
        self.push_column("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP");
        self.push_column(
            "updated_at",
            "TIMESTAMP NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP",
        )
    }

    /// Add an INT column meant to hold another table's `id`
    pub fn foreign_id(&mut self, name: &str) -> &mut Self {
        self.push_column(name, "INT")
    }

    /// Mark the last declared column as NULL-able
    pub fn nullable(&mut self) -> &mut Self {
        self.modify_last("nullable", |column| column.push_str(" NULL"))
    }

    /// Give the last declared column a default value
    pub fn default(&mut self, value: impl Into<ColumnDefault>) -> &mut Self {
        let value = value.into();
        self.modify_last("default", |column| column.push_str(&format!(" DEFAULT {}", value)))
    }

    /// Mark the last declared column as UNIQUE
    pub fn unique(&mut self) -> &mut Self {
        self.modify_last("unique", |column| column.push_str(" UNIQUE"))
    }

    /// Add a secondary index on one column
    pub fn index(&mut self, column: &str) -> &mut Self {
        let index_name = format!("idx_{}_{}", self.table_name, column);
        self.indexes.push(format!(
            "INDEX {} ({})",
            quote_identifier(&index_name),
            quote_identifier(column)
        ));
        self
    }

    /// Start a foreign key on `column`; complete it with [`Blueprint::on`]
    pub fn references(&mut self, column: &str) -> &mut Self {
        self.foreign_keys.push(ForeignKey {
            column: column.to_string(),
            on: None,
        });
        self
    }

    /// Set the referenced table of the last foreign key
    pub fn on(&mut self, table: &str) -> &mut Self {
        match self.foreign_keys.last_mut() {
            Some(foreign_key) => foreign_key.on = Some(table.to_string()),
            None => tracing::warn!(
                table = %self.table_name,
                "on('{}') called without a preceding references(); ignored",
                table
            ),
        }
        self
    }

    /// Build the CREATE TABLE SQL
    pub fn to_sql(&self) -> String {
        let mut parts = self.columns.clone();
        parts.extend(self.indexes.iter().cloned());

        for foreign_key in &self.foreign_keys {
            match &foreign_key.on {
                Some(on) => parts.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {}({})",
                    quote_identifier(&foreign_key.column),
                    quote_identifier(on),
                    quote_identifier("id")
                )),
                None => tracing::warn!(
                    table = %self.table_name,
                    column = %foreign_key.column,
                    "foreign key has no referenced table; omitted"
                ),
            }
        }

        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) {}",
            quote_identifier(&self.table_name),
            parts.join(",\n    "),
            TABLE_OPTIONS
        )
    }

    fn push_column(&mut self, name: &str, definition: &str) -> &mut Self {
        self.columns.push(format!("{} {}", quote_identifier(name), definition));
        self
    }

    fn modify_last<F>(&mut self, modifier: &str, apply: F) -> &mut Self
    where
        F: FnOnce(&mut String),
    {
        match self.columns.last_mut() {
            Some(column) => apply(column),
            None => tracing::warn!(
                table = %self.table_name,
                "{}() called before any column was declared; ignored",
                modifier
            ),
        }
        self
    }
}

impl fmt::Display for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_users_table() {
        let mut table = Blueprint::new("users");
        table.id();
        table.string("email").unique();
        table.timestamps();

        let sql = table.to_sql();
        assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS `users` ("));
        assert!(sql.ends_with(TABLE_OPTIONS));

        let id = sql.find("`id` INT AUTO_INCREMENT PRIMARY KEY").unwrap();
        let email = sql.find("`email` VARCHAR(255) UNIQUE").unwrap();
        let created = sql.find("`created_at` TIMESTAMP").unwrap();
        let updated = sql.find("`updated_at` TIMESTAMP").unwrap();
        assert!(id < email && email < created && created < updated);

        assert!(!sql.contains("INDEX"));
        assert!(!sql.contains("FOREIGN KEY"));
    }

    #[test]
    fn test_modifier_without_column_is_a_noop() {
        let mut untouched = Blueprint::new("users");
        untouched.id();

        let mut table = Blueprint::new("users");
        table.unique().nullable().default("x");
        table.id();

        assert_eq!(table.to_sql(), untouched.to_sql());
        assert!(!table.to_sql().contains("UNIQUE"));
    }

    #[test]
    fn test_modifiers_apply_to_last_column_only() {
        let mut table = Blueprint::new("users");
        table.string("name");
        table.boolean("active").default(true);
        table.string("nickname").nullable();

        let sql = table.to_sql();
        assert!(sql.contains("`name` VARCHAR(255),"));
        assert!(sql.contains("`active` BOOLEAN DEFAULT TRUE,"));
        assert!(sql.contains("`nickname` VARCHAR(255) NULL\n"));
    }

    #[test]
    fn test_column_types() {
        let mut table = Blueprint::new("orders");
        table.id_named("order_id");
        table.string_with_length("code", 32);
        table.text("notes");
        table.integer("quantity");
        table.big_integer("views");
        table.decimal("total");
        table.decimal_with("tax", 10, 4);
        table.timestamp("shipped_at").nullable();

        let sql = table.to_sql();
        assert!(sql.contains("`order_id` INT AUTO_INCREMENT PRIMARY KEY"));
        assert!(sql.contains("`code` VARCHAR(32)"));
        assert!(sql.contains("`notes` TEXT"));
        assert!(sql.contains("`quantity` INT"));
        assert!(sql.contains("`views` BIGINT"));
        assert!(sql.contains("`total` DECIMAL(8, 2)"));
        assert!(sql.contains("`tax` DECIMAL(10, 4)"));
        assert!(sql.contains("`shipped_at` TIMESTAMP NULL"));
    }

    #[test]
    fn test_index_and_foreign_key_follow_columns() {
        let mut table = Blueprint::new("posts");
        table.id();
        table.foreign_id("user_id");
        table.string("slug");
        table.index("slug");
        table.references("user_id").on("users");

        let sql = table.to_sql();
        let slug = sql.find("`slug` VARCHAR(255)").unwrap();
        let index = sql.find("INDEX `idx_posts_slug` (`slug`)").unwrap();
        let fk = sql.find("FOREIGN KEY (`user_id`) REFERENCES `users`(`id`)").unwrap();
        assert!(slug < index && index < fk);
    }

    #[test]
    fn test_incomplete_foreign_key_is_omitted() {
        let mut table = Blueprint::new("posts");
        table.id();
        table.references("user_id");

        assert!(!table.to_sql().contains("FOREIGN KEY"));

        let mut stray = Blueprint::new("posts");
        stray.id();
        stray.on("users");
        assert!(!stray.to_sql().contains("REFERENCES"));
    }

    #[test]
    fn test_default_rendering() {
        assert_eq!(ColumnDefault::from("it's").to_string(), "'it''s'");
        assert_eq!(ColumnDefault::from(false).to_string(), "FALSE");
        assert_eq!(ColumnDefault::from(42).to_string(), "42");
        assert_eq!(ColumnDefault::raw("CURRENT_TIMESTAMP").to_string(), "CURRENT_TIMESTAMP");
        assert_eq!(ColumnDefault::Null.to_string(), "NULL");
    }

    #[test]
    fn test_identifier_quoting() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
