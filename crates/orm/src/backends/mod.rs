//! Database Backend Abstractions
//!
//! The execution handle consumed by the migration and seeding managers, plus
//! the MySQL implementation used in production.

pub mod core;
pub mod mysql;

pub use core::*;
pub use mysql::{MySqlBackend, MySqlPool};

/// Database backend type enumeration
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    MySQL,
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::MySQL => write!(f, "mysql"),
        }
    }
}

impl std::str::FromStr for DatabaseBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(DatabaseBackendType::MySQL),
            _ => Err(format!("Unsupported database backend: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_type_parsing() {
        assert_eq!("MySQL".parse::<DatabaseBackendType>(), Ok(DatabaseBackendType::MySQL));
        assert_eq!("mariadb".parse::<DatabaseBackendType>(), Ok(DatabaseBackendType::MySQL));
        assert!("oracle".parse::<DatabaseBackendType>().is_err());
        assert_eq!(DatabaseBackendType::MySQL.to_string(), "mysql");
    }
}
