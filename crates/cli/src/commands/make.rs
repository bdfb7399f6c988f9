use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use plinth_orm::{migration_identifier, snake_case};

/// Write a migration skeleton into `dir`, returning its path
pub fn migration(dir: &Path, name: &str, now: DateTime<Utc>) -> Result<PathBuf> {
    let slug = snake_case(name);
    if slug.is_empty() {
        bail!("Migration name '{}' has no usable characters", name);
    }

    let identifier = migration_identifier(&slug, now);
    let module = format!("m{}", identifier);
    let struct_name = pascal_case(&slug);
    let table = guess_table(&slug);

    let path = dir.join(format!("{}.rs", module));
    write_new(&path, &migration_template(&struct_name, &table))?;

    println!("✓ Created migration: {}", path.display());
    println!("  Register it in {}/mod.rs:", dir.display());
    println!("    mod {};", module);
    println!(
        "    .register(\"{}\", || Box::new({}::{}))?",
        identifier, module, struct_name
    );
    Ok(path)
}

/// Write a seeder skeleton into `dir`, returning its path
pub fn seeder(dir: &Path, name: &str) -> Result<PathBuf> {
    let mut struct_name = pascal_case(&snake_case(name));
    if struct_name.is_empty() {
        bail!("Seeder name '{}' has no usable characters", name);
    }
    if !struct_name.ends_with("Seeder") {
        struct_name.push_str("Seeder");
    }

    let module = snake_case(&struct_name);
    let path = dir.join(format!("{}.rs", module));
    write_new(&path, &seeder_template(&struct_name))?;

    println!("✓ Created seeder: {}", path.display());
    println!("  Register it in {}/mod.rs:", dir.display());
    println!("    mod {};", module);
    println!(
        "    registry.register(\"{}\", || Box::new({}::{}))?;",
        struct_name, module, struct_name
    );
    Ok(path)
}

fn write_new(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn pascal_case(snake: &str) -> String {
    snake
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// `create_posts_table` -> `posts`; anything else -> `table_name`
fn guess_table(slug: &str) -> String {
    slug.strip_prefix("create_")
        .and_then(|rest| rest.strip_suffix("_table"))
        .filter(|table| !table.is_empty())
        .unwrap_or("table_name")
        .to_string()
}

fn migration_template(struct_name: &str, table: &str) -> String {
    format!(
        r#"use async_trait::async_trait;
use plinth_orm::{{Migration, OrmResult, Schema}};

pub struct {struct_name};

#[async_trait]
impl Migration for {struct_name} {{
    async fn up(&self, schema: &Schema<'_>) -> OrmResult<()> {{
        schema
            .create_table("{table}", |table| {{
                table.id();
                table.timestamps();
            }})
            .await
    }}

    async fn down(&self, schema: &Schema<'_>) -> OrmResult<()> {{
        schema.drop_table("{table}").await
    }}
}}
"#
    )
}

fn seeder_template(struct_name: &str) -> String {
    format!(
        r#"use async_trait::async_trait;
use plinth_orm::{{OrmResult, SeedContext, Seeder}};

pub struct {struct_name};

#[async_trait]
impl Seeder for {struct_name} {{
    async fn run(&self, _ctx: &SeedContext<'_>) -> OrmResult<()> {{
        Ok(())
    }}
}}
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn test_make_migration() {
        let dir = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        let path = migration(dir.path(), "CreatePostsTable", now).unwrap();

        assert_eq!(
            path.file_name().unwrap(),
            "m2024_05_06_070809_create_posts_table.rs"
        );
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("pub struct CreatePostsTable;"));
        assert!(contents.contains(".create_table(\"posts\""));
        assert!(contents.contains("schema.drop_table(\"posts\")"));
    }

    #[test]
    fn test_make_migration_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        migration(dir.path(), "add index", now).unwrap();
        assert!(migration(dir.path(), "add index", now).is_err());
        assert!(migration(dir.path(), "!!!", now).is_err());
    }

    #[test]
    fn test_make_seeder() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("database/seeders");

        let path = seeder(&nested, "post").unwrap();

        assert_eq!(path, nested.join("post_seeder.rs"));
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("impl Seeder for PostSeeder"));
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(pascal_case("create_users_table"), "CreateUsersTable");
        assert_eq!(guess_table("create_users_table"), "users");
        assert_eq!(guess_table("add_email_to_users"), "table_name");
    }
}
