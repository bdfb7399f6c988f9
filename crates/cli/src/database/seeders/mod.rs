//! Application seeders

mod user_seeder;

use plinth_orm::{OrmResult, Registry, Seeder};

pub use user_seeder::UserSeeder;

pub fn registry() -> OrmResult<Registry<dyn Seeder>> {
    let mut registry: Registry<dyn Seeder> = Registry::new();
    registry.register("UserSeeder", || Box::new(UserSeeder))?;
    Ok(registry)
}
