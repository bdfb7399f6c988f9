use async_trait::async_trait;
use plinth_orm::{Migration, OrmResult, Schema};

pub struct CreateUsersTable;

#[async_trait]
impl Migration for CreateUsersTable {
    async fn up(&self, schema: &Schema<'_>) -> OrmResult<()> {
        schema
            .create_table("users", |table| {
                table.id();
                table.string("name");
                table.string("email").unique();
                table.string("password");
                table.boolean("active").default(true);
                table.timestamps();
            })
            .await
    }

    async fn down(&self, schema: &Schema<'_>) -> OrmResult<()> {
        schema.drop_table("users").await
    }
}
