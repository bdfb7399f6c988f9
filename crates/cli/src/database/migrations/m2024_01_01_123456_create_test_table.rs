use async_trait::async_trait;
use plinth_orm::{Migration, OrmResult, Schema};

pub struct CreateTestTable;

#[async_trait]
impl Migration for CreateTestTable {
    async fn up(&self, schema: &Schema<'_>) -> OrmResult<()> {
        schema
            .create_table("test_table", |table| {
                table.id();
                table.string("name");
                table.timestamps();
            })
            .await
    }

    async fn down(&self, schema: &Schema<'_>) -> OrmResult<()> {
        schema.drop_table("test_table").await
    }
}
