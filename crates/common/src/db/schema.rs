//! Table bootstrap from the entity definitions.
//!
//! Used for tests and for `database.auto_migrate` deployments; production
//! schemas are otherwise owned by the migration tooling.

use crate::db::models::*;
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, EntityTrait, Schema};
use tracing::info;

/// Create every table (and the attachment label index) that does not exist yet.
/// Parents are created before children so foreign keys resolve.
pub async fn create_tables<C: ConnectionTrait>(conn: &C) -> Result<()> {
    create_table(conn, UserEntity).await?;
    create_table(conn, ProgramEntity).await?;
    create_table(conn, StudyTrackEntity).await?;
    create_table(conn, ProgramManagementEntity).await?;
    create_table(conn, ThesisEntity).await?;
    create_table(conn, SupervisionEntity).await?;
    create_table(conn, GraderEntity).await?;
    create_table(conn, AuthorEntity).await?;
    create_table(conn, AttachmentEntity).await?;

    // One attachment per label per thesis
    let index = Index::create()
        .if_not_exists()
        .name("attachments_thesis_id_label_key")
        .table(AttachmentEntity)
        .col(AttachmentColumn::ThesisId)
        .col(AttachmentColumn::Label)
        .unique()
        .to_owned();
    let backend = conn.get_database_backend();
    conn.execute(backend.build(&index)).await?;

    info!("Database schema ensured");
    Ok(())
}

async fn create_table<C, E>(conn: &C, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let backend = conn.get_database_backend();
    let mut statement = Schema::new(backend).create_table_from_entity(entity);
    statement.if_not_exists();
    conn.execute(backend.build(&statement)).await?;
    Ok(())
}
