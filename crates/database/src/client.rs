use crate::entities::scan_cursors;
use sea_orm::{
    sea_query::OnConflict, ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

use tracing::{debug, error};

#[derive(Clone, Debug)]
pub struct DbClient {
    pub primary: DatabaseConnection,
}

/// One processed block of one chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorRecord {
    pub chain_id: u64,
    pub block_number: u64,
    pub block_hash: String,
    pub parent_hash: String,
}

impl From<scan_cursors::Model> for CursorRecord {
    fn from(model: scan_cursors::Model) -> Self {
        Self {
            chain_id: model.chain_id as u64,
            block_number: model.block_number as u64,
            block_hash: model.block_hash,
            parent_hash: model.parent_hash,
        }
    }
}

impl DbClient {
    pub fn new(primary: DatabaseConnection) -> Self {
        Self { primary }
    }

    /// Highest processed block recorded for the chain.
    pub async fn get_cursor(&self, chain_id: u64) -> eyre::Result<Option<CursorRecord>> {
        let res = scan_cursors::Entity::find()
            .filter(scan_cursors::Column::ChainId.eq(chain_id as i64))
            .order_by_desc(scan_cursors::Column::BlockNumber)
            .one(&self.primary)
            .await?;
        Ok(res.map(CursorRecord::from))
    }

    pub async fn get_cursor_at(
        &self,
        chain_id: u64,
        block_number: u64,
    ) -> eyre::Result<Option<CursorRecord>> {
        let res = scan_cursors::Entity::find_by_id((chain_id as i64, block_number as i64))
            .one(&self.primary)
            .await?;
        Ok(res.map(CursorRecord::from))
    }

    pub async fn list_cursors(&self, chain_id: u64) -> eyre::Result<Vec<CursorRecord>> {
        let rows = scan_cursors::Entity::find()
            .filter(scan_cursors::Column::ChainId.eq(chain_id as i64))
            .order_by_asc(scan_cursors::Column::BlockNumber)
            .all(&self.primary)
            .await?;
        Ok(rows.into_iter().map(CursorRecord::from).collect())
    }

    pub async fn upsert_cursor(&self, record: &CursorRecord) -> eyre::Result<()> {
        self.bulk_upsert_cursors(std::slice::from_ref(record)).await
    }

    pub async fn bulk_upsert_cursors(&self, records: &[CursorRecord]) -> eyre::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let models = records.iter().map(|r| scan_cursors::ActiveModel {
            chain_id: Set(r.chain_id as i64),
            block_number: Set(r.block_number as i64),
            block_hash: Set(r.block_hash.clone()),
            parent_hash: Set(r.parent_hash.clone()),
        });

        scan_cursors::Entity::insert_many(models)
            .on_conflict(
                OnConflict::columns([
                    scan_cursors::Column::ChainId,
                    scan_cursors::Column::BlockNumber,
                ])
                .update_columns([
                    scan_cursors::Column::BlockHash,
                    scan_cursors::Column::ParentHash,
                ])
                .to_owned(),
            )
            .exec_without_returning(&self.primary)
            .await
            .map_err(|e: DbErr| {
                error!("Failed to upsert scan cursors: {:?}", e);
                eyre::eyre!("Failed to upsert scan cursors: {:?}", e)
            })?;

        Ok(())
    }

    pub async fn delete_cursor(&self, chain_id: u64, block_number: u64) -> eyre::Result<u64> {
        let res = scan_cursors::Entity::delete_many()
            .filter(scan_cursors::Column::ChainId.eq(chain_id as i64))
            .filter(scan_cursors::Column::BlockNumber.eq(block_number as i64))
            .exec(&self.primary)
            .await?;
        Ok(res.rows_affected)
    }

    /// Deletes every cursor row of the chain strictly below `block_number`.
    pub async fn prune_cursors_below(&self, chain_id: u64, block_number: u64) -> eyre::Result<u64> {
        let res = scan_cursors::Entity::delete_many()
            .filter(scan_cursors::Column::ChainId.eq(chain_id as i64))
            .filter(scan_cursors::Column::BlockNumber.lt(block_number as i64))
            .exec(&self.primary)
            .await?;
        if res.rows_affected > 0 {
            debug!(
                "Pruned {} cursor rows below block {} for chain {}",
                res.rows_affected, block_number, chain_id
            );
        }
        Ok(res.rows_affected)
    }
}
