use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

use crate::{
    client::DbClient,
    entities::{notices, sea_orm_active_enums::NoticeStatus},
};

impl DbClient {
    pub async fn get_notice(&self, order_id: &str) -> eyre::Result<Option<notices::Model>> {
        let notice = notices::Entity::find()
            .filter(notices::Column::OrderId.eq(order_id))
            .one(&self.primary)
            .await?;
        Ok(notice)
    }

    /// Notices the dispatcher has not delivered yet.
    pub async fn list_pending_notices(&self, limit: u64) -> eyre::Result<Vec<notices::Model>> {
        let rows = notices::Entity::find()
            .filter(notices::Column::NoticeStatus.eq(NoticeStatus::Default))
            .order_by_asc(notices::Column::Id)
            .limit(limit)
            .all(&self.primary)
            .await?;
        Ok(rows)
    }
}
