use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "referrals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub referrer_id: Uuid,
    #[sea_orm(unique)]
    pub referred_user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    pub is_active: bool,
    pub total_deposited: f64,
    pub earnings_from_user: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
