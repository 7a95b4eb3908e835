//! `SeaORM` Entity for ota_deployment table
//!
//! `target_devices` holds the JSON-encoded device ID list, fixed at
//! deployment creation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ota_deployment")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub deployment_id: String,
    pub release_id: String,
    pub strategy: String,
    #[sea_orm(column_type = "Text")]
    pub target_devices: String,
    pub rollout_percentage: Option<i32>,
    pub status: String,
    pub failure_threshold: i32,
    pub success_count: i32,
    pub failure_count: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
