use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "user_subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owned by the auth provider; one authoritative row per user.
    #[sea_orm(unique)]
    pub user_id: String,

    /// FREE | PRO | ENTERPRISE
    pub subscription_tier: String,

    pub is_active: bool,

    pub stripe_customer_id: Option<String>,

    pub stripe_subscription_id: Option<String>,

    /// Last known `cancel_at_period_end` flag from the billing provider.
    pub cancel_at_period_end: bool,

    pub subscription_start_date: Option<DateTimeUtc>,

    pub subscription_end_date: Option<DateTimeUtc>,

    pub created_at: DateTimeUtc,

    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
