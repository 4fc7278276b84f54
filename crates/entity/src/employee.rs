use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "employee")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub section: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::overtime_record::Entity")]
    OvertimeRecord,
}

impl Related<super::overtime_record::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OvertimeRecord.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
