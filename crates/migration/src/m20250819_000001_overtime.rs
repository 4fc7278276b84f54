use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Employee {
    Table,
    Id,
    EmployeeId,
    Name,
    Email,
    Section,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum OvertimeRecord {
    Table,
    Id,
    EmployeeId,
    OvertimeDate,
    CalculationBasedOnTime,
    PlanOvertimeHour,
    DateIn,
    FromTime,
    DateOut,
    ToTime,
    BreakFromTime,
    BreakToTime,
    Reason,
    CreatedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;
#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Employee::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Employee::Id).uuid().not_null().primary_key())
                    .col(
                        ColumnDef::new(Employee::EmployeeId)
                            .string_len(20)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Employee::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Employee::Email).string_len(320))
                    .col(ColumnDef::new(Employee::Section).string_len(100))
                    .col(
                        ColumnDef::new(Employee::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Employee::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OvertimeRecord::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OvertimeRecord::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OvertimeRecord::EmployeeId).string_len(20).not_null())
                    .col(ColumnDef::new(OvertimeRecord::OvertimeDate).date().not_null())
                    .col(
                        ColumnDef::new(OvertimeRecord::CalculationBasedOnTime)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OvertimeRecord::PlanOvertimeHour).double().not_null())
                    .col(ColumnDef::new(OvertimeRecord::DateIn).date().not_null())
                    .col(ColumnDef::new(OvertimeRecord::FromTime).time().not_null())
                    .col(ColumnDef::new(OvertimeRecord::DateOut).date().not_null())
                    .col(ColumnDef::new(OvertimeRecord::ToTime).time().not_null())
                    .col(ColumnDef::new(OvertimeRecord::BreakFromTime).time())
                    .col(ColumnDef::new(OvertimeRecord::BreakToTime).time())
                    .col(ColumnDef::new(OvertimeRecord::Reason).text().not_null())
                    .col(ColumnDef::new(OvertimeRecord::CreatedBy).uuid())
                    .col(
                        ColumnDef::new(OvertimeRecord::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(OvertimeRecord::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_overtime_record_employee")
                            .from(OvertimeRecord::Table, OvertimeRecord::EmployeeId)
                            .to(Employee::Table, Employee::EmployeeId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_overtime_record_employee")
                    .table(OvertimeRecord::Table)
                    .col(OvertimeRecord::EmployeeId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_overtime_record_date")
                    .table(OvertimeRecord::Table)
                    .col(OvertimeRecord::OvertimeDate)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OvertimeRecord::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Employee::Table).if_exists().to_owned())
            .await?;
        Ok(())
    }
}
