use crate::auth::{
    AuthConfig, CurrentUser, SESSION_COOKIE, hash_password, issue_token, verify_password,
};
use crate::session::SessionRegistry;
use std::sync::Arc;

use async_graphql::{
    Context, EmptySubscription, Enum, ErrorExtensions, InputObject, Object, Schema, SimpleObject,
    ID,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use entity::{admin_settings, employee, overtime_record, profile, user_secret};
use platform_api::{ApiError, ApiResult, FieldIssue, IntoGraphql};
use products_overtime::{
    DATE_FORMAT, OvertimeForm, Role, TIME_FORMAT,
    access::{self, Access, Decision, Page},
    derive_checkout,
    report::{self, ReportFilter, ReportRow, ReportSummary},
    validation::{self, EmployeeForm, GraphSettingsForm, PasswordChange, ValidationErrors},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, SqlErr, TransactionTrait, sea_query::OnConflict,
};
use tracing::{Instrument, info, info_span, instrument};
use uuid::Uuid;

pub type OvertimeSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub struct AppSchema(pub OvertimeSchema);

/// Credentials for the Microsoft Graph integration that never touch the database.
#[derive(Clone, Debug, Default)]
pub struct GraphCredentials {
    pub client_secret: Option<String>,
}

impl GraphCredentials {
    pub fn is_configured(&self) -> bool {
        self.client_secret
            .as_deref()
            .is_some_and(|secret| !secret.trim().is_empty())
    }
}

pub fn build_schema(
    db: Arc<DatabaseConnection>,
    auth: Arc<AuthConfig>,
    sessions: SessionRegistry,
    graph: GraphCredentials,
) -> AppSchema {
    let schema = Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(db)
        .data(auth)
        .data(sessions)
        .data(graph)
        .finish();
    AppSchema(schema)
}

pub struct QueryRoot;
pub struct MutationRoot;

#[derive(Enum, Copy, Clone, Debug, Eq, PartialEq)]
pub enum UserRole {
    Admin,
    User,
    Guest,
}

impl From<Role> for UserRole {
    fn from(value: Role) -> Self {
        match value {
            Role::Admin => UserRole::Admin,
            Role::User => UserRole::User,
            Role::Guest => UserRole::Guest,
        }
    }
}

impl From<UserRole> for Role {
    fn from(value: UserRole) -> Self {
        match value {
            UserRole::Admin => Role::Admin,
            UserRole::User => Role::User,
            UserRole::Guest => Role::Guest,
        }
    }
}

impl From<profile::Role> for UserRole {
    fn from(value: profile::Role) -> Self {
        match value {
            profile::Role::Admin => UserRole::Admin,
            profile::Role::User => UserRole::User,
            profile::Role::Guest => UserRole::Guest,
        }
    }
}

impl From<UserRole> for profile::Role {
    fn from(value: UserRole) -> Self {
        match value {
            UserRole::Admin => profile::Role::Admin,
            UserRole::User => profile::Role::User,
            UserRole::Guest => profile::Role::Guest,
        }
    }
}

fn domain_role(value: profile::Role) -> Role {
    UserRole::from(value).into()
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Page")]
pub struct PageNode {
    pub path: String,
    pub title: String,
    pub allows_guests: bool,
    pub requires_admin: bool,
}

impl From<Page> for PageNode {
    fn from(page: Page) -> Self {
        let access = page.access();
        Self {
            path: page.path().to_string(),
            title: page.title().to_string(),
            allows_guests: access.allows_guests,
            requires_admin: access.requires_admin,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct RouteResolution {
    pub page: PageNode,
    pub allowed: bool,
    pub redirect_to: Option<String>,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "Employee")]
pub struct EmployeeNode {
    pub id: ID,
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub section: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<employee::Model> for EmployeeNode {
    fn from(model: employee::Model) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            employee_id: model.employee_id,
            name: model.name,
            email: model.email,
            section: model.section,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "OvertimeRecord")]
pub struct OvertimeRecordNode {
    pub id: ID,
    pub employee_id: String,
    pub employee_name: Option<String>,
    pub overtime_date: NaiveDate,
    pub calculation_based_on_time: bool,
    pub plan_overtime_hour: f64,
    pub date_in: NaiveDate,
    /// `HH:MM`
    pub from_time: String,
    pub date_out: NaiveDate,
    /// `HH:MM`
    pub to_time: String,
    pub break_from_time: Option<String>,
    pub break_to_time: Option<String>,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl OvertimeRecordNode {
    fn from_model(model: overtime_record::Model, employee_name: Option<String>) -> Self {
        Self {
            id: ID::from(model.id.to_string()),
            employee_id: model.employee_id,
            employee_name,
            overtime_date: model.overtime_date,
            calculation_based_on_time: model.calculation_based_on_time,
            plan_overtime_hour: model.plan_overtime_hour,
            date_in: model.date_in,
            from_time: report::format_time(model.from_time),
            date_out: model.date_out,
            to_time: report::format_time(model.to_time),
            break_from_time: model.break_from_time.map(report::format_time),
            break_to_time: model.break_to_time.map(report::format_time),
            reason: model.reason,
            created_at: model.created_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct ReportSummaryNode {
    pub records: i64,
    pub total_hours: f64,
    pub unique_employees: i64,
}

impl From<ReportSummary> for ReportSummaryNode {
    fn from(summary: ReportSummary) -> Self {
        Self {
            records: summary.records as i64,
            total_hours: summary.total_hours,
            unique_employees: summary.unique_employees as i64,
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct OvertimeReport {
    pub rows: Vec<OvertimeRecordNode>,
    pub summary: ReportSummaryNode,
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CsvExport {
    pub filename: String,
    pub content: String,
    pub rows: i64,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "AdminSettings")]
pub struct AdminSettingsNode {
    pub ms_graph_enabled: bool,
    pub ms_graph_tenant_id: Option<String>,
    pub ms_graph_client_id: Option<String>,
    /// Whether the client secret was supplied to the server out-of-band.
    pub client_secret_configured: bool,
}

#[derive(Clone, Debug, SimpleObject)]
#[graphql(name = "User")]
pub struct UserNode {
    pub id: ID,
    pub email: String,
    pub display_name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<profile::Model> for UserNode {
    fn from(model: profile::Model) -> Self {
        Self {
            id: ID::from(model.user_id.to_string()),
            email: model.email,
            display_name: model.display_name,
            role: model.role.into(),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct MePayload {
    pub user: UserNode,
    pub navigation: Vec<PageNode>,
}

#[derive(Clone, Debug, SimpleObject, Default)]
pub struct AuthPayload {
    pub ok: bool,
    pub user: Option<UserNode>,
    /// Same token as the session cookie, for clients that send `Authorization: Bearer`.
    pub token: Option<String>,
    pub error: Option<String>,
}

impl AuthPayload {
    fn rejected(message: &str) -> Self {
        Self {
            ok: false,
            error: Some(message.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, SimpleObject)]
pub struct CheckoutPreview {
    /// `DD.MM.YYYY`
    pub date_in: String,
    pub date_out: String,
    /// `HH:MM`
    pub to_time: String,
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct OvertimeFilterInput {
    pub search: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl From<OvertimeFilterInput> for ReportFilter {
    fn from(input: OvertimeFilterInput) -> Self {
        ReportFilter {
            search: input.search,
            start_date: input.start_date,
            end_date: input.end_date,
        }
    }
}

#[derive(Clone, Debug, InputObject)]
pub struct EmployeeInput {
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub section: Option<String>,
}

impl From<EmployeeInput> for EmployeeForm {
    fn from(input: EmployeeInput) -> Self {
        EmployeeForm {
            employee_id: input.employee_id,
            name: input.name,
            email: input.email,
            section: input.section,
        }
    }
}

/// One overtime entry plus the employee's display fields, applied together.
#[derive(Clone, Debug, InputObject)]
pub struct SubmitOvertimeInput {
    pub employee_id: String,
    /// `DD.MM.YYYY`
    pub overtime_date: String,
    #[graphql(default)]
    pub calculation_based_on_time: bool,
    pub plan_overtime_hour: f64,
    /// `HH:MM`
    pub from_time: String,
    pub break_from_time: Option<String>,
    pub break_to_time: Option<String>,
    pub reason: String,
    pub name: Option<String>,
    pub section: Option<String>,
    pub email: Option<String>,
}

impl SubmitOvertimeInput {
    fn form(&self) -> OvertimeForm {
        OvertimeForm {
            employee_id: self.employee_id.clone(),
            overtime_date: self.overtime_date.clone(),
            calculation_based_on_time: self.calculation_based_on_time,
            plan_overtime_hour: self.plan_overtime_hour,
            from_time: self.from_time.clone(),
            break_from_time: self.break_from_time.clone(),
            break_to_time: self.break_to_time.clone(),
            reason: self.reason.clone(),
        }
    }
}

/// Field-by-field correction of a stored record. Derived fields are taken
/// as given and never recomputed.
#[derive(Clone, Debug, InputObject)]
pub struct UpdateOvertimeRecordInput {
    pub id: ID,
    pub overtime_date: Option<String>,
    pub calculation_based_on_time: Option<bool>,
    pub plan_overtime_hour: Option<f64>,
    pub date_in: Option<String>,
    pub from_time: Option<String>,
    pub date_out: Option<String>,
    pub to_time: Option<String>,
    /// Empty string clears the value.
    pub break_from_time: Option<String>,
    pub break_to_time: Option<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct AdminSettingsInput {
    pub ms_graph_enabled: bool,
    pub ms_graph_tenant_id: Option<String>,
    pub ms_graph_client_id: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct SendReportInput {
    pub recipient: String,
    pub subject: String,
    pub message: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Clone, Debug, InputObject)]
pub struct NewUserInput {
    pub email: String,
    pub password: String,
    pub display_name: Option<String>,
    #[graphql(default_with = "UserRole::Guest")]
    pub role: UserRole,
}

#[derive(Clone, Debug, InputObject)]
pub struct UpdateUserInput {
    pub id: ID,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[Object]
impl QueryRoot {
    /// The signed-in profile, or `null` for anonymous callers.
    async fn me(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<MePayload>> {
        let Some(viewer) = viewer(ctx) else {
            return Ok(None);
        };
        let db = database(ctx).into_graphql()?;
        let profile = find_profile(db.as_ref(), viewer.user_id)
            .await
            .into_graphql()?;
        let role = domain_role(profile.role);
        Ok(Some(MePayload {
            user: profile.into(),
            navigation: navigation_for(Some(role)),
        }))
    }

    /// Pages the caller may open, in menu order.
    async fn navigation(&self, ctx: &Context<'_>) -> Vec<PageNode> {
        navigation_for(viewer(ctx).map(|user| user.role))
    }

    async fn route(
        &self,
        ctx: &Context<'_>,
        path: String,
    ) -> async_graphql::Result<RouteResolution> {
        let identity = viewer(ctx).map(|user| user.role);
        let (page, decision) = access::resolve(&path, identity)
            .ok_or_else(|| ApiError::not_found(format!("Page {path}")))
            .into_graphql()?;
        Ok(RouteResolution {
            page: page.into(),
            allowed: decision.is_allowed(),
            redirect_to: decision.redirect_target().map(str::to_string),
        })
    }

    async fn employees(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<EmployeeNode>> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        list_employees(db.as_ref(), q.as_deref()).await.into_graphql()
    }

    async fn employee(
        &self,
        ctx: &Context<'_>,
        employee_id: String,
    ) -> async_graphql::Result<Option<EmployeeNode>> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let record = find_employee(db.as_ref(), employee_id.trim())
            .await
            .into_graphql()?;
        Ok(record.map(EmployeeNode::from))
    }

    async fn overtime_records(
        &self,
        ctx: &Context<'_>,
        filter: Option<OvertimeFilterInput>,
    ) -> async_graphql::Result<Vec<OvertimeRecordNode>> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let filter: ReportFilter = filter.unwrap_or_default().into();
        let records = load_records(db.as_ref(), &filter, RecordOrder::NewestFirst)
            .await
            .into_graphql()?;
        Ok(records
            .into_iter()
            .map(|(record, name)| OvertimeRecordNode::from_model(record, name))
            .collect())
    }

    async fn overtime_report(
        &self,
        ctx: &Context<'_>,
        filter: Option<OvertimeFilterInput>,
    ) -> async_graphql::Result<OvertimeReport> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let filter: ReportFilter = filter.unwrap_or_default().into();
        let records = load_records(db.as_ref(), &filter, RecordOrder::NewestFirst)
            .await
            .into_graphql()?;
        let report_rows: Vec<ReportRow> = records
            .iter()
            .map(|(record, name)| report_row(record, name.as_deref()))
            .collect();
        Ok(OvertimeReport {
            summary: ReportSummary::of(&report_rows).into(),
            rows: records
                .into_iter()
                .map(|(record, name)| OvertimeRecordNode::from_model(record, name))
                .collect(),
        })
    }

    async fn overtime_csv(
        &self,
        ctx: &Context<'_>,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> async_graphql::Result<CsvExport> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        export_overtime_csv(
            db.as_ref(),
            ReportFilter::date_range(start_date, end_date),
            Utc::now().date_naive(),
        )
        .await
        .into_graphql()
    }

    async fn admin_settings(&self, ctx: &Context<'_>) -> async_graphql::Result<AdminSettingsNode> {
        let admin = require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let graph = graph_credentials(ctx);
        let stored = admin_settings::Entity::find()
            .filter(admin_settings::Column::UserId.eq(admin.user_id))
            .one(db.as_ref())
            .await
            .map_err(db_error)
            .into_graphql()?;
        Ok(settings_node(stored, &graph))
    }

    async fn users(
        &self,
        ctx: &Context<'_>,
        q: Option<String>,
    ) -> async_graphql::Result<Vec<UserNode>> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        list_users(db.as_ref(), q.as_deref()).await.into_graphql()
    }

    /// Live preview of the check-out date and time for the entry form.
    async fn derive_checkout(
        &self,
        overtime_date: String,
        from_time: String,
        plan_overtime_hour: f64,
    ) -> async_graphql::Result<CheckoutPreview> {
        preview_checkout(&overtime_date, &from_time, plan_overtime_hour).into_graphql()
    }
}

#[Object]
impl MutationRoot {
    async fn sign_up(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
        display_name: Option<String>,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx).into_graphql()?;
        let account = NewAccount::validate(&email, &password, display_name.as_deref(), Role::Guest)
            .into_graphql()?;
        let span = info_span!("auth.sign_up", email = %account.email);
        let profile = create_account(db.as_ref(), account)
            .instrument(span)
            .await
            .into_graphql()?;
        start_session(ctx, profile).into_graphql()
    }

    async fn login(
        &self,
        ctx: &Context<'_>,
        email: String,
        password: String,
    ) -> async_graphql::Result<AuthPayload> {
        let db = database(ctx).into_graphql()?;
        let Ok(email) = validation::email(&email) else {
            return Ok(AuthPayload::rejected("Invalid credentials"));
        };
        let found = profile::Entity::find()
            .filter(profile::Column::Email.eq(email.as_str()))
            .find_also_related(user_secret::Entity)
            .one(db.as_ref())
            .await
            .map_err(db_error)
            .into_graphql()?;
        let Some((profile, Some(secret))) = found else {
            return Ok(AuthPayload::rejected("Invalid credentials"));
        };
        if !verify_password(&password, &secret.password_hash) {
            info!(%email, "rejected login");
            return Ok(AuthPayload::rejected("Invalid credentials"));
        }
        start_session(ctx, profile).into_graphql()
    }

    async fn logout(&self, ctx: &Context<'_>) -> async_graphql::Result<bool> {
        if let Some(viewer) = viewer(ctx) {
            sessions(ctx).into_graphql()?.end(viewer.session_id);
        }
        append_session_cookie(ctx, "", -1);
        Ok(true)
    }

    async fn change_password(
        &self,
        ctx: &Context<'_>,
        new_password: String,
        confirm_password: String,
    ) -> async_graphql::Result<bool> {
        let viewer = require_signed_in(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let change = PasswordChange {
            new_password,
            confirm_password,
        };
        let password = change.validate().map_err(validation_failed).into_graphql()?;
        let span = info_span!("auth.change_password", user_id = %viewer.user_id);
        store_password(db.as_ref(), viewer.user_id, password)
            .instrument(span)
            .await
            .into_graphql()?;
        Ok(true)
    }

    async fn register_employee(
        &self,
        ctx: &Context<'_>,
        input: EmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        authorize(ctx, Page::EmployeeRegistration.access()).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let span = info_span!("overtime.employees.register", employee_id = %input.employee_id);
        register_employee_internal(db.as_ref(), input.into())
            .instrument(span)
            .await
            .into_graphql()
    }

    async fn update_employee(
        &self,
        ctx: &Context<'_>,
        input: EmployeeInput,
    ) -> async_graphql::Result<EmployeeNode> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let span = info_span!("overtime.employees.update", employee_id = %input.employee_id);
        update_employee_internal(db.as_ref(), input.into())
            .instrument(span)
            .await
            .into_graphql()
    }

    async fn delete_employee(
        &self,
        ctx: &Context<'_>,
        employee_id: String,
    ) -> async_graphql::Result<bool> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let result = employee::Entity::delete_many()
            .filter(employee::Column::EmployeeId.eq(employee_id.trim()))
            .exec(db.as_ref())
            .await
            .map_err(db_error)
            .into_graphql()?;
        if result.rows_affected == 0 {
            return Err(ApiError::not_found("Employee").extend());
        }
        info!(employee_id = %employee_id.trim(), "employee deleted");
        Ok(true)
    }

    /// Validate, derive and store one overtime entry. Guests may submit.
    async fn submit_overtime(
        &self,
        ctx: &Context<'_>,
        input: SubmitOvertimeInput,
    ) -> async_graphql::Result<OvertimeRecordNode> {
        let submitter = authorize(ctx, Page::OvertimeInput.access()).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let span = info_span!(
            "overtime.records.submit",
            employee_id = %input.employee_id,
            hours = input.plan_overtime_hour,
            guest = submitter.is_none()
        );
        submit_overtime_internal(db.as_ref(), input, submitter.map(|user| user.user_id))
            .instrument(span)
            .await
            .into_graphql()
    }

    async fn update_overtime_record(
        &self,
        ctx: &Context<'_>,
        input: UpdateOvertimeRecordInput,
    ) -> async_graphql::Result<OvertimeRecordNode> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let span = info_span!("overtime.records.update", id = %input.id.as_str());
        update_overtime_record_internal(db.as_ref(), input)
            .instrument(span)
            .await
            .into_graphql()
    }

    async fn delete_overtime_record(
        &self,
        ctx: &Context<'_>,
        id: ID,
    ) -> async_graphql::Result<bool> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let record_id = parse_uuid(&id, "id").into_graphql()?;
        let result = overtime_record::Entity::delete_by_id(record_id)
            .exec(db.as_ref())
            .await
            .map_err(db_error)
            .into_graphql()?;
        if result.rows_affected == 0 {
            return Err(ApiError::not_found("Overtime record").extend());
        }
        Ok(true)
    }

    async fn save_admin_settings(
        &self,
        ctx: &Context<'_>,
        input: AdminSettingsInput,
    ) -> async_graphql::Result<AdminSettingsNode> {
        let admin = require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let form = GraphSettingsForm {
            enabled: input.ms_graph_enabled,
            tenant_id: input.ms_graph_tenant_id,
            client_id: input.ms_graph_client_id,
        };
        let settings = form.validate().map_err(validation_failed).into_graphql()?;
        let span = info_span!(
            "settings.save",
            user_id = %admin.user_id,
            enabled = settings.enabled
        );
        let stored = save_settings_internal(db.as_ref(), admin.user_id, settings)
            .instrument(span)
            .await
            .into_graphql()?;
        Ok(settings_node(Some(stored), &graph_credentials(ctx)))
    }

    /// Email delivery through Microsoft Graph is not wired up yet; the input
    /// is still validated so the form reports mistakes first.
    async fn send_overtime_report(
        &self,
        ctx: &Context<'_>,
        input: SendReportInput,
    ) -> async_graphql::Result<bool> {
        require_admin(ctx).into_graphql()?;
        let mut errors = ValidationErrors::new();
        errors.check("recipient", validation::email(&input.recipient));
        if input.subject.trim().is_empty() {
            errors.push("subject", "Subject is required");
        }
        if let (Some(start), Some(end)) = (input.start_date, input.end_date) {
            if start > end {
                errors.push("endDate", "End date must not be before start date");
            }
        }
        errors.into_result().map_err(validation_failed).into_graphql()?;
        Err(
            ApiError::NotImplemented("Sending reports by email is not available yet".into())
                .extend(),
        )
    }

    async fn create_user(
        &self,
        ctx: &Context<'_>,
        input: NewUserInput,
    ) -> async_graphql::Result<UserNode> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let account = NewAccount::validate(
            &input.email,
            &input.password,
            input.display_name.as_deref(),
            input.role.into(),
        )
        .into_graphql()?;
        let span = info_span!("users.create", email = %account.email, role = %account.role);
        let profile = create_account(db.as_ref(), account)
            .instrument(span)
            .await
            .into_graphql()?;
        Ok(profile.into())
    }

    async fn update_user(
        &self,
        ctx: &Context<'_>,
        input: UpdateUserInput,
    ) -> async_graphql::Result<UserNode> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        update_user_internal(db.as_ref(), input).await.into_graphql()
    }

    async fn update_user_role(
        &self,
        ctx: &Context<'_>,
        id: ID,
        role: UserRole,
    ) -> async_graphql::Result<UserNode> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let user_id = parse_uuid(&id, "id").into_graphql()?;
        let span = info_span!("users.update_role", %user_id, role = ?role);
        let updated = set_role_internal(db.as_ref(), user_id, role)
            .instrument(span)
            .await
            .into_graphql()?;
        // Role is baked into the session token, so existing sessions must sign in again.
        sessions(ctx).into_graphql()?.end_all_for(user_id);
        Ok(updated)
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: ID) -> async_graphql::Result<bool> {
        require_admin(ctx).into_graphql()?;
        let db = database(ctx).into_graphql()?;
        let user_id = parse_uuid(&id, "id").into_graphql()?;
        let result = profile::Entity::delete_many()
            .filter(profile::Column::UserId.eq(user_id))
            .exec(db.as_ref())
            .await
            .map_err(db_error)
            .into_graphql()?;
        if result.rows_affected == 0 {
            return Err(ApiError::not_found("User").extend());
        }
        let ended = sessions(ctx).into_graphql()?.end_all_for(user_id);
        info!(%user_id, ended_sessions = ended, "user deleted");
        Ok(true)
    }
}

fn database(ctx: &Context<'_>) -> ApiResult<Arc<DatabaseConnection>> {
    ctx.data::<Arc<DatabaseConnection>>()
        .cloned()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("missing database connection")))
}

fn auth_config(ctx: &Context<'_>) -> ApiResult<Arc<AuthConfig>> {
    ctx.data::<Arc<AuthConfig>>()
        .cloned()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("missing auth configuration")))
}

fn sessions(ctx: &Context<'_>) -> ApiResult<SessionRegistry> {
    ctx.data::<SessionRegistry>()
        .cloned()
        .map_err(|_| ApiError::internal(anyhow::anyhow!("missing session registry")))
}

fn graph_credentials(ctx: &Context<'_>) -> GraphCredentials {
    ctx.data_opt::<GraphCredentials>().cloned().unwrap_or_default()
}

fn viewer(ctx: &Context<'_>) -> Option<CurrentUser> {
    ctx.data_opt::<CurrentUser>().cloned()
}

/// Gate an operation exactly like the page it belongs to.
fn authorize(ctx: &Context<'_>, requirement: Access) -> ApiResult<Option<CurrentUser>> {
    let viewer = viewer(ctx);
    match access::decide(viewer.as_ref().map(|user| user.role), requirement) {
        Decision::Render => Ok(viewer),
        Decision::RedirectLogin => Err(ApiError::Unauthenticated),
        Decision::RedirectHome => Err(ApiError::Forbidden),
    }
}

fn require_signed_in(ctx: &Context<'_>) -> ApiResult<CurrentUser> {
    authorize(ctx, Access::SIGNED_IN)?.ok_or(ApiError::Unauthenticated)
}

fn require_admin(ctx: &Context<'_>) -> ApiResult<CurrentUser> {
    authorize(ctx, Access::ADMIN)?.ok_or(ApiError::Unauthenticated)
}

fn navigation_for(identity: Option<Role>) -> Vec<PageNode> {
    access::navigation(identity)
        .into_iter()
        .map(PageNode::from)
        .collect()
}

fn parse_uuid(id: &ID, field: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id.as_str()).map_err(|_| ApiError::field(field, "Invalid ID"))
}

fn db_error(err: DbErr) -> ApiError {
    ApiError::internal(anyhow::Error::new(err).context("database error"))
}

/// A unique-key violation becomes `CONFLICT` with `message`; anything else is internal.
fn unique_or_db_error(err: DbErr, message: impl Into<String>) -> ApiError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ApiError::Conflict(message.into()),
        _ => db_error(err),
    }
}

const EMAIL_TAKEN: &str = "An account with this email already exists";

fn validation_failed(errors: ValidationErrors) -> ApiError {
    ApiError::Validation(
        errors
            .errors()
            .iter()
            .map(|err| FieldIssue {
                field: err.field.clone(),
                message: err.message.clone(),
            })
            .collect(),
    )
}

fn now() -> DateTimeWithTimeZone {
    Utc::now().into()
}

fn append_session_cookie(ctx: &Context<'_>, token: &str, ttl_minutes: i64) {
    let cookie = if ttl_minutes < 0 {
        format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
    } else {
        format!(
            "{SESSION_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
            ttl_minutes * 60
        )
    };
    ctx.append_http_header("Set-Cookie", cookie);
}

/// Open a server-side session for `profile`, issue its token and set the cookie.
fn start_session(ctx: &Context<'_>, profile: profile::Model) -> ApiResult<AuthPayload> {
    let auth = auth_config(ctx)?;
    let registry = sessions(ctx)?;
    let role = domain_role(profile.role);
    let session_id = registry.open(profile.user_id);
    let token = issue_token(profile.user_id, session_id, role, &auth).map_err(|err| {
        registry.end(session_id);
        ApiError::internal(anyhow::Error::new(err).context("failed to issue session token"))
    })?;
    append_session_cookie(ctx, &token, auth.session_ttl_minutes);
    info!(user_id = %profile.user_id, %role, %session_id, "session started");
    Ok(AuthPayload {
        ok: true,
        user: Some(profile.into()),
        token: Some(token),
        error: None,
    })
}

fn preview_checkout(
    overtime_date: &str,
    from_time: &str,
    plan_overtime_hour: f64,
) -> ApiResult<CheckoutPreview> {
    let mut errors = ValidationErrors::new();
    let date = errors.check("overtimeDate", validation::overtime_date(overtime_date));
    let from = errors.check("fromTime", validation::time_of_day(from_time));
    let hours = errors.check("planOvertimeHour", validation::plan_hours(plan_overtime_hour));
    let (Some(date), Some(from), Some(hours)) = (date, from, hours) else {
        return Err(validation_failed(errors));
    };
    let (date_out, to_time) = derive_checkout(date, from, hours);
    Ok(CheckoutPreview {
        date_in: date.format(DATE_FORMAT).to_string(),
        date_out: date_out.format(DATE_FORMAT).to_string(),
        to_time: to_time.format(TIME_FORMAT).to_string(),
    })
}

async fn find_employee<C: ConnectionTrait>(
    db: &C,
    employee_id: &str,
) -> ApiResult<Option<employee::Model>> {
    employee::Entity::find()
        .filter(employee::Column::EmployeeId.eq(employee_id))
        .one(db)
        .await
        .map_err(db_error)
}

async fn list_employees(
    db: &DatabaseConnection,
    q: Option<&str>,
) -> ApiResult<Vec<EmployeeNode>> {
    let records = employee::Entity::find()
        .order_by_asc(employee::Column::EmployeeId)
        .all(db)
        .await
        .map_err(db_error)?;
    let needle = search_needle(q);
    Ok(records
        .into_iter()
        .filter(|record| {
            needle.as_deref().is_none_or(|needle| {
                record.employee_id.to_lowercase().contains(needle)
                    || record.name.to_lowercase().contains(needle)
                    || record
                        .section
                        .as_deref()
                        .is_some_and(|section| section.to_lowercase().contains(needle))
            })
        })
        .map(EmployeeNode::from)
        .collect())
}

fn search_needle(q: Option<&str>) -> Option<String> {
    q.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_lowercase)
}

async fn register_employee_internal(
    db: &DatabaseConnection,
    form: EmployeeForm,
) -> ApiResult<EmployeeNode> {
    let valid = form.validate().map_err(validation_failed)?;
    let conflict = format!("Employee ID {} is already registered", valid.employee_id);
    let stamp = now();
    let record = employee::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(valid.employee_id),
        name: Set(valid.name),
        email: Set(valid.email),
        section: Set(valid.section),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await
    .map_err(|err| unique_or_db_error(err, conflict))?;
    info!(employee_id = %record.employee_id, "employee registered");
    Ok(record.into())
}

async fn update_employee_internal(
    db: &DatabaseConnection,
    form: EmployeeForm,
) -> ApiResult<EmployeeNode> {
    let valid = form.validate().map_err(validation_failed)?;
    let existing = find_employee(db, &valid.employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Employee"))?;
    let mut active: employee::ActiveModel = existing.into();
    active.name = Set(valid.name);
    active.email = Set(valid.email);
    active.section = Set(valid.section);
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

/// Upsert the employee and insert the record inside one transaction; either
/// both writes land or neither does. The upsert keys on `employee_id` so
/// concurrent first submissions for one employee both succeed.
async fn submit_overtime_internal(
    db: &DatabaseConnection,
    input: SubmitOvertimeInput,
    created_by: Option<Uuid>,
) -> ApiResult<OvertimeRecordNode> {
    let (entry, mut errors) = match input.form().validate() {
        Ok(entry) => (Some(entry), ValidationErrors::new()),
        Err(errors) => (None, errors),
    };
    let name = errors.check(
        "name",
        validation::optional_employee_name(input.name.as_deref()),
    );
    let email = errors.check("email", validation::optional_email(input.email.as_deref()));
    let section = errors.check(
        "section",
        validation::optional_section(input.section.as_deref()),
    );
    let (Some(entry), Some(name), Some(email), Some(section)) = (entry, name, email, section)
    else {
        return Err(validation_failed(errors));
    };

    let txn = db.begin().await.map_err(db_error)?;
    let stamp = now();
    let employee = match name {
        Some(name) => {
            let mut refreshed = vec![employee::Column::Name, employee::Column::UpdatedAt];
            if email.is_some() {
                refreshed.push(employee::Column::Email);
            }
            if section.is_some() {
                refreshed.push(employee::Column::Section);
            }
            employee::Entity::insert(employee::ActiveModel {
                id: Set(Uuid::new_v4()),
                employee_id: Set(entry.employee_id.clone()),
                name: Set(name),
                email: Set(email),
                section: Set(section),
                created_at: Set(stamp),
                updated_at: Set(stamp),
            })
            .on_conflict(
                OnConflict::column(employee::Column::EmployeeId)
                    .update_columns(refreshed)
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(db_error)?;
            find_employee(&txn, &entry.employee_id)
                .await?
                .ok_or_else(|| ApiError::internal(anyhow::anyhow!("upserted employee vanished")))?
        }
        None => {
            let Some(existing) = find_employee(&txn, &entry.employee_id).await? else {
                return Err(ApiError::field(
                    "name",
                    "Name is required for an employee who is not registered yet",
                ));
            };
            if email.is_none() && section.is_none() {
                existing
            } else {
                let mut active: employee::ActiveModel = existing.into();
                if let Some(email) = email {
                    active.email = Set(Some(email));
                }
                if let Some(section) = section {
                    active.section = Set(Some(section));
                }
                active.updated_at = Set(stamp);
                active.update(&txn).await.map_err(db_error)?
            }
        }
    };

    let record = overtime_record::ActiveModel {
        id: Set(Uuid::new_v4()),
        employee_id: Set(entry.employee_id),
        overtime_date: Set(entry.overtime_date),
        calculation_based_on_time: Set(entry.calculation_based_on_time),
        plan_overtime_hour: Set(entry.plan_overtime_hour),
        date_in: Set(entry.date_in),
        from_time: Set(entry.from_time),
        date_out: Set(entry.date_out),
        to_time: Set(entry.to_time),
        break_from_time: Set(entry.break_from_time),
        break_to_time: Set(entry.break_to_time),
        reason: Set(entry.reason),
        created_by: Set(created_by),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(record_id = %record.id, employee_id = %record.employee_id, "overtime submitted");
    Ok(OvertimeRecordNode::from_model(record, Some(employee.name)))
}

async fn update_overtime_record_internal(
    db: &DatabaseConnection,
    input: UpdateOvertimeRecordInput,
) -> ApiResult<OvertimeRecordNode> {
    let record_id = parse_uuid(&input.id, "id")?;
    let mut errors = ValidationErrors::new();
    let overtime_date = input
        .overtime_date
        .as_deref()
        .and_then(|raw| errors.check("overtimeDate", validation::overtime_date(raw)));
    let date_in = input
        .date_in
        .as_deref()
        .and_then(|raw| errors.check("dateIn", validation::overtime_date(raw)));
    let date_out = input
        .date_out
        .as_deref()
        .and_then(|raw| errors.check("dateOut", validation::overtime_date(raw)));
    let hours = input
        .plan_overtime_hour
        .and_then(|raw| errors.check("planOvertimeHour", validation::plan_hours(raw)));
    let from_time = input
        .from_time
        .as_deref()
        .and_then(|raw| errors.check("fromTime", validation::time_of_day(raw)));
    let to_time = input
        .to_time
        .as_deref()
        .and_then(|raw| errors.check("toTime", validation::time_of_day(raw)));
    let break_from = input
        .break_from_time
        .as_deref()
        .and_then(|raw| errors.check("breakFromTime", validation::optional_time(Some(raw))));
    let break_to = input
        .break_to_time
        .as_deref()
        .and_then(|raw| errors.check("breakToTime", validation::optional_time(Some(raw))));
    let reason = input
        .reason
        .as_deref()
        .and_then(|raw| errors.check("reason", validation::reason(raw)));
    errors.into_result().map_err(validation_failed)?;

    let (existing, employee) = overtime_record::Entity::find_by_id(record_id)
        .find_also_related(employee::Entity)
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("Overtime record"))?;
    let mut active: overtime_record::ActiveModel = existing.into();
    if let Some(value) = overtime_date {
        active.overtime_date = Set(value);
    }
    if let Some(value) = input.calculation_based_on_time {
        active.calculation_based_on_time = Set(value);
    }
    if let Some(value) = hours {
        active.plan_overtime_hour = Set(value);
    }
    if let Some(value) = date_in {
        active.date_in = Set(value);
    }
    if let Some(value) = from_time {
        active.from_time = Set(value);
    }
    if let Some(value) = date_out {
        active.date_out = Set(value);
    }
    if let Some(value) = to_time {
        active.to_time = Set(value);
    }
    if let Some(value) = break_from {
        active.break_from_time = Set(value);
    }
    if let Some(value) = break_to {
        active.break_to_time = Set(value);
    }
    if let Some(value) = reason {
        active.reason = Set(value);
    }
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(OvertimeRecordNode::from_model(
        updated,
        employee.map(|employee| employee.name),
    ))
}

#[derive(Clone, Copy, Debug)]
enum RecordOrder {
    NewestFirst,
    OldestFirst,
}

/// Records joined with the employee name, narrowed by `filter`. Date bounds
/// are pushed into SQL; the text search runs on the joined rows.
#[instrument(skip(db))]
async fn load_records(
    db: &DatabaseConnection,
    filter: &ReportFilter,
    order: RecordOrder,
) -> ApiResult<Vec<(overtime_record::Model, Option<String>)>> {
    let mut query = overtime_record::Entity::find().find_also_related(employee::Entity);
    if let Some(start) = filter.start_date {
        query = query.filter(overtime_record::Column::OvertimeDate.gte(start));
    }
    if let Some(end) = filter.end_date {
        query = query.filter(overtime_record::Column::OvertimeDate.lte(end));
    }
    query = match order {
        RecordOrder::NewestFirst => query
            .order_by_desc(overtime_record::Column::OvertimeDate)
            .order_by_desc(overtime_record::Column::CreatedAt)
            .order_by_desc(overtime_record::Column::FromTime),
        RecordOrder::OldestFirst => query
            .order_by_asc(overtime_record::Column::OvertimeDate)
            .order_by_asc(overtime_record::Column::CreatedAt)
            .order_by_asc(overtime_record::Column::FromTime),
    };
    let rows = query.all(db).await.map_err(db_error)?;
    Ok(rows
        .into_iter()
        .map(|(record, employee)| (record, employee.map(|employee| employee.name)))
        .filter(|(record, name)| filter.matches(&report_row(record, name.as_deref())))
        .collect())
}

fn report_row(record: &overtime_record::Model, employee_name: Option<&str>) -> ReportRow {
    ReportRow {
        employee_id: record.employee_id.clone(),
        employee_name: employee_name.map(str::to_string),
        overtime_date: record.overtime_date,
        calculation_based_on_time: record.calculation_based_on_time,
        plan_overtime_hour: record.plan_overtime_hour,
        date_in: record.date_in,
        from_time: record.from_time,
        date_out: record.date_out,
        to_time: record.to_time,
        break_from_time: record.break_from_time,
        break_to_time: record.break_to_time,
        reason: record.reason.clone(),
    }
}

/// Render the filtered records as the semicolon CSV download, oldest first.
pub async fn export_overtime_csv(
    db: &DatabaseConnection,
    filter: ReportFilter,
    today: NaiveDate,
) -> ApiResult<CsvExport> {
    let records = load_records(db, &filter, RecordOrder::OldestFirst).await?;
    let rows: Vec<ReportRow> = records
        .iter()
        .map(|(record, name)| report_row(record, name.as_deref()))
        .collect();
    let content = report::write_csv(&rows).map_err(|err| ApiError::internal(err.into()))?;
    info!(rows = rows.len(), "overtime csv exported");
    Ok(CsvExport {
        filename: report::export_filename(today),
        content,
        rows: rows.len() as i64,
    })
}

fn settings_node(
    stored: Option<admin_settings::Model>,
    graph: &GraphCredentials,
) -> AdminSettingsNode {
    let client_secret_configured = graph.is_configured();
    match stored {
        Some(model) => AdminSettingsNode {
            ms_graph_enabled: model.ms_graph_enabled,
            ms_graph_tenant_id: model.ms_graph_tenant_id,
            ms_graph_client_id: model.ms_graph_client_id,
            client_secret_configured,
        },
        None => AdminSettingsNode {
            ms_graph_enabled: false,
            ms_graph_tenant_id: None,
            ms_graph_client_id: None,
            client_secret_configured,
        },
    }
}

async fn save_settings_internal(
    db: &DatabaseConnection,
    user_id: Uuid,
    settings: validation::GraphSettings,
) -> ApiResult<admin_settings::Model> {
    let stamp = now();
    let existing = admin_settings::Entity::find()
        .filter(admin_settings::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(db_error)?;
    let saved = match existing {
        Some(model) => {
            let mut active: admin_settings::ActiveModel = model.into();
            active.ms_graph_enabled = Set(settings.enabled);
            active.ms_graph_tenant_id = Set(settings.tenant_id);
            active.ms_graph_client_id = Set(settings.client_id);
            active.updated_at = Set(stamp);
            active.update(db).await
        }
        None => {
            admin_settings::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(user_id),
                ms_graph_enabled: Set(settings.enabled),
                ms_graph_tenant_id: Set(settings.tenant_id),
                ms_graph_client_id: Set(settings.client_id),
                created_at: Set(stamp),
                updated_at: Set(stamp),
            }
            .insert(db)
            .await
        }
    };
    saved.map_err(db_error)
}

async fn find_profile<C: ConnectionTrait>(db: &C, user_id: Uuid) -> ApiResult<profile::Model> {
    profile::Entity::find()
        .filter(profile::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiError::not_found("User"))
}

async fn list_users(db: &DatabaseConnection, q: Option<&str>) -> ApiResult<Vec<UserNode>> {
    let records = profile::Entity::find()
        .order_by_asc(profile::Column::Email)
        .all(db)
        .await
        .map_err(db_error)?;
    let needle = search_needle(q);
    Ok(records
        .into_iter()
        .filter(|record| {
            needle.as_deref().is_none_or(|needle| {
                record.email.contains(needle)
                    || record
                        .display_name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(needle))
            })
        })
        .map(UserNode::from)
        .collect())
}

struct NewAccount {
    email: String,
    password: String,
    display_name: Option<String>,
    role: Role,
}

impl NewAccount {
    fn validate(
        email: &str,
        password: &str,
        display_name: Option<&str>,
        role: Role,
    ) -> ApiResult<Self> {
        let mut errors = ValidationErrors::new();
        let email = errors.check("email", validation::email(email));
        errors.check("password", validation::password(password));
        let display_name = errors.check("displayName", validation::display_name(display_name));
        match (email, display_name) {
            (Some(email), Some(display_name)) if errors.is_empty() => Ok(Self {
                email,
                password: password.to_string(),
                display_name,
                role,
            }),
            _ => Err(validation_failed(errors)),
        }
    }
}

async fn email_taken<C: ConnectionTrait>(db: &C, email: &str) -> ApiResult<bool> {
    let found = profile::Entity::find()
        .filter(profile::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(db_error)?;
    Ok(found.is_some())
}

async fn create_account(db: &DatabaseConnection, account: NewAccount) -> ApiResult<profile::Model> {
    let password_hash = hash_password(&account.password)
        .map_err(|err| ApiError::internal(anyhow::anyhow!("failed to hash password: {err}")))?;
    let txn = db.begin().await.map_err(db_error)?;
    let stamp = now();
    let user_id = Uuid::new_v4();
    let profile = profile::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        email: Set(account.email.clone()),
        // Default display name is the email address.
        display_name: Set(account.display_name.or(Some(account.email))),
        role: Set(UserRole::from(account.role).into()),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await
    .map_err(|err| unique_or_db_error(err, EMAIL_TAKEN))?;
    user_secret::ActiveModel {
        user_id: Set(user_id),
        password_hash: Set(password_hash),
        updated_at: Set(stamp),
    }
    .insert(&txn)
    .await
    .map_err(db_error)?;
    txn.commit().await.map_err(db_error)?;
    info!(%user_id, role = %account.role, "account created");
    Ok(profile)
}

async fn store_password(db: &DatabaseConnection, user_id: Uuid, password: &str) -> ApiResult<()> {
    let password_hash = hash_password(password)
        .map_err(|err| ApiError::internal(anyhow::anyhow!("failed to hash password: {err}")))?;
    let existing = user_secret::Entity::find_by_id(user_id)
        .one(db)
        .await
        .map_err(db_error)?;
    match existing {
        Some(model) => {
            let mut active: user_secret::ActiveModel = model.into();
            active.password_hash = Set(password_hash);
            active.updated_at = Set(now());
            active.update(db).await.map_err(db_error)?;
        }
        None => {
            user_secret::ActiveModel {
                user_id: Set(user_id),
                password_hash: Set(password_hash),
                updated_at: Set(now()),
            }
            .insert(db)
            .await
            .map_err(db_error)?;
        }
    }
    info!(%user_id, "password changed");
    Ok(())
}

async fn update_user_internal(
    db: &DatabaseConnection,
    input: UpdateUserInput,
) -> ApiResult<UserNode> {
    let user_id = parse_uuid(&input.id, "id")?;
    let mut errors = ValidationErrors::new();
    let email = input
        .email
        .as_deref()
        .and_then(|raw| errors.check("email", validation::email(raw)));
    let display_name = input
        .display_name
        .as_deref()
        .and_then(|raw| errors.check("displayName", validation::display_name(Some(raw))));
    errors.into_result().map_err(validation_failed)?;

    let existing = find_profile(db, user_id).await?;
    if let Some(email) = email.as_deref() {
        if email != existing.email && email_taken(db, email).await? {
            return Err(ApiError::Conflict(EMAIL_TAKEN.into()));
        }
    }
    let mut active: profile::ActiveModel = existing.into();
    if let Some(email) = email {
        active.email = Set(email);
    }
    if let Some(display_name) = display_name {
        active.display_name = Set(display_name);
    }
    active.updated_at = Set(now());
    let updated = active
        .update(db)
        .await
        .map_err(|err| unique_or_db_error(err, EMAIL_TAKEN))?;
    Ok(updated.into())
}

async fn set_role_internal(
    db: &DatabaseConnection,
    user_id: Uuid,
    role: UserRole,
) -> ApiResult<UserNode> {
    let existing = find_profile(db, user_id).await?;
    let mut active: profile::ActiveModel = existing.into();
    active.role = Set(role.into());
    active.updated_at = Set(now());
    let updated = active.update(db).await.map_err(db_error)?;
    Ok(updated.into())
}

pub const DEMO_ADMIN_EMAIL: &str = "admin@overtime.local";
pub const DEMO_USER_EMAIL: &str = "user@overtime.local";
pub const DEMO_PASSWORD: &str = "Overtime123";

#[derive(Debug, Clone)]
pub struct SeededRecords {
    pub admin: profile::Model,
    pub user: profile::Model,
    pub employees: Vec<employee::Model>,
    pub records: Vec<overtime_record::Model>,
}

impl SeededRecords {
    pub fn employee(&self, employee_id: &str) -> Option<&employee::Model> {
        self.employees.iter().find(|e| e.employee_id == employee_id)
    }
}

/// Demo accounts, employees and a few overtime records. Safe to run on an
/// empty database only.
pub async fn seed_demo(db: &DatabaseConnection) -> Result<SeededRecords, DbErr> {
    let admin =
        insert_seed_user(db, DEMO_ADMIN_EMAIL, "Overtime Admin", profile::Role::Admin).await?;
    let user = insert_seed_user(db, DEMO_USER_EMAIL, "Shift Lead", profile::Role::User).await?;

    let stamp = now();
    let mut employees = Vec::new();
    for (employee_id, name, section) in [
        ("MTI240264", "Budi Santoso", "Maintenance"),
        ("MTI240311", "Siti Rahma", "Network"),
        ("OPS-007", "Agus Wijaya", "Operations"),
    ] {
        let model = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee_id.into()),
            name: Set(name.into()),
            email: Set(None),
            section: Set(Some(section.into())),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(db)
        .await?;
        employees.push(model);
    }

    let mut records = Vec::new();
    for (employee_id, date, from, hours, by_time, reason) in [
        (
            "MTI240264",
            (2025, 8, 19),
            (15, 0),
            3.0,
            false,
            "Preventive maintenance of network panel",
        ),
        ("MTI240311", (2025, 8, 19), (17, 30), 2.5, true, "Cable trimming at the north plant"),
        ("OPS-007", (2025, 8, 20), (22, 0), 4.0, false, "Night shift cover for conveyor repair"),
    ] {
        let day = naive_date(date.0, date.1, date.2)?;
        let from_time = NaiveTime::from_hms_opt(from.0, from.1, 0)
            .ok_or_else(|| DbErr::Custom("invalid seed time".into()))?;
        let (date_out, to_time) = derive_checkout(day, from_time, hours);
        let model = overtime_record::ActiveModel {
            id: Set(Uuid::new_v4()),
            employee_id: Set(employee_id.into()),
            overtime_date: Set(day),
            calculation_based_on_time: Set(by_time),
            plan_overtime_hour: Set(hours),
            date_in: Set(day),
            from_time: Set(from_time),
            date_out: Set(date_out),
            to_time: Set(to_time),
            break_from_time: Set(None),
            break_to_time: Set(None),
            reason: Set(reason.into()),
            created_by: Set(Some(admin.user_id)),
            created_at: Set(stamp),
            updated_at: Set(stamp),
        }
        .insert(db)
        .await?;
        records.push(model);
    }

    Ok(SeededRecords {
        admin,
        user,
        employees,
        records,
    })
}

async fn insert_seed_user(
    db: &DatabaseConnection,
    email: &str,
    display_name: &str,
    role: profile::Role,
) -> Result<profile::Model, DbErr> {
    let stamp = now();
    let user_id = Uuid::new_v4();
    let model = profile::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        email: Set(email.to_string()),
        display_name: Set(Some(display_name.to_string())),
        role: Set(role),
        created_at: Set(stamp),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    let password_hash = hash_password(DEMO_PASSWORD)
        .map_err(|err| DbErr::Custom(format!("hash error: {err}")))?;
    user_secret::ActiveModel {
        user_id: Set(user_id),
        password_hash: Set(password_hash),
        updated_at: Set(stamp),
    }
    .insert(db)
    .await?;
    Ok(model)
}

fn naive_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, DbErr> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| DbErr::Custom(format!("invalid seed date {year}-{month}-{day}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_rolls_into_next_day() {
        let preview = preview_checkout("01.01.2025", "23:00", 3.0).unwrap();
        assert_eq!(preview.date_in, "01.01.2025");
        assert_eq!(preview.date_out, "02.01.2025");
        assert_eq!(preview.to_time, "02:00");
    }

    #[test]
    fn preview_reports_each_bad_input() {
        let err = preview_checkout("2025-01-01", "", 0.2).unwrap_err();
        let fields: Vec<_> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["overtimeDate", "fromTime", "planOvertimeHour"]);
    }

    #[test]
    fn roles_map_between_layers() {
        for role in [Role::Admin, Role::User, Role::Guest] {
            let stored: profile::Role = UserRole::from(role).into();
            assert_eq!(domain_role(stored), role);
        }
    }

    #[test]
    fn graph_secret_must_be_non_blank() {
        assert!(!GraphCredentials::default().is_configured());
        let blank = GraphCredentials {
            client_secret: Some("  ".into()),
        };
        assert!(!blank.is_configured());
        let set = GraphCredentials {
            client_secret: Some("s3cret".into()),
        };
        assert!(set.is_configured());
    }
}
