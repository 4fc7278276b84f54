#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use api::auth::{AuthConfig, CurrentUser};
use api::schema::{
    AppSchema, GraphCredentials, OvertimeSchema, SeededRecords, build_schema, seed_demo,
};
use api::session::SessionRegistry;
use async_graphql::{Request, Response, Variables};
use entity::profile;
use migration::{Migrator, MigratorTrait};
use products_overtime::Role;
use sea_orm::{Database, DatabaseConnection};
use serde_json::Value;

pub struct TestContext {
    pub db: Arc<DatabaseConnection>,
    pub schema: OvertimeSchema,
    pub sessions: SessionRegistry,
    pub seeded: SeededRecords,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_graph(GraphCredentials::default()).await
    }

    pub async fn with_graph(graph: GraphCredentials) -> Self {
        let conn = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&conn, None).await.unwrap();
        let seeded = seed_demo(&conn).await.unwrap();
        let db = Arc::new(conn);
        let auth = Arc::new(AuthConfig {
            jwt_secret: "integration-test-secret".into(),
            session_ttl_minutes: 60,
            inactivity_timeout: Duration::from_secs(15 * 60),
        });
        let sessions = SessionRegistry::new(auth.inactivity_timeout);
        let AppSchema(schema) = build_schema(db.clone(), auth, sessions.clone(), graph);
        Self {
            db,
            schema,
            sessions,
            seeded,
        }
    }

    /// A signed-in identity for `profile` with a live session.
    pub fn signed_in(&self, profile: &profile::Model) -> CurrentUser {
        let role = match profile.role {
            profile::Role::Admin => Role::Admin,
            profile::Role::User => Role::User,
            profile::Role::Guest => Role::Guest,
        };
        CurrentUser {
            user_id: profile.user_id,
            session_id: self.sessions.open(profile.user_id),
            role,
        }
    }

    pub fn admin(&self) -> CurrentUser {
        self.signed_in(&self.seeded.admin)
    }

    pub fn user(&self) -> CurrentUser {
        self.signed_in(&self.seeded.user)
    }

    pub async fn run(&self, query: &str, variables: Value, viewer: Option<CurrentUser>) -> Response {
        let mut request = Request::new(query).variables(Variables::from_json(variables));
        if let Some(viewer) = viewer {
            request = request.data(viewer);
        }
        self.schema.execute(request).await
    }

    /// Run and insist on success, returning the `data` payload as JSON.
    pub async fn ok(&self, query: &str, variables: Value, viewer: Option<CurrentUser>) -> Value {
        let response = self.run(query, variables, viewer).await;
        assert!(
            response.errors.is_empty(),
            "unexpected errors: {:?}",
            response.errors
        );
        response.data.into_json().unwrap()
    }
}

pub fn error_code(response: &Response) -> Option<String> {
    let json = serde_json::to_value(response).unwrap();
    json["errors"][0]["extensions"]["code"]
        .as_str()
        .map(str::to_string)
}

pub fn error_fields(response: &Response) -> Vec<String> {
    let json = serde_json::to_value(response).unwrap();
    json["errors"][0]["extensions"]["fields"]
        .as_array()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|issue| issue["field"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
