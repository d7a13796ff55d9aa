pub mod analytics;
pub mod auth;
pub mod campaigns;
pub mod contacts;
pub mod engine;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;
pub mod sender;
pub mod state;
pub mod templates;
pub mod token;
pub mod users;
pub mod validate;
pub mod views;
pub mod workspaces;

pub use engine::CampaignEngine;
pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::Utc;
    use uuid::Uuid;

    use outreach_db::Database;
    use outreach_db::models::{NewContact, NewTemplate};
    use outreach_types::models::TemplateKind;

    use crate::engine::CampaignEngine;
    use crate::sender::MessageSender;

    /// An in-memory store with one workspace and an acting user id.
    pub struct Fixture {
        pub db: Arc<Database>,
        pub workspace: Uuid,
        pub actor: Uuid,
    }

    impl Fixture {
        pub fn new() -> Self {
            let db = Arc::new(Database::open_in_memory().unwrap());
            let workspace = Uuid::new_v4();
            db.create_workspace(workspace, "Main", Utc::now()).unwrap();
            Self {
                db,
                workspace,
                actor: Uuid::new_v4(),
            }
        }

        pub fn other_workspace(&self, name: &str) -> Uuid {
            let id = Uuid::new_v4();
            self.db.create_workspace(id, name, Utc::now()).unwrap();
            id
        }

        pub fn contact(&self, phone: &str, tags: &[&str]) -> Uuid {
            let id = Uuid::new_v4();
            self.db
                .create_contact(&NewContact {
                    id,
                    workspace_id: self.workspace,
                    name: format!("Contact {}", phone),
                    phone_number: phone.to_string(),
                    email: format!("{}@example.com", phone),
                    company: "Acme".into(),
                    notes: None,
                    tags: tags.iter().map(|t| t.to_string()).collect(),
                    created_by: self.actor,
                    created_at: Utc::now(),
                })
                .unwrap();
            id
        }

        pub fn template(
            &self,
            name: &str,
            kind: TemplateKind,
            body: &str,
            image_url: Option<&str>,
        ) -> Uuid {
            let id = Uuid::new_v4();
            self.db
                .create_template(&NewTemplate {
                    id,
                    workspace_id: self.workspace,
                    name: name.to_string(),
                    kind,
                    body: body.to_string(),
                    image_url: image_url.map(str::to_string),
                    created_by: self.actor,
                    created_at: Utc::now(),
                })
                .unwrap();
            id
        }

        pub fn engine(&self, sender: Arc<dyn MessageSender>) -> CampaignEngine {
            CampaignEngine::new(self.db.clone(), sender, 4)
        }
    }
}
