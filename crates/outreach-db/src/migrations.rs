use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE admins (
                id          BLOB PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE workspaces (
                id          BLOB PRIMARY KEY,
                name        TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE users (
                id          BLOB PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            -- workspace_name is a denormalised copy kept in step on rename.
            -- No cascade from workspaces: a workspace with members cannot be deleted.
            CREATE TABLE memberships (
                user_id         BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                workspace_id    BLOB NOT NULL REFERENCES workspaces(id),
                workspace_name  TEXT NOT NULL,
                role            TEXT NOT NULL,
                joined_at       TEXT NOT NULL,
                PRIMARY KEY (user_id, workspace_id)
            );

            CREATE INDEX idx_memberships_workspace ON memberships(workspace_id);

            CREATE TABLE contacts (
                id              BLOB PRIMARY KEY,
                workspace_id    BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                phone_number    TEXT NOT NULL,
                email           TEXT NOT NULL,
                company         TEXT NOT NULL,
                notes           TEXT,
                tags            TEXT NOT NULL DEFAULT '[]',
                created_by      BLOB NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE (workspace_id, phone_number)
            );

            CREATE INDEX idx_contacts_workspace ON contacts(workspace_id, created_at);

            -- One row per (contact, tag); mirrors contacts.tags for indexed lookups.
            CREATE TABLE contact_tags (
                contact_id      BLOB NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
                workspace_id    BLOB NOT NULL,
                tag             TEXT NOT NULL,
                PRIMARY KEY (contact_id, tag)
            );

            CREATE INDEX idx_contact_tags_lookup ON contact_tags(workspace_id, tag);

            CREATE TABLE message_templates (
                id              BLOB PRIMARY KEY,
                workspace_id    BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                kind            TEXT NOT NULL,
                body            TEXT NOT NULL,
                image_url       TEXT,
                created_by      BLOB NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                UNIQUE (workspace_id, name)
            );

            -- template_id is not a foreign key: templates may be
            -- deleted while campaigns still point at them.
            CREATE TABLE campaigns (
                id              BLOB PRIMARY KEY,
                workspace_id    BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                name            TEXT NOT NULL,
                target_tags     TEXT NOT NULL,
                template_id     BLOB NOT NULL,
                status          TEXT NOT NULL DEFAULT 'Draft',
                created_by      BLOB NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL,
                launched_at     TEXT,
                UNIQUE (workspace_id, name)
            );

            CREATE INDEX idx_campaigns_workspace ON campaigns(workspace_id, created_at);

            -- Append-only ledger. Outlives its campaign and contacts.
            CREATE TABLE campaign_messages (
                id                      BLOB PRIMARY KEY,
                workspace_id            BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
                campaign_id             BLOB NOT NULL,
                contact_id              BLOB,
                contact_phone_number    TEXT NOT NULL,
                message_body            TEXT NOT NULL,
                message_image_url       TEXT,
                status                  TEXT NOT NULL,
                sent_at                 TEXT NOT NULL
            );

            CREATE INDEX idx_campaign_messages_campaign ON campaign_messages(campaign_id);
            CREATE INDEX idx_campaign_messages_sent ON campaign_messages(workspace_id, sent_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
