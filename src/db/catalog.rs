use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::Db;

impl Db {
    pub async fn create_user(&self, email: &str, display_name: &str) -> Result<i32> {
        let conn = self.connect()?;
        let user_id = conn
            .query(
                "INSERT INTO users (email, display_name) VALUES (?, ?) RETURNING id",
                params![email, display_name],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get user id")?
            .get::<i32>(0)?;

        tracing::info!("new user created: id={user_id}, email={email}");
        Ok(user_id)
    }

    pub async fn user_exists(&self, user_id: i32) -> Result<bool> {
        let conn = self.connect()?;
        let row = conn
            .query("SELECT 1 FROM users WHERE id = ?", params![user_id])
            .await?
            .next()
            .await?;
        Ok(row.is_some())
    }

    pub async fn create_module(&self, titre: &str) -> Result<i32> {
        let conn = self.connect()?;
        let module_id = conn
            .query(
                "INSERT INTO modules (titre) VALUES (?) RETURNING id",
                params![titre],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get module id")?
            .get::<i32>(0)?;

        tracing::info!("new module created: id={module_id}");
        Ok(module_id)
    }

    pub async fn module_titre(&self, module_id: i32) -> Result<String> {
        let conn = self.connect()?;
        let titre = conn
            .query("SELECT titre FROM modules WHERE id = ?", params![module_id])
            .await?
            .next()
            .await?
            .ok_or_eyre("module not found")?
            .get::<String>(0)?;

        Ok(titre)
    }

    pub async fn create_seance(&self, titre: &str) -> Result<i32> {
        let conn = self.connect()?;
        let seance_id = conn
            .query(
                "INSERT INTO seances (titre) VALUES (?) RETURNING id",
                params![titre],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get seance id")?
            .get::<i32>(0)?;

        tracing::info!("new seance created: id={seance_id}");
        Ok(seance_id)
    }

    pub async fn seance_exists(&self, seance_id: i32) -> Result<bool> {
        let conn = self.connect()?;
        let row = conn
            .query("SELECT 1 FROM seances WHERE id = ?", params![seance_id])
            .await?
            .next()
            .await?;
        Ok(row.is_some())
    }

    pub async fn add_seance_to_module(
        &self,
        module_id: i32,
        seance_id: i32,
        position: i32,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO module_seances (module_id, seance_id, position) VALUES (?, ?, ?)",
            params![module_id, seance_id, position],
        )
        .await?;

        tracing::info!("seance {seance_id} attached to module {module_id} at position {position}");
        Ok(())
    }

    /// Modules that contain the given seance. A seance may belong to several modules.
    pub async fn modules_containing_seance(&self, seance_id: i32) -> Result<Vec<i32>> {
        let conn = self.connect()?;
        let mut rows = conn
            .query(
                "SELECT module_id FROM module_seances WHERE seance_id = ? ORDER BY module_id",
                params![seance_id],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i32>(0)?);
        }
        Ok(ids)
    }

    pub async fn seances_count_for_module(&self, module_id: i32) -> Result<i32> {
        let conn = self.connect()?;
        super::helpers::query_count(
            &conn,
            "SELECT COUNT(*) FROM module_seances WHERE module_id = ?",
            params![module_id],
        )
        .await
    }
}
