use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::{query_all, query_count, query_optional};
use super::models::{Suivi, SuiviModule};
use super::Db;

impl Db {
    pub async fn get_suivi(&self, user_id: i32, seance_id: i32) -> Result<Option<Suivi>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            "SELECT user_id, seance_id, progression, statut, derniere_maj
             FROM suivis WHERE user_id = ? AND seance_id = ?",
            params![user_id, seance_id],
        )
        .await
    }

    /// Insert or update the suivi row for (user, seance). The caller decides the
    /// final progression and statut; this only persists them.
    pub async fn upsert_suivi(
        &self,
        user_id: i32,
        seance_id: i32,
        progression: i32,
        statut: &str,
    ) -> Result<Suivi> {
        let conn = self.connect()?;
        let row = conn
            .query(
                r#"
                INSERT INTO suivis (user_id, seance_id, progression, statut, derniere_maj)
                VALUES (?, ?, ?, ?, datetime('now'))
                ON CONFLICT(user_id, seance_id) DO UPDATE SET
                    progression = excluded.progression,
                    statut = excluded.statut,
                    derniere_maj = excluded.derniere_maj
                RETURNING user_id, seance_id, progression, statut, derniere_maj
                "#,
                params![user_id, seance_id, progression, statut],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not upsert suivi")?;

        Ok(libsql::de::from_row::<Suivi>(&row)?)
    }

    /// Explicit unenrollment is the only path that deletes a suivi.
    pub async fn delete_suivi(&self, user_id: i32, seance_id: i32) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM suivis WHERE user_id = ? AND seance_id = ?",
            params![user_id, seance_id],
        )
        .await?;

        tracing::info!("suivi deleted for user={user_id} seance={seance_id}");
        Ok(())
    }

    pub async fn suivis_for_user(&self, user_id: i32) -> Result<Vec<Suivi>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            "SELECT user_id, seance_id, progression, statut, derniere_maj
             FROM suivis WHERE user_id = ? ORDER BY seance_id",
            params![user_id],
        )
        .await
    }

    /// Number of member seances of the module whose suivi is TERMINE for this user.
    /// Seances without a suivi row count as not started.
    pub async fn count_terminated_seances(&self, user_id: i32, module_id: i32) -> Result<i32> {
        let conn = self.connect()?;
        query_count(
            &conn,
            r#"
            SELECT COUNT(*)
            FROM module_seances ms
            JOIN suivis s ON s.seance_id = ms.seance_id AND s.user_id = ?
            WHERE ms.module_id = ? AND s.statut = 'TERMINE'
            "#,
            params![user_id, module_id],
        )
        .await
    }

    pub async fn get_suivi_module(
        &self,
        user_id: i32,
        module_id: i32,
    ) -> Result<Option<SuiviModule>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            "SELECT user_id, module_id, progression, statut, date_completion, derniere_maj
             FROM suivi_modules WHERE user_id = ? AND module_id = ?",
            params![user_id, module_id],
        )
        .await
    }

    /// Upsert the module rollup row. `date_completion` is written on the first
    /// arrival in TERMINE and kept as-is on every later write.
    pub async fn upsert_suivi_module(
        &self,
        user_id: i32,
        module_id: i32,
        progression: i32,
        statut: &str,
    ) -> Result<SuiviModule> {
        let conn = self.connect()?;
        let row = conn
            .query(
                r#"
                INSERT INTO suivi_modules (user_id, module_id, progression, statut, date_completion, derniere_maj)
                VALUES (?1, ?2, ?3, ?4, CASE WHEN ?4 = 'TERMINE' THEN datetime('now') END, datetime('now'))
                ON CONFLICT(user_id, module_id) DO UPDATE SET
                    progression = excluded.progression,
                    statut = excluded.statut,
                    date_completion = COALESCE(suivi_modules.date_completion, excluded.date_completion),
                    derniere_maj = excluded.derniere_maj
                RETURNING user_id, module_id, progression, statut, date_completion, derniere_maj
                "#,
                params![user_id, module_id, progression, statut],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not upsert suivi module")?;

        Ok(libsql::de::from_row::<SuiviModule>(&row)?)
    }
}
