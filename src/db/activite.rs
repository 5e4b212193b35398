use color_eyre::{eyre::OptionExt, Result};
use libsql::params;

use super::helpers::{query_all, query_optional};
use super::models::{Activite, ReponseClient};
use super::Db;

/// Scope of a content scan.
#[derive(Clone, Debug)]
pub enum ActiviteFilter {
    All,
    Seance(i32),
    Activites(Vec<i32>),
}

impl Db {
    pub async fn create_activite(
        &self,
        seance_id: i32,
        titre: &str,
        type_activite: &str,
        contenu: &str,
    ) -> Result<i32> {
        let conn = self.connect()?;
        let activite_id = conn
            .query(
                "INSERT INTO activites (seance_id, titre, type_activite, contenu) VALUES (?, ?, ?, ?) RETURNING id",
                params![seance_id, titre, type_activite, contenu],
            )
            .await?
            .next()
            .await?
            .ok_or_eyre("could not get activite id")?
            .get::<i32>(0)?;

        tracing::info!("new activite created: id={activite_id}, seance={seance_id}, type={type_activite}");
        Ok(activite_id)
    }

    pub async fn get_activite(&self, activite_id: i32) -> Result<Activite> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            "SELECT id, seance_id, titre, type_activite, contenu FROM activites WHERE id = ?",
            params![activite_id],
        )
        .await?
        .ok_or_eyre("activite not found")
    }

    pub async fn update_activite_contenu(&self, activite_id: i32, contenu: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE activites SET contenu = ? WHERE id = ?",
            params![contenu, activite_id],
        )
        .await?;

        Ok(())
    }

    /// Multiple-choice activities in scan order. The table-level `type_activite`
    /// column is the discriminator; the serialized payload is not trusted here.
    pub async fn qcm_activites(&self, filter: &ActiviteFilter) -> Result<Vec<Activite>> {
        let conn = self.connect()?;
        match filter {
            ActiviteFilter::All => {
                query_all(
                    &conn,
                    "SELECT id, seance_id, titre, type_activite, contenu
                     FROM activites WHERE type_activite = 'qcm' ORDER BY id",
                    (),
                )
                .await
            }
            ActiviteFilter::Seance(seance_id) => {
                query_all(
                    &conn,
                    "SELECT id, seance_id, titre, type_activite, contenu
                     FROM activites WHERE type_activite = 'qcm' AND seance_id = ? ORDER BY id",
                    params![*seance_id],
                )
                .await
            }
            ActiviteFilter::Activites(ids) => {
                let mut activites = Vec::new();
                for id in ids {
                    let found: Option<Activite> = query_optional(
                        &conn,
                        "SELECT id, seance_id, titre, type_activite, contenu
                         FROM activites WHERE id = ? AND type_activite = 'qcm'",
                        params![*id],
                    )
                    .await?;
                    if let Some(activite) = found {
                        activites.push(activite);
                    }
                }
                Ok(activites)
            }
        }
    }

    pub async fn get_reponse(
        &self,
        user_id: i32,
        activite_id: i32,
    ) -> Result<Option<ReponseClient>> {
        let conn = self.connect()?;
        query_optional(
            &conn,
            "SELECT id, user_id, activite_id, contenu FROM reponses_client
             WHERE user_id = ? AND activite_id = ?",
            params![user_id, activite_id],
        )
        .await
    }

    pub async fn upsert_reponse(
        &self,
        user_id: i32,
        activite_id: i32,
        contenu: &str,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO reponses_client (user_id, activite_id, contenu)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, activite_id) DO UPDATE SET contenu = excluded.contenu
            "#,
            params![user_id, activite_id, contenu],
        )
        .await?;

        tracing::info!("reponse recorded for user={user_id} activite={activite_id}");
        Ok(())
    }

    pub async fn reponses_for_activite(&self, activite_id: i32) -> Result<Vec<ReponseClient>> {
        let conn = self.connect()?;
        query_all(
            &conn,
            "SELECT id, user_id, activite_id, contenu FROM reponses_client
             WHERE activite_id = ? ORDER BY id",
            params![activite_id],
        )
        .await
    }

    pub async fn update_reponse_contenu(&self, reponse_id: i32, contenu: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE reponses_client SET contenu = ? WHERE id = ?",
            params![contenu, reponse_id],
        )
        .await?;

        Ok(())
    }
}
