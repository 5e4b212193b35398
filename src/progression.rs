//! Progression tracking at seance and module granularity.
//!
//! A suivi row tracks one (user, seance) pair; suivi_modules rows are rolled
//! up from the member seances of a module, recomputed from storage on every
//! call rather than kept as incremental counters. Milestone notifications go
//! through the best-effort hub and can never fail a progression write.

use std::fmt;
use std::str::FromStr;

use color_eyre::{eyre::eyre, Result};
use serde_json::json;

use crate::db::{Db, Suivi, SuiviModule};
use crate::notify::NotificationHub;

pub const EVENT_MODULE_COMPLETE: &str = "module-completed";
pub const EVENT_PROGRESS_REFRESH: &str = "progress-refresh";

/// Completion state of a suivi or a module rollup.
///
/// NON_COMMENCE, EN_COURS and TERMINE are derived from the progression
/// percentage. REPORTE is only ever set by an explicit administrative call
/// and sticks until another explicit call clears it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Statut {
    NonCommence,
    EnCours,
    Termine,
    Reporte,
}

impl Statut {
    pub fn as_str(&self) -> &'static str {
        match self {
            Statut::NonCommence => "NON_COMMENCE",
            Statut::EnCours => "EN_COURS",
            Statut::Termine => "TERMINE",
            Statut::Reporte => "REPORTE",
        }
    }

    /// Three-way derivation rule shared by seance and module records.
    pub fn from_progression(progression: i32) -> Statut {
        if progression <= 0 {
            Statut::NonCommence
        } else if progression >= 100 {
            Statut::Termine
        } else {
            Statut::EnCours
        }
    }
}

impl fmt::Display for Statut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statut {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "NON_COMMENCE" => Ok(Statut::NonCommence),
            "EN_COURS" => Ok(Statut::EnCours),
            "TERMINE" => Ok(Statut::Termine),
            "REPORTE" => Ok(Statut::Reporte),
            other => Err(eyre!("statut inconnu: {other}")),
        }
    }
}

#[derive(Clone)]
pub struct ProgressionEngine {
    db: Db,
    hub: NotificationHub,
}

impl ProgressionEngine {
    pub fn new(db: Db, hub: NotificationHub) -> Self {
        Self { db, hub }
    }

    /// Record a progress event for (user, seance).
    ///
    /// The automatic path clamps to [0,100], keeps progression monotone and
    /// derives the statut from the stored percentage; TERMINE and REPORTE are
    /// sticky there. An explicit statut is applied as given (administrative
    /// override), including regressions, which are logged.
    pub async fn record_seance_progress(
        &self,
        user_id: i32,
        seance_id: i32,
        progression: i32,
        statut_explicite: Option<Statut>,
    ) -> Result<Suivi> {
        if !self.db.user_exists(user_id).await? {
            return Err(eyre!("user {user_id} not found"));
        }
        if !self.db.seance_exists(seance_id).await? {
            return Err(eyre!("seance {seance_id} not found"));
        }

        let progression = progression.clamp(0, 100);
        let existing = self.db.get_suivi(user_id, seance_id).await?;
        let was_termine = existing
            .as_ref()
            .is_some_and(|s| s.statut == Statut::Termine.as_str());

        let (final_progression, final_statut) = match statut_explicite {
            Some(statut) => {
                if was_termine && statut != Statut::Termine {
                    tracing::warn!(
                        "explicit statut override regresses a terminated suivi: \
                         user={user_id} seance={seance_id} -> {statut}"
                    );
                }
                (progression, statut)
            }
            None => {
                let merged = existing
                    .as_ref()
                    .map_or(progression, |s| s.progression.max(progression));
                let statut = match existing.as_ref().map(|s| s.statut.as_str()) {
                    Some("REPORTE") => Statut::Reporte,
                    _ => Statut::from_progression(merged),
                };
                (merged, statut)
            }
        };

        let suivi = self
            .db
            .upsert_suivi(user_id, seance_id, final_progression, final_statut.as_str())
            .await?;

        tracing::info!(
            "progress recorded for user={user_id} seance={seance_id}: \
             {final_progression}% {final_statut}"
        );

        self.hub.notify(
            user_id,
            EVENT_PROGRESS_REFRESH,
            json!({
                "seanceId": seance_id,
                "progression": final_progression,
                "statut": final_statut.as_str(),
            }),
        );

        // A seance entering or leaving TERMINE changes the rollup of every
        // module that contains it. The suivi write above has already
        // committed; a rollup failure degrades instead of failing the action.
        let is_termine = final_statut == Statut::Termine;
        if is_termine || was_termine {
            for module_id in self.db.modules_containing_seance(seance_id).await? {
                if let Err(e) = self.recompute_module_progression(user_id, module_id).await {
                    tracing::warn!(
                        "module rollup failed for user={user_id} module={module_id}: {e}"
                    );
                }
            }
        }

        Ok(suivi)
    }

    /// Recompute the (user, module) rollup from the current seance data.
    ///
    /// Read-recompute-write: counts are taken from storage at call time, so a
    /// recompute racing other seance writes still reflects everything committed
    /// before it began. Calling this twice with unchanged seance data stores
    /// identical progression, statut and date_completion.
    pub async fn recompute_module_progression(
        &self,
        user_id: i32,
        module_id: i32,
    ) -> Result<SuiviModule> {
        let total = self.db.seances_count_for_module(module_id).await?;
        let completed = self.db.count_terminated_seances(user_id, module_id).await?;

        let progression = if total > 0 {
            (((completed as f64) * 100.0 / (total as f64)).round() as i32).min(100)
        } else {
            0
        };
        let statut = Statut::from_progression(progression);

        let existing = self.db.get_suivi_module(user_id, module_id).await?;

        // Lazily materialized: nothing is written while the rollup stays at zero
        if existing.is_none() && progression == 0 {
            return Ok(SuiviModule {
                user_id,
                module_id,
                progression: 0,
                statut: Statut::NonCommence.as_str().to_owned(),
                date_completion: None,
                derniere_maj: None,
            });
        }

        let was_termine = existing
            .as_ref()
            .is_some_and(|s| s.statut == Statut::Termine.as_str());

        let rollup = self
            .db
            .upsert_suivi_module(user_id, module_id, progression, statut.as_str())
            .await?;

        tracing::info!(
            "module rollup for user={user_id} module={module_id}: \
             {completed}/{total} seances, {progression}% {statut}"
        );

        if statut == Statut::Termine && !was_termine {
            let titre = self.db.module_titre(module_id).await?;
            let payload = json!({
                "moduleId": module_id,
                "titre": titre,
                "dateCompletion": rollup.date_completion,
            });
            self.hub.notify(user_id, EVENT_MODULE_COMPLETE, payload.clone());
            self.hub.broadcast(EVENT_MODULE_COMPLETE, payload);
        }

        Ok(rollup)
    }

    /// Current rollup for (user, module), computing it on first view when no
    /// row has been materialized yet.
    pub async fn module_progress(&self, user_id: i32, module_id: i32) -> Result<SuiviModule> {
        match self.db.get_suivi_module(user_id, module_id).await? {
            Some(rollup) => Ok(rollup),
            None => self.recompute_module_progression(user_id, module_id).await,
        }
    }

    /// Explicit unenrollment: drop the suivi and refresh every owning module.
    pub async fn unenroll(&self, user_id: i32, seance_id: i32) -> Result<()> {
        self.db.delete_suivi(user_id, seance_id).await?;
        for module_id in self.db.modules_containing_seance(seance_id).await? {
            self.recompute_module_progression(user_id, module_id).await?;
        }
        Ok(())
    }
}
