//! Batch diagnostic and repair pass over stored QCM content.
//!
//! Runs the normalizer over every multiple-choice activity (and the answer
//! rows attached to each), writing back only rows whose canonical form differs
//! from what is stored. Re-running the pass over already-repaired data is a
//! no-op, so an interrupted run can simply be started again.

use std::fmt;

use color_eyre::Result;
use ulid::Ulid;

use crate::content::{normalize_answer_payload, normalize_qcm_content, IssueCounts, NormalizeMode};
use crate::db::{ActiviteFilter, Db};

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct RepairReport {
    pub run_id: String,
    pub dry_run: bool,
    pub scanned: u32,
    pub deja_valides: u32,
    pub repares: u32,
    pub reponses_scannees: u32,
    pub reponses_reparees: u32,
    pub issues: IssueCounts,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "repair run {} ({})",
            self.run_id,
            if self.dry_run { "dry run" } else { "write-back" }
        )?;
        writeln!(
            f,
            "  activites: {} scanned, {} already valid, {} repaired",
            self.scanned, self.deja_valides, self.repares
        )?;
        writeln!(
            f,
            "  reponses:  {} scanned, {} repaired",
            self.reponses_scannees, self.reponses_reparees
        )?;
        writeln!(f, "  issues:")?;
        writeln!(f, "    invalid json:          {}", self.issues.invalid_json)?;
        writeln!(f, "    missing type tag:      {}", self.issues.missing_type_tag)?;
        writeln!(f, "    malformed structure:   {}", self.issues.malformed_structure)?;
        writeln!(f, "    missing question text: {}", self.issues.missing_question_text)?;
        writeln!(f, "    insufficient options:  {}", self.issues.insufficient_options)?;
        writeln!(f, "    invalid correct index: {}", self.issues.invalid_correct_index)?;
        write!(f, "    double encoded:        {}", self.issues.double_encoded)
    }
}

/// Scan all QCM activities in `filter` scope, repair their payloads and the
/// answer rows belonging to them. With `dry_run` nothing is written and the
/// report shows what a real run would change.
pub async fn scan_and_repair(
    db: &Db,
    filter: &ActiviteFilter,
    dry_run: bool,
) -> Result<RepairReport> {
    let mut report = RepairReport {
        run_id: Ulid::new().to_string(),
        dry_run,
        ..Default::default()
    };

    let activites = db.qcm_activites(filter).await?;
    tracing::info!(
        "repair run {} started: {} activite(s) in scope",
        report.run_id,
        activites.len()
    );

    for activite in &activites {
        report.scanned += 1;

        // Reparation mode: any payload, however broken, converges
        let normalized = normalize_qcm_content(&activite.contenu, NormalizeMode::Reparation)?;
        let canonical = normalized.to_json()?;
        report.issues.merge(&normalized.issues);

        if canonical == activite.contenu {
            report.deja_valides += 1;
        } else {
            report.repares += 1;
            if !dry_run {
                db.update_activite_contenu(activite.id, &canonical).await?;
            }
            tracing::info!(
                "activite {} repaired ({} issue(s)){}",
                activite.id,
                normalized.issues.total(),
                if dry_run { " [dry run]" } else { "" }
            );
        }

        for reponse in db.reponses_for_activite(activite.id).await? {
            report.reponses_scannees += 1;

            let normalized = normalize_answer_payload(&reponse.contenu);
            let canonical = normalized.to_json()?;
            report.issues.merge(&normalized.issues);

            if canonical != reponse.contenu {
                report.reponses_reparees += 1;
                if !dry_run {
                    db.update_reponse_contenu(reponse.id, &canonical).await?;
                }
            }
        }
    }

    tracing::info!(
        "repair run {} finished: {}/{} activites repaired, {}/{} reponses repaired",
        report.run_id,
        report.repares,
        report.scanned,
        report.reponses_reparees,
        report.reponses_scannees
    );

    Ok(report)
}
