mod common;

use common::create_test_db;
use parcours::content::{save_qcm_activite, save_reponse, ContenuActivite};
use parcours::db::{ActiviteFilter, Db};
use parcours::repair::scan_and_repair;

async fn setup_seance(db: &Db) -> i32 {
    db.create_seance("Seance QCM").await.unwrap()
}

#[tokio::test]
async fn test_write_path_rejects_unparsable_content() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    let result = save_qcm_activite(&db, seance_id, "Cassee", "not json").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_write_path_stores_canonical_form() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    // Legacy single-question shape is canonicalized before storage
    let activite_id = save_qcm_activite(
        &db,
        seance_id,
        "Legacy",
        r#"{"options":["A","B"],"reponse_correcte":1}"#,
    )
    .await
    .unwrap();

    let stored = db.get_activite(activite_id).await.unwrap();
    assert_eq!(stored.type_activite, "qcm");
    assert_eq!(
        stored.contenu,
        r#"{"type":"qcm","questions":[{"texte":"Question 1","options":["A","B"],"reponse_correcte":1}]}"#
    );
}

#[tokio::test]
async fn test_scan_reports_without_writing() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    let broken = r#"{"questions":[{"texte":"Q","options":["A"]}]}"#;
    let activite_id = db
        .create_activite(seance_id, "Brute", "qcm", broken)
        .await
        .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::All, true).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repares, 1);
    assert_eq!(report.deja_valides, 0);

    // Dry run left the row untouched
    let stored = db.get_activite(activite_id).await.unwrap();
    assert_eq!(stored.contenu, broken);
}

#[tokio::test]
async fn test_repair_writes_back_and_converges() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    db.create_activite(seance_id, "Illisible", "qcm", "not json at all")
        .await
        .unwrap();
    db.create_activite(
        seance_id,
        "Sans tag",
        "qcm",
        r#"{"questions":[{"texte":"Q","options":["A","B"],"reponse_correcte":1}]}"#,
    )
    .await
    .unwrap();
    db.create_activite(
        seance_id,
        "Deja valide",
        "qcm",
        r#"{"type":"qcm","questions":[{"texte":"Q","options":["A","B"],"reponse_correcte":0}]}"#,
    )
    .await
    .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.repares, 2);
    assert_eq!(report.deja_valides, 1);
    assert_eq!(report.issues.invalid_json, 1);
    assert_eq!(report.issues.missing_type_tag, 1);

    // Second run finds nothing left to repair
    let second = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(second.scanned, 3);
    assert_eq!(second.repares, 0);
    assert_eq!(second.deja_valides, 3);
    assert_eq!(second.issues.total(), 0);
}

#[tokio::test]
async fn test_repair_covers_answer_records() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;
    let user_a = db.create_user("a@example.org", "A").await.unwrap();
    let user_b = db.create_user("b@example.org", "B").await.unwrap();

    let activite_id = db
        .create_activite(
            seance_id,
            "QCM",
            "qcm",
            r#"{"type":"qcm","questions":[{"texte":"Q","options":["A","B"],"reponse_correcte":0}]}"#,
        )
        .await
        .unwrap();

    // One double-encoded answer, one free-text answer
    db.upsert_reponse(
        user_a,
        activite_id,
        r#""{\"selectedOption\":1,\"selectedOptionText\":\"B\"}""#,
    )
    .await
    .unwrap();
    db.upsert_reponse(user_b, activite_id, "du texte libre")
        .await
        .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(report.reponses_scannees, 2);
    assert_eq!(report.reponses_reparees, 2);
    assert_eq!(report.issues.double_encoded, 1);
    assert_eq!(report.issues.invalid_json, 1);

    let repaired = db.get_reponse(user_a, activite_id).await.unwrap().unwrap();
    assert_eq!(
        repaired.contenu,
        r#"{"selectedOption":1,"selectedOptionText":"B"}"#
    );

    let second = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(second.reponses_reparees, 0);
}

#[tokio::test]
async fn test_scan_skips_non_qcm_activities() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    parcours::content::save_activite(
        &db,
        seance_id,
        "Lecture",
        &ContenuActivite::Texte {
            corps: "Un long texte.".to_owned(),
        },
    )
    .await
    .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(report.scanned, 0);
}

#[tokio::test]
async fn test_scan_filter_by_seance() {
    let db = create_test_db().await;
    let seance_a = db.create_seance("Seance A").await.unwrap();
    let seance_b = db.create_seance("Seance B").await.unwrap();

    db.create_activite(seance_a, "A1", "qcm", "not json")
        .await
        .unwrap();
    db.create_activite(seance_b, "B1", "qcm", "not json")
        .await
        .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::Seance(seance_a), false)
        .await
        .unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repares, 1);

    // Seance B is untouched; a full scan still finds it broken
    let full = scan_and_repair(&db, &ActiviteFilter::All, true).await.unwrap();
    assert_eq!(full.scanned, 2);
    assert_eq!(full.repares, 1);
}

#[tokio::test]
async fn test_scan_filter_by_activite_ids() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    let first = db
        .create_activite(seance_id, "Un", "qcm", "not json")
        .await
        .unwrap();
    let _second = db
        .create_activite(seance_id, "Deux", "qcm", "not json")
        .await
        .unwrap();

    let report = scan_and_repair(&db, &ActiviteFilter::Activites(vec![first, 9999]), false)
        .await
        .unwrap();
    // The unknown id is skipped rather than failing the run
    assert_eq!(report.scanned, 1);
    assert_eq!(report.repares, 1);
}

#[tokio::test]
async fn test_interrupted_repair_can_resume() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;

    let first = db
        .create_activite(seance_id, "Un", "qcm", "not json")
        .await
        .unwrap();
    let second = db
        .create_activite(seance_id, "Deux", "qcm", r#"{"options":["A","B"]}"#)
        .await
        .unwrap();

    // A partial pass repaired only the first activity before being interrupted
    scan_and_repair(&db, &ActiviteFilter::Activites(vec![first]), false)
        .await
        .unwrap();

    // The full re-run repairs the remainder without touching repaired rows again
    let resumed = scan_and_repair(&db, &ActiviteFilter::All, false).await.unwrap();
    assert_eq!(resumed.scanned, 2);
    assert_eq!(resumed.deja_valides, 1);
    assert_eq!(resumed.repares, 1);

    let stored = db.get_activite(second).await.unwrap();
    assert!(stored.contenu.starts_with(r#"{"type":"qcm""#));
}

#[tokio::test]
async fn test_save_reponse_normalizes_at_write_time() {
    let db = create_test_db().await;
    let seance_id = setup_seance(&db).await;
    let user_id = db.create_user("c@example.org", "C").await.unwrap();
    let activite_id = save_qcm_activite(
        &db,
        seance_id,
        "QCM",
        r#"{"type":"qcm","questions":[{"texte":"Q","options":["A","B"],"reponse_correcte":0}]}"#,
    )
    .await
    .unwrap();

    save_reponse(&db, user_id, activite_id, "reponse libre")
        .await
        .unwrap();

    let stored = db.get_reponse(user_id, activite_id).await.unwrap().unwrap();
    assert_eq!(
        stored.contenu,
        r#"{"selectedOption":0,"selectedOptionText":"reponse libre"}"#
    );
}
