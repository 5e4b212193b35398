// Database schema initialization

use color_eyre::Result;

pub async fn create_schema(conn: &libsql::Connection) -> Result<()> {
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL
        )
        "#,
        (),
    )
    .await?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY,
            titre TEXT NOT NULL
        )
        "#,
        (),
    )
    .await?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS seances (
            id INTEGER PRIMARY KEY,
            titre TEXT NOT NULL
        )
        "#,
        (),
    )
    .await?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS module_seances (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL,
            seance_id INTEGER NOT NULL,
            position INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(module_id) REFERENCES modules(id) ON DELETE CASCADE,
            FOREIGN KEY(seance_id) REFERENCES seances(id) ON DELETE CASCADE,
            UNIQUE(module_id, seance_id)
        )
        "#,
        (),
    )
    .await?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS activites (
            id INTEGER PRIMARY KEY,
            seance_id INTEGER NOT NULL,
            titre TEXT NOT NULL,
            type_activite TEXT NOT NULL,
            contenu TEXT NOT NULL,
            FOREIGN KEY(seance_id) REFERENCES seances(id) ON DELETE CASCADE
        )
        "#,
        (),
    )
    .await?;

    // Suivi: one row per (user, seance), created on the first progress event
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS suivis (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            seance_id INTEGER NOT NULL,
            progression INTEGER NOT NULL DEFAULT 0,
            statut TEXT NOT NULL DEFAULT 'NON_COMMENCE',
            derniere_maj TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(seance_id) REFERENCES seances(id) ON DELETE CASCADE,
            UNIQUE(user_id, seance_id)
        )
        "#,
        (),
    )
    .await?;

    // SuiviModule: lazily materialized rollup, date_completion set exactly once
    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS suivi_modules (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            module_id INTEGER NOT NULL,
            progression INTEGER NOT NULL DEFAULT 0,
            statut TEXT NOT NULL DEFAULT 'NON_COMMENCE',
            date_completion TEXT,
            derniere_maj TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(module_id) REFERENCES modules(id) ON DELETE CASCADE,
            UNIQUE(user_id, module_id)
        )
        "#,
        (),
    )
    .await?;

    conn.execute(
        r#"
        CREATE TABLE IF NOT EXISTS reponses_client (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            activite_id INTEGER NOT NULL,
            contenu TEXT NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY(activite_id) REFERENCES activites(id) ON DELETE CASCADE,
            UNIQUE(user_id, activite_id)
        )
        "#,
        (),
    )
    .await?;

    Ok(())
}
