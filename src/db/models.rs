// Database model structs

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Suivi {
    pub user_id: i32,
    pub seance_id: i32,
    pub progression: i32,
    pub statut: String,
    pub derniere_maj: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct SuiviModule {
    pub user_id: i32,
    pub module_id: i32,
    pub progression: i32,
    pub statut: String,
    pub date_completion: Option<String>,
    pub derniere_maj: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Activite {
    pub id: i32,
    pub seance_id: i32,
    pub titre: String,
    pub type_activite: String,
    pub contenu: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReponseClient {
    pub id: i32,
    pub user_id: i32,
    pub activite_id: i32,
    pub contenu: String,
}
