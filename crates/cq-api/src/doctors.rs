use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{ApiResult, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct DoctorSummary {
    pub id: i64,
    pub name: String,
}

pub async fn list_doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<DoctorSummary>>> {
    let doctors = state
        .store
        .list_doctors()
        .await?
        .into_iter()
        .map(|user| DoctorSummary {
            id: user.id,
            name: display_name(&user.login),
        })
        .collect();
    Ok(Json(doctors))
}

/// `dr.ana_silva@clinic.org` -> `Dr Ana Silva`.
pub fn display_name(login: &str) -> String {
    let local = login.split('@').next().unwrap_or_default();
    local
        .replace(['.', '_'], " ")
        .split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_splits_dots_and_underscores() {
        assert_eq!(display_name("dr.ana_silva@clinic.org"), "Dr Ana Silva");
    }

    #[test]
    fn display_name_without_domain() {
        assert_eq!(display_name("joao"), "Joao");
    }

    #[test]
    fn display_name_keeps_rest_of_word() {
        assert_eq!(display_name("mcDonald.x@y"), "McDonald X");
    }

    #[test]
    fn display_name_capitalizes_non_ascii() {
        assert_eq!(display_name("élio@clinic"), "Élio");
    }
}
