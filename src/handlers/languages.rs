//! `GET /api/languages`

use crate::languages::LanguageTable;
use actix_web::HttpResponse;
use serde_json::json;

/// The language names the translation endpoints accept, sorted by name.
pub async fn list_languages() -> HttpResponse {
    let table = LanguageTable::global();
    HttpResponse::Ok().json(json!({
        "count": table.len(),
        "languages": table.entries()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App};

    #[actix_web::test]
    async fn test_list_languages() {
        let app = test::init_service(
            App::new().route("/api/languages", web::get().to(list_languages)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/languages").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        let languages = body["languages"].as_array().unwrap();
        assert_eq!(languages.len() as u64, body["count"].as_u64().unwrap());
        assert!(languages
            .iter()
            .any(|entry| entry["name"] == "English" && entry["tag"] == "eng_Latn"));
    }
}
