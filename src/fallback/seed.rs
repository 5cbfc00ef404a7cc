//! Fixed seed dataset for the local store. Ids and timestamps are
//! constants so re-seeding is deterministic.

use serde_json::{json, Value};

pub fn rows(collection: &str) -> Vec<Value> {
    match collection {
        "categories" => categories(),
        "posts" => posts(),
        "users" => users(),
        "interactions" => interactions(),
        _ => Vec::new(),
    }
}

fn categories() -> Vec<Value> {
    vec![
        json!({
            "id": "c-001",
            "name": "Sermones",
            "slug": "sermones",
            "display_order": 1,
            "is_active": true,
            "created_at": "2024-01-07T09:00:00Z",
            "updated_at": "2024-01-07T09:00:00Z",
        }),
        json!({
            "id": "c-002",
            "name": "Eventos",
            "slug": "eventos",
            "display_order": 2,
            "is_active": true,
            "created_at": "2024-01-07T09:00:00Z",
            "updated_at": "2024-01-07T09:00:00Z",
        }),
        json!({
            "id": "c-003",
            "name": "Anuncios",
            "slug": "anuncios",
            "display_order": 3,
            "is_active": false,
            "created_at": "2024-01-07T09:00:00Z",
            "updated_at": "2024-01-21T09:00:00Z",
        }),
    ]
}

fn posts() -> Vec<Value> {
    vec![
        json!({
            "id": "p-001",
            "slug": "confia-en-dios",
            "title": "Confía en Dios",
            "excerpt": "Mensaje dominical sobre la confianza.",
            "content": "Aun en tiempos difíciles, la confianza sostiene a la comunidad.",
            "speaker": "Pr. Samuel Ortiz",
            "category_id": "c-001",
            "published": true,
            "featured": true,
            "event_date": "2024-03-10T11:00:00Z",
            "view_count": 12,
            "like_count": 1,
            "comment_count": 1,
            "created_at": "2024-03-04T08:00:00Z",
            "updated_at": "2024-03-04T08:00:00Z",
            "published_at": "2024-03-04T08:30:00Z",
        }),
        json!({
            "id": "p-002",
            "slug": "la-palabra-de-dios-para-hoy",
            "title": "La palabra de Dios para hoy",
            "excerpt": "Serie de estudio bíblico, segunda parte.",
            "content": "Continuamos la serie de estudio de los miércoles.",
            "speaker": "Pr. Samuel Ortiz",
            "category_id": "c-001",
            "published": true,
            "featured": false,
            "event_date": "2024-02-18T11:00:00Z",
            "view_count": 7,
            "like_count": 0,
            "comment_count": 0,
            "created_at": "2024-02-12T08:00:00Z",
            "updated_at": "2024-02-12T08:00:00Z",
            "published_at": "2024-02-12T08:30:00Z",
        }),
        json!({
            "id": "p-003",
            "slug": "retiro-de-jovenes",
            "title": "Retiro de jóvenes",
            "excerpt": "Inscripciones abiertas.",
            "content": "Inscripciones abiertas para el retiro anual en la sierra.",
            "speaker": "Equipo de jóvenes",
            "category_id": "c-002",
            "published": true,
            "featured": false,
            "event_date": "2024-01-20T09:00:00Z",
            "view_count": 31,
            "like_count": 0,
            "comment_count": 0,
            "created_at": "2024-01-08T08:00:00Z",
            "updated_at": "2024-01-08T08:00:00Z",
            "published_at": "2024-01-08T08:30:00Z",
        }),
    ]
}

fn users() -> Vec<Value> {
    vec![
        json!({
            "id": "u-001",
            "email": "pastor@iglesia.example",
            "name": "Samuel Ortiz",
            "role": "pastor",
            "created_at": "2024-01-02T10:00:00Z",
            "last_login_at": null,
        }),
        json!({
            "id": "u-002",
            "email": "ana@iglesia.example",
            "name": "Ana Torres",
            "role": "member",
            "created_at": "2024-01-15T10:00:00Z",
            "last_login_at": null,
        }),
    ]
}

fn interactions() -> Vec<Value> {
    vec![
        json!({
            "id": "i-001",
            "post_id": "p-001",
            "user_id": "u-002",
            "kind": "like",
            "approved": true,
            "created_at": "2024-03-10T12:30:00Z",
        }),
        json!({
            "id": "i-002",
            "post_id": "p-001",
            "user_id": "u-002",
            "kind": "comment",
            "content": "Amén, qué buen mensaje.",
            "author_name": "Ana Torres",
            "author_email": "ana@iglesia.example",
            "approved": true,
            "created_at": "2024-03-10T13:00:00Z",
        }),
    ]
}
