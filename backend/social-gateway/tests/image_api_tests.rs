//! REST image endpoint tests

mod common;

use actix_web::{http::StatusCode, test, App};
use s3_utils::MemoryObjectStorage;
use serde_json::json;
use std::sync::Arc;

use common::{error_message, send, FlakyStorage, TestApp, PNG_URI};
use social_gateway::db::UserRepository;
use social_gateway::models::{Image, User};
use social_gateway::routes;

macro_rules! init_app {
    ($test_app:expr) => {
        test::init_service(App::new().configure(|cfg| {
            routes::configure(
                cfg,
                $test_app.state.clone(),
                $test_app.schema.clone(),
                $test_app.route_options(),
            )
        }))
        .await
    };
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

async fn upload_profile_image(test_app: &TestApp, user: &User) -> Image {
    test_app
        .state
        .image_service
        .upload_profile_images(user, &[PNG_URI.to_string()])
        .await
        .expect("upload")
        .remove(0)
}

#[actix_web::test]
async fn test_upload_requires_token() {
    let test_app = TestApp::new();
    let app = init_app!(test_app);

    let req = test::TestRequest::post()
        .uri("/api/upload-post-image")
        .set_json(json!({ "image": PNG_URI }))
        .to_request();
    let (status, _) = send(&app, req).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_upload_profile_images() {
    let storage = Arc::new(MemoryObjectStorage::new("https://cdn.test"));
    let test_app = TestApp::with_storage(storage.clone());
    let (ada, token) = test_app.register("ada@x.io").await;
    let app = init_app!(test_app);

    let req = test::TestRequest::post()
        .uri("/api/upload-profile-images")
        .insert_header(bearer(&token))
        .set_json(json!({ "images": [PNG_URI, PNG_URI] }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    let images = body["data"]["images"].as_array().expect("images");
    assert_eq!(images.len(), 2);
    for image in images {
        let key = image["key"].as_str().expect("key");
        assert!(key.starts_with(&format!("profile/{}/", ada.id)));
        assert!(key.ends_with(".png"));
        assert_eq!(image["url"], json!(format!("https://cdn.test/{key}")));
        let blob = storage.get(key).expect("stored");
        assert_eq!(blob.content_type, "image/png");
        assert_eq!(blob.body, b"hello");
    }
}

#[actix_web::test]
async fn test_failed_upload_rejects_whole_batch() {
    let storage = Arc::new(FlakyStorage::new(2));
    let test_app = TestApp::with_storage(storage.clone());
    let (ada, token) = test_app.register("ada@x.io").await;
    let app = init_app!(test_app);

    let req = test::TestRequest::post()
        .uri("/api/upload-profile-images")
        .insert_header(bearer(&token))
        .set_json(json!({ "images": [PNG_URI, PNG_URI, PNG_URI] }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({ "message": "Something went wrong, try again later." })
    );
    assert_eq!(storage.puts(), 3);
    assert!(storage.inner.is_empty());

    let user = test_app
        .users
        .find_by_id(ada.id)
        .await
        .expect("lookup")
        .expect("user");
    assert!(user.images.is_empty());
}

#[actix_web::test]
async fn test_malformed_image_is_generic_failure() {
    let test_app = TestApp::new();
    let (_, token) = test_app.register("ada@x.io").await;
    let app = init_app!(test_app);

    let req = test::TestRequest::post()
        .uri("/api/upload-post-image")
        .insert_header(bearer(&token))
        .set_json(json!({ "image": "not a data uri" }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["message"], json!("Something went wrong, try again later."));
}

#[actix_web::test]
async fn test_upload_post_image() {
    let test_app = TestApp::new();
    let (ada, token) = test_app.register("ada@x.io").await;
    let app = init_app!(test_app);

    let req = test::TestRequest::post()
        .uri("/api/upload-post-image")
        .insert_header(bearer(&token))
        .set_json(json!({ "image": PNG_URI }))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::CREATED);
    let key = body["data"]["image"]["key"].as_str().expect("key");
    assert!(key.starts_with(&format!("posts/{}/", ada.id)));
}

#[actix_web::test]
async fn test_delete_own_profile_image() {
    let storage = Arc::new(MemoryObjectStorage::new("https://cdn.test"));
    let test_app = TestApp::with_storage(storage.clone());
    let (ada, token) = test_app.register("ada@x.io").await;
    let image = upload_profile_image(&test_app, &ada).await;
    let kept = Image {
        url: "https://cdn.test/other.png".to_string(),
        key: "profile/other.png".to_string(),
    };
    test_app
        .users
        .set_images(ada.id, &[image.clone(), kept.clone()])
        .await
        .expect("set images");
    let app = init_app!(test_app);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/profile-image?imageKey={}", image.key))
        .insert_header(bearer(&token))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": { "message": "Delete success." } }));
    assert!(!storage.contains(&image.key));

    let user = test_app
        .users
        .find_by_id(ada.id)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(user.images, vec![kept]);
}

#[actix_web::test]
async fn test_delete_foreign_profile_image_is_rejected() {
    let storage = Arc::new(MemoryObjectStorage::new("https://cdn.test"));
    let test_app = TestApp::with_storage(storage.clone());
    let (ada, _) = test_app.register("ada@x.io").await;
    let (_, bob_token) = test_app.register("bob@x.io").await;
    let image = upload_profile_image(&test_app, &ada).await;
    test_app
        .users
        .set_images(ada.id, &[image.clone()])
        .await
        .expect("set images");
    let app = init_app!(test_app);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/profile-image?imageKey={}", image.key))
        .insert_header(bearer(&bob_token))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Unauthorized action." }));
    assert!(storage.contains(&image.key));

    let user = test_app
        .users
        .find_by_id(ada.id)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(user.images, vec![image]);
}

#[actix_web::test]
async fn test_copied_image_key_cannot_delete_other_users_object() {
    let storage = Arc::new(MemoryObjectStorage::new("https://cdn.test"));
    let test_app = TestApp::with_storage(storage.clone());
    let (_, mallory_token) = test_app.register("mallory@x.io").await;
    let (bob, _) = test_app.register("bob@x.io").await;
    let image = upload_profile_image(&test_app, &bob).await;
    test_app
        .users
        .set_images(bob.id, &[image.clone()])
        .await
        .expect("set images");

    let copy = format!(
        r#"mutation {{ updateUser(input: {{ images: [{{ url: "{}", key: "{}" }}] }}) {{ id }} }}"#,
        image.url, image.key
    );
    let response = test_app.execute(&copy, Some(&mallory_token)).await;
    assert_eq!(error_message(&response), "Unauthorized action.");

    let app = init_app!(test_app);
    let req = test::TestRequest::delete()
        .uri(&format!("/api/profile-image?imageKey={}", image.key))
        .insert_header(bearer(&mallory_token))
        .to_request();
    let (status, body) = send(&app, req).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "message": "Unauthorized action." }));
    assert!(storage.contains(&image.key));

    let mallory = test_app
        .users
        .find_by_email("mallory@x.io")
        .await
        .expect("lookup")
        .expect("user");
    assert!(mallory.images.is_empty());
    let bob = test_app
        .users
        .find_by_id(bob.id)
        .await
        .expect("lookup")
        .expect("user");
    assert_eq!(bob.images, vec![image]);
}
