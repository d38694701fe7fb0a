//! Hello World example for Waymark
//!
//! Run from demos/hello-world: cargo run
//!
//! Then visit: http://127.0.0.1:8080

use waymark::prelude::*;

#[derive(Serialize, Deserialize)]
struct Greeting {
    message: String,
    /// Link to a user page, rendered through the route itself.
    see_also: String,
}

#[derive(Serialize, Deserialize)]
struct User {
    id: i64,
    name: String,
}

#[derive(Serialize, Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Declared once, used for matching and for rendering links.
    let user_path = Path::root() / "users" / Param::int("user_id");
    let link_path = user_path.clone();

    let hello = Route::new(
        Request::get(Path::root()),
        Response::ok(EntityCodec::<Greeting>::json()),
    )
    .handle_fn(move |()| Greeting {
        message: "Hello, World!".to_string(),
        see_also: link_path.path_to((42,)),
    });

    let health = Route::new(
        Request::get(Path::root() / "health"),
        Response::ok(EntityCodec::text()),
    )
    .handle_fn(|()| "OK".to_string());

    let get_user = Route::new(
        Request::get(user_path),
        Response::ok(EntityCodec::<User>::json()),
    )
    .handle_fn(|(user_id,): (i64,)| User {
        id: user_id,
        name: format!("User {user_id}"),
    });

    let create_user = Route::new(
        Request::post(Path::root() / "users").with_entity(EntityCodec::<NewUser>::json()),
        Response::status(StatusCode::CREATED, EntityCodec::<User>::json()),
    )
    .handle_fn(|(new_user,): (NewUser,)| User {
        id: 7,
        name: new_user.name,
    });

    Waymark::new()
        .route(hello)
        .route(health)
        .route(get_user)
        .route(create_user)
        .run("127.0.0.1:8080")
        .await
}
