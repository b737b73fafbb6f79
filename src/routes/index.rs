use axum::{http::StatusCode, response::Html};
use rinja_axum::Template;

#[derive(Template)]
#[template(path = "index.html")]
struct SendFormTemplate {
    title: String,
}

pub async fn index() -> Result<Html<String>, StatusCode> {
    let template = SendFormTemplate {
        title: String::from("bulk-mailer"),
    };
    template.render().map(Html).map_err(|e| {
        tracing::error!("{}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}
