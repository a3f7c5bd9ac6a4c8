use crate::server::ServerRouter;

mod comments;
mod health;
mod media;
mod posts;
mod session;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(health::routes())
        .merge(session::routes())
        .merge(posts::routes())
        .merge(comments::routes())
        .merge(media::routes())
}
