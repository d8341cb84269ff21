use futures::FutureExt;
use micro_serve::handler::{Context, Done, make_handler};
use micro_serve::protocol::{BoxError, Response, Status};
use micro_serve::server::Server;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = match Server::builder().bind("127.0.0.1:8080").build() {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            return;
        }
    };

    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "can't listen for ctrl-c");
        }
    };

    info!(port = 8080, "start listening");
    if let Err(e) = listener.serve_with_shutdown(make_handler(|ctx| hello_world(ctx).boxed()), shutdown).await {
        error!(cause = %e, "server stopped");
    }
}

async fn hello_world(mut ctx: Context<'_>) -> Result<Done, BoxError> {
    let request = ctx.request();
    info!(method = %request.method(), uri = request.uri(), remote = ?request.remote_addr(), "receiving request");

    if request.path() != "/" {
        *ctx.response_mut() = Response::stock(Status::NotFound);
        return Ok(ctx.done().await?);
    }

    if !request.body().is_empty() {
        info!(body = %String::from_utf8_lossy(request.body()), "receiving request body");
    }

    let response = ctx.response_mut();
    response.insert_header("Content-Type", "text/plain; charset=utf-8")?;
    response.set_body("Hello World!\r\n");
    Ok(ctx.done().await?)
}
