//! A FastCGI responder streaming its answer in parts.
//!
//! Point a web server at it, e.g. for nginx:
//!
//! ```text
//! location / {
//!     fastcgi_pass 127.0.0.1:9000;
//!     include fastcgi_params;
//! }
//! ```

use std::time::Duration;

use futures::FutureExt;
use micro_serve::handler::{Context, Done, make_handler};
use micro_serve::protocol::BoxError;
use micro_serve::server::Server;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let listener = match Server::builder().bind("127.0.0.1:9000").fastcgi().read_timeout(Duration::from_secs(60)).build() {
        Ok(server) => server.bind().await,
        Err(e) => {
            error!(cause = %e, "invalid server configuration");
            return;
        }
    };

    match listener {
        Ok(listener) => {
            if let Err(e) = listener.serve(make_handler(|ctx| countdown(ctx).boxed())).await {
                error!(cause = %e, "server stopped");
            }
        }
        Err(e) => error!(cause = %e, "bind server error"),
    }
}

async fn countdown(mut ctx: Context<'_>) -> Result<Done, BoxError> {
    info!(uri = ctx.request().uri(), remote = ?ctx.request().remote_addr(), "receiving request");

    ctx.response_mut().insert_header("Content-Type", "text/plain; charset=utf-8")?;
    for n in (1..=5).rev() {
        ctx.response_mut().append_body(format!("{n}...\n"));
        ctx.send_partial().await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    ctx.response_mut().set_body("liftoff\n");
    Ok(ctx.done().await?)
}
