use ember::config::Config;
use ember::events::ServerEvents;
use ember::{Handler, HttpContext, Server};
use tracing_subscriber::EnvFilter;

/// Greets the visitor and counts visits in the session.
#[derive(Default)]
struct HomePage;

impl Handler for HomePage {
    fn process_request(&self, ctx: &mut HttpContext<'_>) -> anyhow::Result<()> {
        let visits = ctx
            .session()
            .get("visits")
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        ctx.session().set("visits", visits);

        let client = ctx.server_variable("REMOTE_HOST").unwrap_or_default().to_string();
        let response = ctx.response();
        response.write("<html><head><title>ember</title></head><body>");
        response.write(&format!("<h1>Hello {}</h1>", client));
        response.write(&format!("<p>Visits in this session: {}</p>", visits));
        response.write("</body></html>");
        Ok(())
    }
}

/// Shows the query string and form fields it was sent.
#[derive(Default)]
struct EchoPage;

impl Handler for EchoPage {
    fn process_request(&self, ctx: &mut HttpContext<'_>) -> anyhow::Result<()> {
        let mut fields: Vec<(String, String)> = ctx
            .query()
            .iter()
            .chain(ctx.form().fields().iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        fields.sort();

        let response = ctx.response();
        response.set_content_type("text/plain");
        for (key, value) in fields {
            response.write(&format!("{}={}\n", key, value));
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::load()?;

    let events = ServerEvents::new()
        .on_session_start(|session| tracing::info!(session_id = %session.id, "Session started"))
        .on_session_end(|session| tracing::info!(session_id = %session.id, "Session ended"));

    let mut server = Server::new(cfg).with_events(events);
    server.route::<EchoPage>("/echo").route::<HomePage>("/");

    let running = server.start().await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    running.stop().await
}
