use anyhow::{Context, Result};

#[zbus::proxy(
    interface = "io.github.claude_tracker.Tracker",
    default_service = "io.github.claude_tracker.Tracker",
    default_path = "/io/github/claude_tracker/Tracker"
)]
trait Tracker {
    fn refresh(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn is_fetching(&self) -> zbus::Result<bool>;
}

pub async fn run() -> Result<()> {
    let connection = zbus::Connection::session()
        .await
        .context("Failed to connect to session D-Bus")?;

    let proxy = TrackerProxy::new(&connection)
        .await
        .context("Failed to create D-Bus proxy")?;

    let busy = proxy.is_fetching().await.unwrap_or(false);

    proxy
        .refresh()
        .await
        .context("Failed to call Refresh method - is the daemon running?")?;

    if busy {
        println!("A fetch is already in flight; the daemon skipped this request");
    } else {
        println!("Refresh triggered successfully");
    }
    Ok(())
}
