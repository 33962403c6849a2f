use anyhow::Result;
use skycast_weather::FetchStatus;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize core
    skycast_core::init()?;

    let app = match skycast_core::App::new() {
        Ok(app) => app,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(e.into());
        }
    };

    tracing::info!("Skycast application started");
    println!("Skycast - Open-Meteo weather");
    println!("  Config directory: {}", app.config().config_dir.display());

    let observer = app.temperature_query();
    let _subscription = observer.on_update(|view| {
        tracing::debug!("View updated: {:?} {:?}", view.status, view.display);
    });

    let view = observer.start().await;
    let location = &view.query;
    match view.status {
        FetchStatus::Success => println!(
            "  {} ({}, {}): {}",
            location.timezone,
            location.latitude,
            location.longitude,
            view.display.as_deref().unwrap_or_default()
        ),
        _ => println!(
            "  Temperature unavailable: {}",
            view.error.as_deref().unwrap_or("unknown error")
        ),
    }

    // Graceful shutdown
    app.shutdown();

    Ok(())
}
