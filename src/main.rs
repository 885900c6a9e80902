use tilt_drive::domain::motion::MotionMapper;
use tilt_drive::domain::session::SessionController;
use tilt_drive::domain::settings::SettingsService;
use tilt_drive::infrastructure::logging::init_logger;
use tilt_drive::infrastructure::radio::SimulatedRadio;
use tilt_drive::infrastructure::runtime::{session_channel, SessionRuntime};
use tilt_drive::infrastructure::sensor::SimulatedAccelerometer;
use tilt_drive::presentation::console::ConsoleApp;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let settings = settings_service.get().clone();

    let _logging_guard = init_logger(&settings.log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!(
        "Starting Tilt Drive (settings: {})",
        settings_service.path().display()
    );
    if !settings_service.path().exists() {
        if let Err(e) = settings_service.save() {
            warn!("Could not write default settings: {}", e);
        }
    }

    let (session, inbox) = session_channel();
    let (app_tx, app_rx) = mpsc::unbounded_channel();

    let radio = SimulatedRadio::new(settings.simulation.clone(), session.event_sender());
    let sensor =
        SimulatedAccelerometer::new(settings.simulation.sample_rate_hz, session.event_sender());
    let controller = SessionController::new(
        radio,
        sensor,
        MotionMapper::new(&settings.motion),
        settings.session.clone(),
        app_tx,
    );
    let runtime = tokio::spawn(SessionRuntime::new(controller, inbox).run());

    ConsoleApp::new(session.clone(), app_rx).run().await?;

    session.close()?;
    runtime.await?;
    info!("Tilt Drive stopped");
    Ok(())
}
