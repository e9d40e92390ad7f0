use dialoguer::console::Term;
use dialoguer::Select;

use meshwarden_config::AgentConfig;

use crate::process_controller::{self, OverlayLocations};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Status,
    RestartOverlay,
    ToggleAutoHeal,
    Quit,
}

const ITEMS: &[MenuItem] = &[
    MenuItem::Status,
    MenuItem::RestartOverlay,
    MenuItem::ToggleAutoHeal,
    MenuItem::Quit,
];

fn label(item: MenuItem, config: &AgentConfig) -> String {
    match item {
        MenuItem::Status => "Show overlay status".to_string(),
        MenuItem::RestartOverlay => "Restart overlay service and GUI now".to_string(),
        MenuItem::ToggleAutoHeal => format!(
            "Auto-heal: {}  — toggle",
            if config.auto_heal_enabled { "on" } else { "off" }
        ),
        MenuItem::Quit => "Quit".to_string(),
    }
}

/// Minimal foreground operator menu. Runs alongside the background
/// auto-heal task, which owns the real restart decisions; this is a
/// manual override surface, not a second control loop.
pub async fn run(mut config: AgentConfig) -> anyhow::Result<()> {
    let locations = OverlayLocations {
        service_names: config.service_names.clone(),
        service_paths: config.service_paths.clone(),
        gui_paths: config.gui_paths.clone(),
    };

    loop {
        let labels: Vec<String> = ITEMS.iter().map(|item| label(*item, &config)).collect();
        let choice = Select::new()
            .with_prompt("meshwarden agent")
            .items(&labels)
            .default(0)
            .interact_on(&Term::stderr())?;

        match ITEMS[choice] {
            MenuItem::Status => {
                if let Some(name) = locations.service_names.first() {
                    let status = process_controller::service_status(name).await;
                    println!("overlay service ({name}): {status:?}");
                } else {
                    println!("no overlay service configured");
                }
            }
            MenuItem::RestartOverlay => {
                println!("restarting overlay (manual request)...");
                if let Some(path) = locations.gui_paths.first() {
                    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
                    let _ = process_controller::stop_gui(name).await;
                }
                if let Some(name) = locations.service_names.first() {
                    let _ = process_controller::stop_service(name).await;
                    let _ = process_controller::start_service(name).await;
                }
                if let Some(path) = locations.gui_paths.first() {
                    let _ = process_controller::start_gui(path).await;
                }
                println!("restart sequence finished");
            }
            MenuItem::ToggleAutoHeal => {
                config.auto_heal_enabled = !config.auto_heal_enabled;
                println!("auto-heal is now {}", config.auto_heal_enabled);
            }
            MenuItem::Quit => return Ok(()),
        }
    }
}
