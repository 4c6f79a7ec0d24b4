//! Startup banner.

use crate::config::DaemonConfig;
use crate::lifecycle::OperatingMode;

const ART: &str = r"
  _               _      _
 | |__   ___  ___| |_ __| |
 | '_ \ / _ \/ __| __/ _` |
 | | | | (_) \__ \ || (_| |
 |_| |_|\___/|___/\__\__,_|
";

pub fn log_banner(config: &DaemonConfig, mode: OperatingMode) {
    tracing::info!("{ART}");
    tracing::info!(
        version = config.version(),
        pid = std::process::id(),
        https_port = config.listener.https_port,
        http_port = config.listener.http_port,
        work_dir = %config.daemon.work_dir.display(),
        %mode,
        "hostd starting"
    );
}
