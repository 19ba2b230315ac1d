use anyhow::Context as _;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

pub use sonarr_mcp_test_support::KillOnDrop;

pub fn pick_unused_port() -> anyhow::Result<u16> {
    sonarr_mcp_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    sonarr_mcp_test_support::wait_http_ok(url, timeout_dur).await
}

pub fn adapter_command(sonarr_url: &str, api_key: &str) -> Command {
    let bin = env!("CARGO_BIN_EXE_sonarr-mcp-adapter");
    let mut cmd = Command::new(bin);
    cmd.env_remove("RUST_LOG")
        .env_remove("SONARR_URL")
        .env_remove("SONARR_API_KEY")
        .arg("--sonarr-url")
        .arg(sonarr_url)
        .arg("--sonarr-api-key")
        .arg(api_key)
        .arg("--log-level")
        .arg("info")
        .stdout(Stdio::null());
    cmd
}

pub fn spawn_adapter(sonarr_url: &str, api_key: &str, port: u16) -> anyhow::Result<Child> {
    adapter_command(sonarr_url, api_key)
        .arg("--port")
        .arg(port.to_string())
        .arg("--timeout-secs")
        .arg("5")
        .spawn()
        .context("spawn adapter")
}

/// Spawn the adapter against `sonarr_url` and wait until `/health` answers.
pub async fn start_adapter(
    sonarr_url: &str,
    api_key: &str,
) -> anyhow::Result<(String, KillOnDrop)> {
    let port = pick_unused_port()?;
    let child = KillOnDrop(spawn_adapter(sonarr_url, api_key, port)?);

    let base_url = format!("http://127.0.0.1:{port}");
    wait_http_ok(&format!("{base_url}/health"), Duration::from_secs(20)).await?;
    Ok((base_url, child))
}
