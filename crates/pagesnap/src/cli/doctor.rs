//! Environment readiness check.

use super::output;
use crate::config::resolve_audit_log_path;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use serde_json::json;
use std::path::Path;

/// Report whether a Chromium binary can be found and where the audit log goes.
///
/// Returns `true` when a snapshot could run.
pub async fn run(chromium: Option<&Path>, audit_log: Option<&Path>) -> Result<bool> {
    let chromium_path = find_chromium(chromium);
    let audit_path = resolve_audit_log_path(audit_log);
    let ready = chromium_path.is_some();

    if output::is_json() {
        output::print_json(&json!({
            "ready": ready,
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium_path.as_ref().map(|p| p.display().to_string()),
            "auditLog": audit_path.display().to_string(),
        }));
        return Ok(ready);
    }

    output::say("Pagesnap Doctor");
    output::say("===============");
    output::say("");
    output::say(format!("OS:   {}", std::env::consts::OS));
    output::say(format!("Arch: {}", std::env::consts::ARCH));
    output::say("");

    match &chromium_path {
        Some(path) => output::say(format!("[OK] Chromium found: {}", path.display())),
        None => output::say(format!(
            "[!!] Chromium NOT found. Install Chrome/Chromium or set {}.",
            crate::config::ENV_CHROMIUM_PATH
        )),
    }
    output::say(format!("[OK] Audit log: {}", audit_path.display()));

    output::say("");
    if ready {
        output::say("Status: READY");
    } else {
        output::say("Status: NOT READY");
    }

    Ok(ready)
}
