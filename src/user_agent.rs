//! User-Agent string sent with every Assemblyline request.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/CybercentreCanada/assemblyline";

/// Default User-Agent: `assemblyline-client/<version> (+<project url>)`.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("assemblyline-client/{version} (+{PROJECT_UA_URL})")
}
