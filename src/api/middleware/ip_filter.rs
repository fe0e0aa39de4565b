//! Blocked-IP and vulnerability-scanner filtering.

use async_trait::async_trait;
use regex::Regex;
use std::sync::LazyLock;

use super::pipeline::{Stage, reject};
use crate::application::services::IpList;
use crate::domain::request_context::{Outcome, RequestContext};
use crate::error::AppError;

static SCANNER_AGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(sqlmap|nikto|nmap|masscan|nessus|openvas|acunetix|w3af|dirbuster|gobuster|wpscan|zgrab|nuclei)\b",
    )
    .unwrap()
});

/// Whether a `User-Agent` belongs to a known vulnerability scanner.
pub fn is_scanner(user_agent: &str) -> bool {
    SCANNER_AGENT.is_match(user_agent)
}

/// Rejects blocked clients with 403 before any other work is done.
pub struct IpFilterStage {
    blocked: IpList,
    block_scanners: bool,
}

impl IpFilterStage {
    /// `block_scanners` is enabled in production.
    pub fn new(blocked: IpList, block_scanners: bool) -> Self {
        Self {
            blocked,
            block_scanners,
        }
    }
}

#[async_trait]
impl Stage for IpFilterStage {
    fn name(&self) -> &'static str {
        "ip_filter"
    }

    async fn run(&self, ctx: RequestContext) -> Outcome {
        if let Some(ip) = ctx.client_ip
            && self.blocked.contains(ip)
        {
            tracing::warn!(ip = %ip, path = ctx.path(), "Blocked IP attempted access");
            return reject(ctx, AppError::AccessDenied, "blocked ip");
        }

        if self.block_scanners
            && let Some(agent) = ctx.user_agent()
            && is_scanner(agent)
        {
            tracing::warn!(
                ip = ?ctx.client_ip,
                user_agent = agent,
                "Scanner user agent blocked"
            );
            return reject(ctx, AppError::AccessDenied, "scanner user agent");
        }

        Outcome::Continue(ctx)
    }
}
