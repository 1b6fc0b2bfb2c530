//! IP allow/deny rules.
//!
//! Rules come in three shapes:
//! - `10.0.0.0/8`, `fd00::/8`: CIDR block
//! - `192.168.1`: dotted prefix, octet by octet
//! - anything else: exact string match
//!
//! The compiled rule set lives behind an `ArcSwap` so a config reload
//! replaces it without blocking requests.

use std::net::IpAddr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::IpAccessConfig;
use crate::error::GuardError;
use crate::security::client_ip::client_ip;

/// Why an address was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Blacklisted,
    NotWhitelisted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("client {ip} denied ({reason:?})")]
pub struct AccessDenied {
    pub ip: String,
    pub reason: DenyReason,
}

/// Address block with its prefix length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidrBlock {
    network: IpAddr,
    prefix_len: u8,
}

impl CidrBlock {
    pub fn parse(rule: &str) -> Option<Self> {
        let (addr, len) = rule.trim().split_once('/')?;
        let network: IpAddr = addr.parse().ok()?;
        let prefix_len: u8 = len.parse().ok()?;
        let max = match network {
            IpAddr::V4(_) => 32,
            IpAddr::V6(_) => 128,
        };
        (prefix_len <= max).then_some(Self {
            network,
            prefix_len,
        })
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = u32::MAX.checked_shl(32 - self.prefix_len as u32).unwrap_or(0);
                u32::from(net) & mask == u32::from(*ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = u128::MAX.checked_shl(128 - self.prefix_len as u32).unwrap_or(0);
                u128::from(net) & mask == u128::from(*ip) & mask
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpRule {
    Exact(String),
    Prefix(Vec<String>),
    Cidr(CidrBlock),
    /// Unparseable CIDR; never matches.
    Invalid(String),
}

impl IpRule {
    pub fn parse(rule: &str) -> Self {
        let rule = rule.trim();
        if rule.contains('/') {
            return match CidrBlock::parse(rule) {
                Some(block) => IpRule::Cidr(block),
                None => IpRule::Invalid(rule.to_string()),
            };
        }
        if rule.contains('.') {
            let parts: Vec<String> = rule.split('.').map(str::to_string).collect();
            if parts.len() < 4 {
                return IpRule::Prefix(parts);
            }
        }
        IpRule::Exact(rule.to_string())
    }

    pub fn matches(&self, ip: &str) -> bool {
        match self {
            IpRule::Exact(rule) => rule == ip,
            IpRule::Prefix(parts) => {
                let octets: Vec<&str> = ip.split('.').collect();
                octets.len() >= parts.len()
                    && parts.iter().zip(&octets).all(|(rule, octet)| rule == octet)
            }
            IpRule::Cidr(block) => ip
                .parse::<IpAddr>()
                .map(|addr| block.contains(&addr))
                .unwrap_or(false),
            IpRule::Invalid(_) => false,
        }
    }
}

/// Compiled whitelist and blacklist.
#[derive(Debug, Clone, Default)]
pub struct IpRuleSet {
    enable_whitelist: bool,
    whitelist: Vec<IpRule>,
    enable_blacklist: bool,
    blacklist: Vec<IpRule>,
}

impl IpRuleSet {
    pub fn compile(config: &IpAccessConfig) -> Self {
        Self {
            enable_whitelist: config.enable_whitelist,
            whitelist: compile_list("whitelist", &config.whitelist),
            enable_blacklist: config.enable_blacklist,
            blacklist: compile_list("blacklist", &config.blacklist),
        }
    }

    pub fn is_active(&self) -> bool {
        self.enable_whitelist || self.enable_blacklist
    }

    /// Blacklist first, then the whitelist when enabled.
    pub fn check(&self, ip: &str) -> Result<(), AccessDenied> {
        if self.enable_blacklist && self.blacklist.iter().any(|r| r.matches(ip)) {
            return Err(AccessDenied {
                ip: ip.to_string(),
                reason: DenyReason::Blacklisted,
            });
        }
        if self.enable_whitelist && !self.whitelist.iter().any(|r| r.matches(ip)) {
            return Err(AccessDenied {
                ip: ip.to_string(),
                reason: DenyReason::NotWhitelisted,
            });
        }
        Ok(())
    }
}

fn compile_list(name: &str, rules: &[String]) -> Vec<IpRule> {
    rules
        .iter()
        .map(|raw| {
            let rule = IpRule::parse(raw);
            if let IpRule::Invalid(bad) = &rule {
                tracing::warn!(list = name, rule = %bad, "Ignoring invalid CIDR rule");
            }
            rule
        })
        .collect()
}

/// IP access guard with hot-swappable rules.
#[derive(Debug)]
pub struct IpAccessController {
    rules: ArcSwap<IpRuleSet>,
}

impl IpAccessController {
    pub fn new(config: &IpAccessConfig) -> Self {
        Self {
            rules: ArcSwap::from_pointee(IpRuleSet::compile(config)),
        }
    }

    pub fn check(&self, ip: &str) -> Result<(), AccessDenied> {
        self.rules.load().check(ip)
    }

    pub fn is_active(&self) -> bool {
        self.rules.load().is_active()
    }

    /// Replace the rule set. In-flight checks finish against the old one.
    pub fn reload(&self, config: &IpAccessConfig) {
        self.rules.store(Arc::new(IpRuleSet::compile(config)));
        tracing::info!(
            enable_whitelist = config.enable_whitelist,
            whitelist = config.whitelist.len(),
            enable_blacklist = config.enable_blacklist,
            blacklist = config.blacklist.len(),
            "IP access rules reloaded"
        );
    }
}

/// Middleware: 403 for refused client addresses.
pub async fn ip_access(
    State(controller): State<Arc<IpAccessController>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    match controller.check(&ip) {
        Ok(()) => {
            tracing::debug!(client = %ip, "IP access allowed");
            next.run(request).await
        }
        Err(denied) => {
            tracing::warn!(client = %ip, reason = ?denied.reason, path = %request.uri().path(), "IP access denied");
            GuardError::from(denied).into_response()
        }
    }
}
