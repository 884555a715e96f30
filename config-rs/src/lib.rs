//! config-rs/lib.rs
//! Shared configuration utilities for the triage gateway
//! Provides standardized functions for port/address management and the
//! location of the external ticketing backend

use std::env;
use std::net::{Ipv4Addr, SocketAddr};

/// Service name used for the gateway's `*_SERVICE_ADDR` / `*_SERVICE_PORT` variables
pub const GATEWAY_SERVICE: &str = "TICKET_GATEWAY";

/// Environment variable holding the ticketing backend base URL
pub const BACKEND_URL_VAR: &str = "TICKET_BACKEND_URL";

/// Backend base URL used when `TICKET_BACKEND_URL` is not set
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8069/api/support";

/// Load a `.env` file from the working directory if one exists
///
/// Missing files are not an error; variables already present in the process
/// environment take precedence.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => log::debug!("Loaded environment from {}", path.display()),
        Err(_) => log::debug!("No .env file found; using process environment"),
    }
}

/// Get service port from environment variables with proper fallback
///
/// # Arguments
/// * `service_name` - The name of the service (e.g., "TICKET_GATEWAY")
/// * `default_port` - The default port to use if not specified in environment
///
/// # Returns
/// The port number to use for the service
pub fn get_service_port(service_name: &str, default_port: u16) -> u16 {
    let var_name = format!("{}_SERVICE_PORT", service_name.to_uppercase());
    env::var(&var_name)
        .unwrap_or_else(|_| default_port.to_string())
        .parse::<u16>()
        .unwrap_or_else(|_| {
            log::warn!("Invalid port in {}, using default {}", var_name, default_port);
            default_port
        })
}

/// Create a SocketAddr for binding a service
///
/// Accepts either a bare `host:port` or an `http(s)://host:port` value in
/// `<SERVICE>_SERVICE_ADDR`; otherwise binds all interfaces on the configured port.
pub fn get_bind_address(service_name: &str, default_port: u16) -> SocketAddr {
    let var_name = format!("{}_SERVICE_ADDR", service_name.to_uppercase());

    if let Ok(addr_str) = env::var(&var_name) {
        let stripped = addr_str
            .strip_prefix("http://")
            .or_else(|| addr_str.strip_prefix("https://"))
            .unwrap_or(&addr_str);

        match stripped.trim_end_matches('/').parse::<SocketAddr>() {
            Ok(addr) => return addr,
            Err(_) => log::warn!("Invalid address format in {}, using default", var_name),
        }
    }

    let port = get_service_port(service_name, default_port);
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, port))
}

/// Base URL of the external ticketing backend, without a trailing slash
pub fn get_backend_base_url() -> String {
    let url = env::var(BACKEND_URL_VAR)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());

    url.trim_end_matches('/').to_string()
}

/// Get service name for logging and monitoring
pub fn get_formatted_service_name(service_name: &str) -> String {
    match service_name {
        GATEWAY_SERVICE => "ticket-gateway".to_string(),
        _ => format!("{}-service", service_name.to_lowercase().replace('_', "-")),
    }
}

/// Get default port for a specific service
pub fn get_default_port(service_name: &str) -> u16 {
    match service_name.to_uppercase().as_str() {
        GATEWAY_SERVICE => 8282,
        _ => 8300,
    }
}
