//! Free-argument names with value-syntax rules attached.

/// STB MAC address.
pub const ESTB_MAC: &str = "eStbMac";
/// Cable-modem MAC address.
pub const ECM_MAC: &str = "eCMMac";
/// Long-form STB MAC address.
pub const ESTB_MAC_ADDRESS: &str = "estbMacAddress";
/// Long-form cable-modem MAC address.
pub const ECM_MAC_ADDRESS: &str = "ecmMacAddress";
/// Device IP address.
pub const IP_ADDRESS: &str = "ipAddress";
/// STB IP address.
pub const ESTB_IP: &str = "estbIP";
/// Device model.
pub const MODEL: &str = "model";
/// Deployment environment.
pub const ENV: &str = "env";
/// Reported firmware version.
pub const FIRMWARE_VERSION: &str = "firmwareVersion";

const MAC_ARGS: [&str; 4] = [ESTB_MAC, ECM_MAC, ESTB_MAC_ADDRESS, ECM_MAC_ADDRESS];
const IP_ARGS: [&str; 2] = [IP_ADDRESS, ESTB_IP];

/// Returns `true` when values of `free_arg` must be MAC addresses.
#[must_use]
pub fn is_mac_arg(free_arg: &str) -> bool {
    MAC_ARGS.iter().any(|name| name.eq_ignore_ascii_case(free_arg.trim()))
}

/// Returns `true` when values of `free_arg` must be IP addresses.
#[must_use]
pub fn is_ip_arg(free_arg: &str) -> bool {
    IP_ARGS.iter().any(|name| name.eq_ignore_ascii_case(free_arg.trim()))
}
