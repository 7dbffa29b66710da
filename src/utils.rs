use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ValueError;

static _VALID_IP_ADDRESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+\.){3}\d+$").unwrap());

static _VALID_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9._-]{1,61}[a-z0-9]$").unwrap());

static _VALID_TENANT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").unwrap());

pub static _VALID_ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[A-Za-z0-9_\-.]+(:\d+)?/?$").unwrap());

/// Check whether bucket name is valid
///
/// RGW accepts underscores in bucket names, otherwise the S3 rules apply.
pub fn check_bucket_name(name: &str) -> Result<(), ValueError> {
    if name.len() < 3 || name.len() > 63 {
        Err(ValueError::from(
            "Bucket name must be between 3 (min) and 63 (max) characters long.",
        ))?;
    };
    if !_VALID_NAME.is_match(name) {
        Err(ValueError::from(
            "Bucket name can consist only of lowercase letters, numbers, dots (.), underscores (_) and hyphens (-). must begin and end with a letter or number.",
        ))?;
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        Err(ValueError::from(
            "Bucket name cannot contain two adjacent periods, or a period adjacent to a hyphen.",
        ))?;
    };
    if _VALID_IP_ADDRESS.is_match(name) {
        Err(ValueError::from("Bucket name cannot be an ip address"))?;
    };
    Ok(())
}

/// Check whether an RGW tenant name is valid. Empty means "no tenant".
pub fn check_tenant_name(name: &str) -> Result<(), ValueError> {
    if !_VALID_TENANT.is_match(name) {
        Err(ValueError::from(
            "Tenant can consist only of letters, numbers, underscores (_) and hyphens (-).",
        ))?;
    }
    Ok(())
}

/// uri encode every byte except the unreserved characters: 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'.
#[inline]
pub fn urlencode(data: &str, safe_slash: bool) -> String {
    let s = urlencoding::encode(data).into_owned();
    if safe_slash {
        s.replace("%2F", "/")
    } else {
        s
    }
}

/// Format a byte count with binary units, two decimals.
pub fn human_bytes(n: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
