use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, warn};

use crate::error::AppError;

const KIB: f64 = 1024.0;

/// Parse a size string such as "500MB", "1.5gb" or "4096" into bytes.
pub fn parse_size(size_str: &str) -> Result<u64, AppError> {
    let size_str = size_str.trim().to_lowercase();
    if size_str.is_empty() {
        return Err(AppError::ParseError(
            "Invalid size: empty string".to_string(),
        ));
    }

    let split = size_str
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(size_str.len());
    let (number, unit) = size_str.split_at(split);

    let value = number
        .parse::<f64>()
        .map_err(|_| AppError::ParseError(format!("Invalid size number: '{number}'")))?;

    let multiplier = match unit.trim() {
        "" | "b" => 1.0,
        "kb" => KIB,
        "mb" => KIB * KIB,
        "gb" => KIB * KIB * KIB,
        "tb" => KIB * KIB * KIB * KIB,
        other => {
            return Err(AppError::ParseError(format!(
                "Invalid size unit: '{other}'"
            )));
        }
    };

    Ok((value * multiplier) as u64)
}

/// Convert bytes to a human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Parse "Name: Value" header strings into a HeaderMap, skipping malformed ones.
pub fn parse_headers(header_strings: &[String]) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for header_str in header_strings {
        let Some((name, value)) = header_str.split_once(':') else {
            warn!(
                "Invalid header format: '{}'. Expected 'Name: Value'",
                header_str
            );
            continue;
        };

        let name = name.trim();
        let value = value.trim();

        let Ok(header_name) = HeaderName::from_bytes(name.as_bytes()) else {
            warn!("Invalid header name: '{}'", name);
            continue;
        };
        let Ok(header_value) = HeaderValue::from_str(value) else {
            warn!("Invalid header value: '{}'", value);
            continue;
        };

        debug!("Adding header: {}: {}", name, value);
        headers.insert(header_name, header_value);
    }

    headers
}
