//! Output formatting for lookup results

use crate::entity::types::{DatabaseSummary, LookupSummary};

#[cfg(feature = "colored-output")]
use colored::Colorize;

/// Names of the flags set on a result
fn flag_names(summary: &LookupSummary) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if summary.is_anonymous_proxy {
        flags.push("anonymous-proxy");
    }
    if summary.is_satellite_provider {
        flags.push("satellite-provider");
    }
    if summary.is_anycast {
        flags.push("anycast");
    }
    if summary.is_drop {
        flags.push("drop");
    }
    flags
}

/// Location and AS part of the text line
fn describe(summary: &LookupSummary) -> String {
    let mut parts = Vec::new();

    if !summary.country_code.is_empty() {
        if summary.country_name.is_empty() {
            parts.push(summary.country_code.clone());
        } else {
            parts.push(format!("{} {}", summary.country_code, summary.country_name));
        }
    }

    match &summary.asn_name {
        Some(name) => parts.push(format!("AS{} {}", summary.asn, name)),
        None if summary.asn != 0 => parts.push(format!("AS{}", summary.asn)),
        None => {}
    }

    if parts.is_empty() {
        "[Not found]".to_string()
    } else {
        parts.join(", ")
    }
}

/// `ip -> [location, AS] network (flags)`
pub fn format_text(summary: &LookupSummary, use_color: bool) -> String {
    let info = describe(summary);
    let flags = flag_names(summary);
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" ({})", flags.join(", "))
    };

    if use_color {
        #[cfg(feature = "colored-output")]
        {
            return format!(
                "{} -> [{}] {}{}",
                summary.ip,
                info.green(),
                summary.network.cyan(),
                flags.yellow()
            );
        }
    }
    format!("{} -> [{}] {}{}", summary.ip, info, summary.network, flags)
}

/// Pretty JSON array of results
pub fn format_json(summaries: &[LookupSummary]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summaries)
}

/// Multi-line header metadata
pub fn format_info(summary: &DatabaseSummary) -> String {
    [
        format!("Vendor:             {}", summary.vendor),
        format!("Description:        {}", summary.description),
        format!("License:            {}", summary.license),
        format!("Created:            {}", summary.created_at),
        format!("Countries:          {}", summary.countries),
        format!("Autonomous systems: {}", summary.autonomous_systems),
        format!("Networks:           {}", summary.networks),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::IpAddr;

    fn summary() -> LookupSummary {
        LookupSummary {
            ip: "8.8.8.8".parse::<IpAddr>().unwrap(),
            network: "8.8.8.0/24".to_string(),
            country_code: "US".to_string(),
            country_name: "United States of America".to_string(),
            continent: "NA".to_string(),
            asn: 15169,
            asn_name: Some("GOOGLE".to_string()),
            is_anonymous_proxy: false,
            is_satellite_provider: false,
            is_anycast: false,
            is_drop: false,
        }
    }

    #[test]
    fn test_format_text_plain() {
        assert_eq!(
            format_text(&summary(), false),
            "8.8.8.8 -> [US United States of America, AS15169 GOOGLE] 8.8.8.0/24"
        );
    }

    #[test]
    fn test_format_text_flags_and_unknown_asn() {
        let mut s = summary();
        s.asn = 18734;
        s.asn_name = None;
        s.is_anycast = true;
        s.is_drop = true;
        let text = format_text(&s, false);
        assert!(text.contains("AS18734]"));
        assert!(text.ends_with("(anycast, drop)"));
    }

    #[test]
    fn test_format_text_not_found() {
        let s = LookupSummary {
            ip: "255.255.255.255".parse::<IpAddr>().unwrap(),
            network: "255.255.255.255/32".to_string(),
            country_code: String::new(),
            country_name: String::new(),
            continent: String::new(),
            asn: 0,
            asn_name: None,
            ..summary()
        };
        assert_eq!(
            format_text(&s, false),
            "255.255.255.255 -> [[Not found]] 255.255.255.255/32"
        );
    }

    #[test]
    fn test_format_json() {
        let json = format_json(&[summary()]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value[0]["country_code"], "US");
        assert_eq!(value[0]["asn_name"], "GOOGLE");
    }
}
