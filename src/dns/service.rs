//! Local port-to-service-name table.
//!
//! Covers the well-known assignments reverse lookups actually meet; ports
//! without an entry render as their decimal string. Service naming is a
//! local concern and is never delegated to a resolver hook.

/// Service name for `port`, e.g. `"http"` for 80.
pub(crate) fn name_for(port: u16) -> String {
    let name = match port {
        20 => "ftp-data",
        21 => "ftp",
        22 => "ssh",
        23 => "telnet",
        25 => "smtp",
        53 => "domain",
        80 => "http",
        110 => "pop3",
        119 => "nntp",
        123 => "ntp",
        143 => "imap",
        161 => "snmp",
        194 => "irc",
        443 => "https",
        465 => "submissions",
        587 => "submission",
        993 => "imaps",
        995 => "pop3s",
        _ => return port.to_string(),
    };
    name.to_string()
}
