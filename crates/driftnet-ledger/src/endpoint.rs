use std::fmt;

use crate::error::{LedgerError, LedgerResult};

/// Ledger endpoint resolved from a single `host:port` configuration string.
///
/// The port in the configuration string addresses the query channel
/// (ownership, balance, chain parameters). The streaming decision channel
/// lives on a port the query channel reports at runtime;
/// [`Endpoint::decision_addr`] combines it with the configured host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    query_port: u16,
}

impl Endpoint {
    /// Parse a `host:port` string.
    pub fn parse(s: &str) -> LedgerResult<Self> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| LedgerError::Connection(format!("endpoint missing port: {s:?}")))?;
        if host.is_empty() {
            return Err(LedgerError::Connection(format!("endpoint missing host: {s:?}")));
        }
        let query_port: u16 = port
            .parse()
            .map_err(|_| LedgerError::Connection(format!("invalid endpoint port: {port:?}")))?;
        Ok(Self {
            host: host.to_string(),
            query_port,
        })
    }

    /// The configured host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Address of the query channel.
    pub fn query_addr(&self) -> String {
        format!("{}:{}", self.host, self.query_port)
    }

    /// Address of the streaming decision channel, given the port the query
    /// channel reported.
    pub fn decision_addr(&self, decision_port: u16) -> String {
        format!("{}:{}", self.host, decision_port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.query_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let ep = Endpoint::parse("ledger.example.org:9650").unwrap();
        assert_eq!(ep.host(), "ledger.example.org");
        assert_eq!(ep.query_addr(), "ledger.example.org:9650");
        assert_eq!(ep.decision_addr(9652), "ledger.example.org:9652");
    }

    #[test]
    fn rejects_missing_port() {
        assert!(Endpoint::parse("no-port-here").is_err());
    }

    #[test]
    fn rejects_missing_host() {
        assert!(Endpoint::parse(":9650").is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Endpoint::parse("host:abc").is_err());
    }
}
