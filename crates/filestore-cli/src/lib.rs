//! Shared helpers for the filestore operator CLI.

use std::collections::HashMap;

use anyhow::Context;

/// Parse `key=value` pairs given on the command line. Later keys win.
pub fn parse_params(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .with_context(|| format!("Expected key=value, got '{}'", pair))?;
            let key = key.trim();
            if key.is_empty() {
                anyhow::bail!("Empty parameter name in '{}'", pair);
            }
            Ok((key.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_params_pairs() {
        let params = parse_params(&[
            "response-content-type=text/plain".to_string(),
            "response-content-disposition=attachment; filename=a=b.txt".to_string(),
        ])
        .unwrap();
        assert_eq!(params["response-content-type"], "text/plain");
        assert_eq!(
            params["response-content-disposition"],
            "attachment; filename=a=b.txt"
        );
    }

    #[test]
    fn parse_params_rejects_malformed() {
        assert!(parse_params(&["novalue".to_string()]).is_err());
        assert!(parse_params(&["=x".to_string()]).is_err());
        assert!(parse_params(&[]).unwrap().is_empty());
    }
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
