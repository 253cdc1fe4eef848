//! Web server command.

use console::style;

use crate::config::Config;

/// Start the web server.
pub async fn cmd_serve(config: &Config, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind)?;
    let scraper = config.build_scraper(true)?;

    println!(
        "{} Starting marketscrape API at http://{}:{}",
        style("→").cyan(),
        host,
        port
    );
    println!("  POST /api/scrape  {{\"url\": \"...\"}}");
    println!("  Press Ctrl+C to stop");

    crate::server::serve(scraper, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 127.0.0.1:3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0:3030
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
fn parse_bind_address(bind: &str) -> anyhow::Result<(String, u16)> {
    let bind = bind.trim();
    if bind.is_empty() {
        anyhow::bail!("Bind address is empty");
    }

    if let Ok(port) = bind.parse::<u16>() {
        return Ok(("127.0.0.1".to_string(), port));
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return Ok((host.to_string(), port));
        }
    }

    Ok((bind.to_string(), 3030))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_forms() {
        assert_eq!(
            parse_bind_address("8080").unwrap(),
            ("127.0.0.1".to_string(), 8080)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0").unwrap(),
            ("0.0.0.0".to_string(), 3030)
        );
        assert_eq!(
            parse_bind_address("0.0.0.0:9000").unwrap(),
            ("0.0.0.0".to_string(), 9000)
        );
        assert!(parse_bind_address("  ").is_err());
    }
}
