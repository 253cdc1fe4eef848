//! Fingerprint patches registered to run before any page script.

pub const STEALTH_SCRIPTS: &[&str] = &[
    // navigator.webdriver
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // window.chrome is missing in headless mode
    r#"
    if (!window.chrome) {
        window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
    }
    "#,
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['en-IN', 'en-US', 'en'],
        configurable: true
    });
    "#,
    // Headless reports an empty plugin list
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' }
        ],
        configurable: true
    });
    "#,
    r#"
    const originalQuery = window.navigator.permissions && window.navigator.permissions.query;
    if (originalQuery) {
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications'
                ? Promise.resolve({ state: Notification.permission })
                : originalQuery.call(window.navigator.permissions, parameters)
        );
    }
    "#,
];

/// All patches joined into a single script.
pub fn combined_script() -> String {
    STEALTH_SCRIPTS.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combined_script_contains_every_patch() {
        let script = combined_script();
        assert!(script.contains("'webdriver'"));
        assert!(script.contains("window.chrome"));
        assert!(script.contains("'languages'"));
    }
}
