use crate::config::StealthSection;

/// Immutable bundle of spoofed browser signals, applied identically to
/// every engine attempt. Passed into the acquirer explicitly so tests can
/// build one without touching configuration files.
#[derive(Debug, Clone)]
pub struct StealthProfile {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub languages: Vec<String>,
    pub accept_language: Option<String>,
    pub bypass_csp: bool,
}

// Opaque payloads, not logic. They must run at document-start, before the
// target site's own scripts.
const WEBDRIVER_OVERRIDE: &str = r#"
(() => {
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    if (Navigator.prototype && 'webdriver' in Navigator.prototype) {
        try { delete Navigator.prototype.webdriver; } catch (_) {}
    }
})();
"#;

const PLUGINS_OVERRIDE: &str = r#"
(() => {
    const fakePlugins = [
        { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
        { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
        { name: 'Native Client', filename: 'internal-nacl-plugin' },
    ];
    Object.defineProperty(navigator, 'plugins', {
        get: () => {
            const list = fakePlugins.map(p => Object.assign({}, p));
            list.item = (i) => list[i] || null;
            list.namedItem = (name) => list.find(p => p.name === name) || null;
            list.refresh = () => {};
            return list;
        },
    });
})();
"#;

const PERMISSIONS_OVERRIDE: &str = r#"
(() => {
    if (!navigator.permissions || !navigator.permissions.query) {
        return;
    }
    const originalQuery = navigator.permissions.query.bind(navigator.permissions);
    navigator.permissions.query = (parameters) => {
        if (parameters && parameters.name === 'notifications') {
            return Promise.resolve({ state: Notification.permission });
        }
        return originalQuery(parameters);
    };
})();
"#;

const CHROME_RUNTIME_OVERRIDE: &str = r#"
(() => {
    if (!window.chrome) {
        window.chrome = {};
    }
    if (!window.chrome.runtime) {
        window.chrome.runtime = {};
    }
})();
"#;

impl StealthProfile {
    pub fn from_config(section: &StealthSection) -> Self {
        Self {
            user_agent: section.user_agent.clone(),
            viewport_width: section.viewport[0],
            viewport_height: section.viewport[1],
            locale: section.locale.clone(),
            languages: section.languages.clone(),
            accept_language: section.accept_language.clone(),
            bypass_csp: section.bypass_csp,
        }
    }

    /// Fingerprint-override scripts in injection order.
    pub fn override_scripts(&self) -> Vec<String> {
        vec![
            WEBDRIVER_OVERRIDE.to_string(),
            PLUGINS_OVERRIDE.to_string(),
            self.languages_script(),
            PERMISSIONS_OVERRIDE.to_string(),
            CHROME_RUNTIME_OVERRIDE.to_string(),
        ]
    }

    fn languages_script(&self) -> String {
        let mut languages = self.languages.clone();
        if languages.is_empty() {
            languages.push(self.locale.clone());
        }
        let list = languages
            .iter()
            .map(|lang| format!("'{lang}'"))
            .collect::<Vec<_>>()
            .join(", ");
        let primary = &languages[0];
        format!(
            "Object.defineProperty(navigator, 'language', {{ get: () => '{primary}' }});\n\
             Object.defineProperty(navigator, 'languages', {{ get: () => [{list}] }});"
        )
    }
}
