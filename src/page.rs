//! Environment introspection for the current "page load"

use serde::{Deserialize, Serialize};

/// Hostnames treated as a development machine
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]", "0.0.0.0"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

/// Where and in what environment entries are being captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub hostname: String,
    pub path: String,
    pub referrer: Option<String>,
    pub screen: Option<ScreenSize>,
    pub user_agent: String,
}

impl Default for PageContext {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            path: "/".to_string(),
            referrer: None,
            screen: None,
            user_agent: format!("sitelog/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PageContext {
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Local or development host: entries get mirrored to the console
    pub fn is_local_host(&self) -> bool {
        let host = self.hostname.to_lowercase();
        LOCAL_HOSTS.contains(&host.as_str()) || host.ends_with(".localhost") || host.ends_with(".local")
    }

    /// Context attached to page-view entries
    pub fn pageview_data(&self) -> serde_json::Value {
        let mut data = serde_json::Map::new();
        data.insert(
            "referrer".to_string(),
            self.referrer
                .as_ref()
                .map_or(serde_json::Value::Null, |r| serde_json::Value::String(r.clone())),
        );
        if let Some(screen) = self.screen {
            data.insert("screenWidth".to_string(), screen.width.into());
            data.insert("screenHeight".to_string(), screen.height.into());
        }
        data.insert("userAgent".to_string(), self.user_agent.clone().into());
        serde_json::Value::Object(data)
    }
}

/// Screen dimensions of the controlling terminal, if there is one
pub fn terminal_screen() -> Option<ScreenSize> {
    terminal_size::terminal_size().map(|(width, height)| ScreenSize {
        width: u32::from(width.0),
        height: u32::from(height.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(hostname: &str) -> PageContext {
        PageContext {
            hostname: hostname.to_string(),
            ..PageContext::default()
        }
    }

    #[test]
    fn test_local_hosts() {
        assert!(page("localhost").is_local_host());
        assert!(page("127.0.0.1").is_local_host());
        assert!(page("LOCALHOST").is_local_host());
        assert!(page("blog.localhost").is_local_host());
        assert!(page("laptop.local").is_local_host());
    }

    #[test]
    fn test_public_host() {
        assert!(!page("example.com").is_local_host());
        assert!(!page("localhost.example.com").is_local_host());
    }

    #[test]
    fn test_pageview_data() {
        let context = PageContext {
            hostname: "example.com".to_string(),
            path: "/docs".to_string(),
            referrer: Some("https://search.example".to_string()),
            screen: Some(ScreenSize { width: 120, height: 40 }),
            user_agent: "test-agent".to_string(),
        };

        let data = context.pageview_data();
        assert_eq!(data["referrer"], "https://search.example");
        assert_eq!(data["screenWidth"], 120);
        assert_eq!(data["screenHeight"], 40);
        assert_eq!(data["userAgent"], "test-agent");
    }

    #[test]
    fn test_pageview_data_without_screen() {
        let data = PageContext::default().pageview_data();
        assert!(data["referrer"].is_null());
        assert!(data.get("screenWidth").is_none());
    }
}
