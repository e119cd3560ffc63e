use anyhow::Result;
use tracing::warn;

use super::BrowserActuator;

/// Browser pass-through without a driver. Every call is logged and succeeds.
#[derive(Debug, Default)]
pub struct LoggingBrowser {
    url: Option<String>,
}

impl LoggingBrowser {
    /// URL of the current session, if `init` was called.
    pub fn session(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl BrowserActuator for LoggingBrowser {
    fn init(&mut self, url: &str) -> Result<()> {
        warn!(
            target: "atlas::actuators",
            %url,
            "No browser driver configured; selenium_init is logged only"
        );
        self.url = Some(url.to_string());
        Ok(())
    }

    fn click(&mut self, selector: &str) -> Result<()> {
        warn!(
            target: "atlas::actuators",
            %selector, session = ?self.url,
            "No browser driver configured; selenium_click is logged only"
        );
        Ok(())
    }

    fn type_text(&mut self, selector: &str, text: &str) -> Result<()> {
        warn!(
            target: "atlas::actuators",
            %selector, %text, session = ?self.url,
            "No browser driver configured; selenium_type is logged only"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        warn!(target: "atlas::actuators", session = ?self.url, "selenium_close");
        self.url = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_session_and_always_succeeds() {
        let mut browser = LoggingBrowser::default();
        browser.click("#before-init").unwrap();
        browser.init("https://example.com").unwrap();
        assert_eq!(browser.session(), Some("https://example.com"));
        browser.type_text("input", "rust").unwrap();
        browser.close().unwrap();
        assert_eq!(browser.session(), None);
    }
}
