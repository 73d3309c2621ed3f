//! Netscape `cookies.txt` credential.
//!
//! Browser extensions such as "Get cookies.txt LOCALLY" export one cookie per
//! line as seven tab-separated fields:
//!
//! ```text
//! domain  include_subdomains  path  secure  expiry  name  value
//! ```
//!
//! Lines starting with `#` are comments, except the `#HttpOnly_` prefix
//! which marks an HTTP-only cookie.

use std::path::Path;

use super::ChatError;

const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One cookie from the export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub domain: String,
    pub name: String,
    pub value: String,
}

/// Cookies handed to the chat source when opening a session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credential {
    cookies: Vec<Cookie>,
}

impl Credential {
    /// Read and parse a Netscape cookie file.
    ///
    /// # Errors
    ///
    /// [`ChatError::Credential`] when the file cannot be read or contains no
    /// cookies at all.
    pub fn from_netscape_file(path: &Path) -> Result<Self, ChatError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ChatError::Credential(format!("cannot read {}: {e}", path.display()))
        })?;
        let credential = Self::parse_netscape(&content);
        if credential.is_empty() {
            return Err(ChatError::Credential(format!(
                "{} contains no cookies",
                path.display()
            )));
        }
        Ok(credential)
    }

    /// Parse Netscape cookie text, skipping comments and malformed lines.
    pub fn parse_netscape(content: &str) -> Self {
        let cookies = content
            .lines()
            .filter_map(|raw| {
                let line = raw.trim_end_matches(['\r', '\n']);
                let line = match line.strip_prefix(HTTP_ONLY_PREFIX) {
                    Some(rest) => rest,
                    None if line.starts_with('#') || line.trim().is_empty() => return None,
                    None => line,
                };

                let fields: Vec<&str> = line.split('\t').collect();
                if fields.len() != 7 {
                    log::debug!("cookies: skipping malformed line");
                    return None;
                }
                Some(Cookie {
                    domain: fields[0].to_string(),
                    name: fields[5].to_string(),
                    value: fields[6].to_string(),
                })
            })
            .collect();

        Self { cookies }
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// `Cookie` header value for requests to `host`, or `None` when no
    /// cookie applies.
    pub fn header_for(&self, host: &str) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| domain_matches(&c.domain, host))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();

        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}

fn domain_matches(cookie_domain: &str, host: &str) -> bool {
    let domain = cookie_domain.trim_start_matches('.');
    host == domain || host.ends_with(&format!(".{domain}"))
}
