use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Command used for entries that were indexed without one.
pub const DEFAULT_COMMAND: &str = "xdg-open %f";

/// Placeholder replaced by the entry path in a command template.
pub const PATH_PLACEHOLDER: &str = "%f";

/// Last-use timestamp as stored in the catalog.
///
/// The text form is `<16 hex digits of seconds>.<5 hex digits of micros>`,
/// so comparing two timestamps as strings orders them chronologically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(String);

impl Timestamp {
    pub fn now() -> Self {
        Self::from_system_time(SystemTime::now())
    }

    pub fn from_system_time(time: SystemTime) -> Self {
        let since_epoch = time.duration_since(UNIX_EPOCH).unwrap_or_default();
        Timestamp(format!(
            "{:016x}.{:05x}",
            since_epoch.as_secs(),
            since_epoch.subsec_micros()
        ))
    }

    /// Accepts the stored text form, rejecting anything else.
    pub fn parse(text: &str) -> Option<Self> {
        let (secs, micros) = text.split_once('.')?;
        if secs.len() != 16 || micros.len() != 5 {
            return None;
        }
        let secs = u64::from_str_radix(secs, 16).ok()?;
        let micros = u32::from_str_radix(micros, 16).ok()?;
        if micros >= 1_000_000 {
            return None;
        }
        Some(Self::from_system_time(
            UNIX_EPOCH + Duration::new(secs, micros * 1_000),
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: i64,
    pub path: String,          // Unique key, e.g. "/usr/share/applications/firefox.desktop"
    pub display_name: String,
    pub command_id: Option<i64>,
    pub last_use: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: i64,
    pub display_name: String,      // Unique key, e.g. "Open"
    pub execute_template: String,  // Contains a `%f` placeholder
}

/// One row returned by a catalog query.
///
/// Built fresh for every row and moved, never copied, from the catalog to
/// the result queue and on to the handler that ends up owning it.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct SearchResult {
    pub entry_id: i64,
    pub path: String,
    pub display_name: String,
    pub execute_template: String,
    pub catalog_path: PathBuf,
}

impl SearchResult {
    /// The command line for this result, with the path shell-quoted into
    /// every `%f` placeholder.
    pub fn command_line(&self) -> String {
        self.execute_template
            .replace(PATH_PLACEHOLDER, &shell_quote(&self.path))
    }
}

fn shell_quote(text: &str) -> String {
    if !text.is_empty()
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+:,=@%".contains(c))
    {
        return text.to_string();
    }
    format!("'{}'", text.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(path: &str, template: &str) -> SearchResult {
        SearchResult {
            entry_id: 1,
            path: path.to_string(),
            display_name: "x".to_string(),
            execute_template: template.to_string(),
            catalog_path: PathBuf::from("/tmp/catalog"),
        }
    }

    #[test]
    fn timestamps_sort_chronologically_as_text() {
        let early = Timestamp::from_system_time(UNIX_EPOCH + Duration::new(15, 999_999_000));
        let late = Timestamp::from_system_time(UNIX_EPOCH + Duration::new(16, 0));
        assert_eq!(early.as_str(), "000000000000000f.f423f");
        assert!(early.as_str() < late.as_str());
        assert_eq!(Timestamp::parse(late.as_str()), Some(late.clone()));
    }

    #[test]
    fn parse_rejects_other_formats() {
        assert_eq!(Timestamp::parse("2024-01-01"), None);
        assert_eq!(Timestamp::parse("0000000000000010.fffff"), None);
    }

    #[test]
    fn command_line_quotes_path() {
        assert_eq!(
            result("/tmp/hello.txt", "echo %f").command_line(),
            "echo /tmp/hello.txt"
        );
        assert_eq!(
            result("/tmp/it's here", "cat %f").command_line(),
            r"cat '/tmp/it'\''s here'"
        );
    }
}
