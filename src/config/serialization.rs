//! Config serialization to TOML
//!
//! Single source of truth for config file format.

use super::Config;

/// Quote a string as a TOML basic string
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Config {
    /// Serialize [operator], omitting office_id when unset
    fn operator_to_toml(&self) -> String {
        let mut output = format!(
            "[operator]\nid = {}\nrole = {}  # ADMIN, OFFICE_ADMIN, ADVISOR\n",
            quoted(&self.operator.id),
            quoted(self.operator.role.as_str())
        );
        match &self.operator.office_id {
            Some(office) => output.push_str(&format!("office_id = {}\n", quoted(office))),
            None => output.push_str("# office_id = \"office-1\"  # required for OFFICE_ADMIN\n"),
        }
        output
    }

    /// Serialize [assistant]; the API key is never written
    fn assistant_to_toml(&self) -> String {
        let a = &self.assistant;
        let mut output = format!(
            "[assistant]\nprovider = {}  # scripted, openai\napi_base = {}\nmodel = {}\ntimeout_secs = {}\nmax_history = {}\nscripted_delay_ms = {}\n",
            quoted(a.provider.as_str()),
            quoted(&a.api_base),
            quoted(&a.model),
            a.timeout_secs,
            a.max_history,
            a.scripted_delay_ms,
        );
        output.push_str("# Prefer the LUMA_ASSISTANT_API_KEY environment variable\n# api_key = \"sk-...\"\n");
        output
    }

    /// Generate config file content with current values
    pub fn to_toml(&self) -> String {
        format!(
            r#"# luma-chat configuration

# SQLite database with clients, policies and conversations
db_path = {db_path}

# Theme: dark, light
theme = {theme}

# Who is operating the chat screen (env: LUMA_OPERATOR_ID, LUMA_OPERATOR_ROLE)
{operator}
# Assistant that answers questions about policies
{assistant}
# Chat view
[ui]
composer_min_lines = {min_lines}
composer_max_lines = {max_lines}
toast_secs = {toast_secs}
tick_ms = {tick_ms}

# Logging configuration (RUST_LOG env var overrides)
[logging]
level = {log_level}
# File logging (in addition to the TUI buffer or stderr)
file_enabled = {log_file_enabled}
file_dir = {log_file_dir}
file_rotation = {log_file_rotation}  # hourly, daily, never
file_prefix = {log_file_prefix}
"#,
            db_path = quoted(&self.db_path.display().to_string()),
            theme = quoted(&self.theme),
            operator = self.operator_to_toml(),
            assistant = self.assistant_to_toml(),
            min_lines = self.ui.composer_min_lines,
            max_lines = self.ui.composer_max_lines,
            toast_secs = self.ui.toast_secs,
            tick_ms = self.ui.tick_ms,
            log_level = quoted(&self.logging.level),
            log_file_enabled = self.logging.file_enabled,
            log_file_dir = quoted(&self.logging.file_dir.display().to_string()),
            log_file_rotation = quoted(self.logging.file_rotation.as_str()),
            log_file_prefix = quoted(&self.logging.file_prefix),
        )
    }
}
