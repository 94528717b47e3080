use once_cell::sync::Lazy;
use regex::Regex;

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").expect("ANSI escape pattern is valid")
});

/// Strips terminal colour codes from engine output so it reads cleanly in log sinks.
pub fn render_for_display(raw: &str) -> String {
    let plain = ANSI_ESCAPE.replace_all(raw, "");
    plain
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
