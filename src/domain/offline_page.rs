//! Self-contained offline fallback document

/// Renders the page served for navigations that cannot be satisfied.
///
/// The document carries inline styles only and references no scripts or
/// external resources, so it renders with nothing else cached.
pub fn render(app_name: &str, version: &str) -> String {
    let app_name = escape_html(app_name);
    let version = escape_html(version);

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{app_name} - Offline</title>
<style>
body {{ margin: 0; min-height: 100vh; display: flex; align-items: center; justify-content: center; font-family: system-ui, sans-serif; background: #f4f6f8; color: #1f2933; }}
main {{ max-width: 28rem; padding: 2rem; text-align: center; background: #fff; border-radius: 12px; box-shadow: 0 2px 12px rgba(0, 0, 0, 0.08); }}
h1 {{ font-size: 1.5rem; margin: 0 0 0.75rem; }}
p {{ line-height: 1.5; margin: 0 0 0.75rem; }}
small {{ color: #7b8794; }}
</style>
</head>
<body>
<main>
<h1>You are offline</h1>
<p>{app_name} cannot reach the network right now. Pages and data you opened before are still available.</p>
<p>Reconnect and reload this page to continue where you left off.</p>
<small>Version {version}</small>
</main>
</body>
</html>
"#
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }

    escaped
}
