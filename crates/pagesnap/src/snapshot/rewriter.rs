//! Point captured markup at the local asset copies.
//!
//! Only `src`/`href` attribute values and CSS `url(...)` arguments are
//! candidates, and a candidate is replaced only when its whole text is a
//! literal from the mapping. Everything else, quotes included, is copied
//! through unchanged.

use crate::types::AssetMapping;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static ATTRIBUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(\s(?:src|href)\s*=\s*)(?:"([^"]*)"|'([^']*)')"#)
        .expect("valid attribute regex")
});

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(url\(\s*)(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))(\s*\))"#)
        .expect("valid url() regex")
});

/// Replace every mapped literal in `html` with its local path.
///
/// With an empty mapping the input is returned unchanged.
pub fn rewrite(html: &str, mapping: &AssetMapping) -> String {
    if mapping.is_empty() {
        return html.to_string();
    }

    let pass = ATTRIBUTE_RE.replace_all(html, |caps: &Captures| {
        let prefix = &caps[1];
        match (caps.get(2), caps.get(3)) {
            (Some(v), _) => format!(r#"{prefix}"{}""#, lookup(mapping, v.as_str())),
            (_, Some(v)) => format!("{prefix}'{}'", lookup(mapping, v.as_str())),
            _ => caps[0].to_string(),
        }
    });

    CSS_URL_RE
        .replace_all(&pass, |caps: &Captures| {
            let open = &caps[1];
            let close = &caps[5];
            if let Some(v) = caps.get(2) {
                format!(r#"{open}"{}"{close}"#, lookup(mapping, v.as_str()))
            } else if let Some(v) = caps.get(3) {
                format!("{open}'{}'{close}", lookup(mapping, v.as_str()))
            } else if let Some(v) = caps.get(4) {
                format!("{open}{}{close}", lookup_unquoted(mapping, v.as_str()))
            } else {
                caps[0].to_string()
            }
        })
        .into_owned()
}

/// Local path for `value`, or `value` itself when it is not a mapped literal.
///
/// Serialized attributes spell `&` as `&amp;`, so the unescaped form is
/// tried as well.
fn lookup<'a>(mapping: &'a AssetMapping, value: &'a str) -> &'a str {
    if let Some(local) = mapping.get(value) {
        return local;
    }
    if value.contains("&amp;") {
        if let Some(local) = mapping.get(&value.replace("&amp;", "&")) {
            return local;
        }
    }
    value
}

/// `url(&quot;x&quot;)` inside a double-quoted `style` attribute.
fn lookup_unquoted(mapping: &AssetMapping, value: &str) -> String {
    if let Some(inner) = value
        .strip_prefix("&quot;")
        .and_then(|v| v.strip_suffix("&quot;"))
    {
        let local = lookup(mapping, inner);
        if local != inner {
            return format!("&quot;{local}&quot;");
        }
    }
    lookup(mapping, value).to_string()
}
