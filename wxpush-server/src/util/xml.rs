//! XML text helpers.

/// Wrap `value` in a CDATA section.
///
/// A literal `]]>` cannot appear inside CDATA, so it is split across two
/// adjacent sections.
pub fn cdata(value: &str) -> String {
    format!("<![CDATA[{}]]>", value.replace("]]>", "]]]]><![CDATA[>"))
}
