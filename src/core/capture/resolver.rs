use regex::Regex;

pub const DEFAULT_LABEL: &str = "Booklet";

/// 从文字中解析编号：`<label> <数字>`
#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    pattern: Regex,
}

impl IdentifierResolver {
    pub fn new(label: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(r"{}\s+(\d+)", regex::escape(label)))?;
        Ok(Self { pattern })
    }

    /// Missing labels and unparsable numbers both resolve to `None`.
    pub fn resolve_identifier(&self, text: &str) -> Option<i64> {
        self.pattern
            .captures_iter(text)
            .next()
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
    }
}

impl Default for IdentifierResolver {
    fn default() -> Self {
        Self {
            pattern: Regex::new(r"Booklet\s+(\d+)").expect("static pattern"),
        }
    }
}
