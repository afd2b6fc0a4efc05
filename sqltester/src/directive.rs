///
/// Directive Filter
///
/// Recognizes the non-command control lines that legacy test scripts carry
/// and decides whether a script can run here. Every line passes through
/// `DirectiveFilter::check` before it is treated as a command or as SQL.
///
/// Checks, in priority order:
/// 1. `#...` (C-preprocessor input) is incompatible
/// 2. `---...` is incompatible
/// 3. ` SCRIPT_MODULE_NAME: <name>` names the script's module
/// 4. ` REQUIRED_PROPERTIES: <tags>` needs every tag to be supported
/// 5. ` MODULE_NAME: <name>` / ` MIXED_MODULE_NAME: <name>` is incompatible
/// 6. an embedded LF followed by `|` is incompatible
///

/// Bootstrap SQL for each engine property a script may require.
pub const CAPABILITIES: &[(&str, &str)] = &[
    ("RECURSIVE_TRIGGERS", "pragma recursive_triggers=on;"),
    ("TEMPSTORE_FILE", "pragma temp_store=1;"),
    ("TEMPSTORE_MEM", "pragma temp_store=0;"),
    ("AUTOVACUUM", "pragma auto_vacuum=full;"),
    ("INCRVACUUM", "pragma auto_vacuum=incremental;"),
];

pub fn capability_sql(tag: &str) -> Option<&'static str> {
    CAPABILITIES
        .iter()
        .find(|(name, _)| *name == tag)
        .map(|(_, sql)| *sql)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive<'a> {
    /// Ordinary line.
    None,
    ModuleName(&'a str),
    /// All listed properties are supported; the SQL must be added to the
    /// session's db-init SQL.
    RequiredProperties(Vec<&'static str>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Incompatible {
    pub detail: String,
}

impl Incompatible {
    fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveFilter {
    honor_required_properties: bool,
}

impl DirectiveFilter {
    pub fn new(honor_required_properties: bool) -> Self {
        Self {
            honor_required_properties,
        }
    }

    pub fn check<'a>(&self, line: &'a str) -> Result<Directive<'a>, Incompatible> {
        if line.starts_with('#') {
            return Err(Incompatible::new(format!("C-preprocessor input: {}", line)));
        }
        if line.starts_with("---") {
            return Err(Incompatible::new(format!("triple-dash: {}", line)));
        }
        if let Some(name) = single_token_tag(line, " SCRIPT_MODULE_NAME:") {
            return Ok(Directive::ModuleName(name));
        }

        let mut required = None;
        if let Some(props) = required_properties(line) {
            required = Some(self.resolve_properties(props)?);
        }

        for tag in [" MIXED_MODULE_NAME:", " MODULE_NAME:"] {
            if let Some(name) = single_token_tag(line, tag) {
                let tag = tag.trim().trim_end_matches(':');
                return Err(Incompatible::new(format!("{}: {}", tag, name)));
            }
        }
        if line.contains("\n|") {
            return Err(Incompatible::new("newline-pipe combination."));
        }

        Ok(required.map_or(Directive::None, Directive::RequiredProperties))
    }

    fn resolve_properties(&self, props: &str) -> Result<Vec<&'static str>, Incompatible> {
        let unsatisfied = || Incompatible::new(format!("REQUIRED_PROPERTIES: {}", props));
        if !self.honor_required_properties {
            return Err(unsatisfied());
        }
        props
            .split(is_space)
            .filter(|tag| !tag.is_empty())
            .map(|tag| capability_sql(tag).ok_or_else(unsatisfied))
            .collect()
    }
}

/// Whitespace as a script pattern sees it: ASCII space and control blanks.
pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

/// `<tag>[ \t]*<token>\s*` at the end of the line.
fn single_token_tag<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.match_indices(tag).find_map(|(idx, _)| {
        let rest = line[idx + tag.len()..].trim_start_matches([' ', '\t']);
        let token_len = rest.find(is_space).unwrap_or(rest.len());
        let (token, tail) = rest.split_at(token_len);
        (!token.is_empty() && tail.chars().all(is_space)).then_some(token)
    })
}

/// ` REQUIRED_PROPERTIES:[ \t]*(\S.*)`
fn required_properties(line: &str) -> Option<&str> {
    const TAG: &str = " REQUIRED_PROPERTIES:";
    line.match_indices(TAG).find_map(|(idx, _)| {
        let rest = line[idx + TAG.len()..].trim_start_matches([' ', '\t']);
        rest.chars()
            .next()
            .filter(|c| !is_space(*c))
            .map(|_| rest)
    })
}
