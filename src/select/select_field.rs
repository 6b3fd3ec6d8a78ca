use crate::select::{split_alias, ParseError, Path, SelectParser};

/// One field of a select clause, with its nested clause when it expands a
/// relation.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    /// Head exactly as written, `alias:name!hint`.
    pub raw: String,
    pub alias: Option<String>,
    pub name: String,
    pub hints: Vec<String>,
    pub children: Vec<SelectField>,
}

/// Accumulated ancestor segments while flattening nested fields.
#[derive(Debug, Default)]
pub(crate) struct PathPrefix {
    declaration: String,
    path: String,
    alias: String,
    aliased: bool,
}

fn join(prefix: Option<&str>, segment: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}.{}", prefix, segment),
        None => segment.to_string(),
    }
}

impl SelectField {
    /// Comma separated fields at the current depth. Stops in front of the `)`
    /// that closes the current nested clause.
    pub fn parse_list(parser: &mut SelectParser) -> Result<Vec<Self>, ParseError> {
        let mut fields = vec![];
        loop {
            fields.push(Self::parse(parser)?);
            parser.next_non_whitespace();

            if parser.eof() {
                if parser.depth > 0 {
                    return ParseError::new("Missing closing parenthesis", parser.position, parser).err();
                }
                return Ok(fields);
            }

            match parser.current() {
                ',' => parser.next(),
                ')' if parser.depth > 0 => return Ok(fields),
                ')' => return ParseError::new("Unbalanced parentheses", parser.position, parser).err(),
                _ => return ParseError::new("Invalid field", parser.position, parser).err(),
            }
        }
    }

    pub fn parse(parser: &mut SelectParser) -> Result<Self, ParseError> {
        parser.next_non_whitespace();
        let pivot = parser.position;

        while !parser.eof() && !matches!(parser.current(), ',' | '(' | ')') {
            parser.next();
        }

        let mut raw = parser.text_from_pivot(pivot).trim().to_string();
        if raw.is_empty() {
            return ParseError::new("Empty field", pivot, parser).err();
        }

        let (alias, rest) = split_alias(&raw);
        let alias: Option<String> = alias.map(str::to_string);
        let mut parts = rest.split('!');
        let mut name = parts.next().unwrap_or_default().to_string();
        let hints: Vec<String> = parts.map(str::to_string).collect();

        let alias_valid = alias.as_deref().is_none_or(Self::is_identifier);
        if !alias_valid || !Self::is_name(&name) || !hints.iter().all(|hint| Self::is_identifier(hint)) {
            return ParseError::new("Invalid field", pivot, parser).err();
        }

        // `count()` is an aggregate leaf, not an empty relation
        if name == "count" && hints.is_empty() && parser.text_from_range(parser.position, parser.position + 2) == "()" {
            parser.next();
            parser.next();
            raw.push_str("()");
            name.push_str("()");
        }

        let mut children = vec![];
        if parser.current() == '(' {
            parser.next();
            parser.depth += 1;
            children = Self::parse_list(parser)?;
            parser.depth -= 1;
            // parse_list only returns at depth > 0 when sitting on ')'
            parser.next();
        }

        Ok(Self {
            alias,
            raw,
            name,
            hints,
            children,
        })
    }

    fn is_identifier(text: &str) -> bool {
        !text.is_empty() && text.chars().all(|ch| ch.is_alphanumeric() || ch == '_' || ch == '-')
    }

    fn is_name(text: &str) -> bool {
        text == "*"
            || (!text.is_empty()
                && text.chars().all(|ch| ch.is_alphanumeric() || matches!(ch, '_' | '-' | '>' | ':')))
    }

    pub fn is_relation(&self) -> bool {
        !self.children.is_empty()
    }

    /// `name!hint!hint`, the segment as it appears in `Path::path`.
    pub fn path_segment(&self) -> String {
        let mut segment = self.name.clone();
        for hint in &self.hints {
            segment.push('!');
            segment.push_str(hint);
        }
        segment
    }

    fn alias_segment(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.name.split("::").next().unwrap_or(&self.name),
        }
    }

    pub(crate) fn collect_paths(&self, prefix: Option<&PathPrefix>, out: &mut Vec<Path>) {
        let current = PathPrefix {
            declaration: join(prefix.map(|p| p.declaration.as_str()), &self.raw),
            path: join(prefix.map(|p| p.path.as_str()), &self.path_segment()),
            alias: join(prefix.map(|p| p.alias.as_str()), self.alias_segment()),
            aliased: prefix.is_some_and(|p| p.aliased) || self.alias.is_some(),
        };

        if !self.is_relation() {
            out.push(Path {
                alias: current.aliased.then(|| current.alias.clone()),
                declaration: current.declaration,
                path: current.path,
            });
            return;
        }

        for child in &self.children {
            child.collect_paths(Some(&current), out);
        }
    }
}
