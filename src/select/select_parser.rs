use crate::select::{ParseError, Path, SelectField};

/// Character cursor over a select clause.
#[derive(Debug, Default)]
pub struct SelectParser {
    pub position: usize,
    pub length: usize,
    pub text_v: Vec<char>,
    pub text: String,
    pub depth: usize,
}

impl SelectParser {
    pub fn new(clause: &str) -> Self {
        let text_v: Vec<char> = clause.chars().collect();
        Self {
            position: 0,
            length: text_v.len(),
            text_v,
            text: clause.to_string(),
            depth: 0,
        }
    }

    /// Parses a select clause into its ordered leaf paths.
    ///
    /// An empty (or blank) clause selects nothing. Malformed input is a hard
    /// error, there is no partial recovery.
    pub fn parse(clause: &str) -> Result<Vec<Path>, ParseError> {
        if clause.trim().is_empty() {
            return Ok(vec![]);
        }

        let mut parser = Self::new(clause);
        let fields = SelectField::parse_list(&mut parser)?;

        let mut paths = vec![];
        for field in &fields {
            field.collect_paths(None, &mut paths);
        }
        Ok(paths)
    }

    pub fn eof(&self) -> bool {
        self.position >= self.length
    }

    pub fn current(&self) -> char {
        if self.position < self.length {
            return self.text_v[self.position];
        }

        '\0'
    }

    pub fn next(&mut self) {
        self.position += 1;
    }

    pub fn next_non_whitespace(&mut self) {
        while self.current().is_whitespace() {
            self.next();
        }
    }

    pub fn jump(&mut self, ahead: usize) {
        if self.position + ahead < self.length {
            self.position += ahead;
        } else {
            self.position = self.length.saturating_sub(1);
        }
    }

    pub fn text_from_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.length);
        if start >= end {
            return String::new();
        }
        self.text_v[start..end].iter().collect()
    }

    pub fn text_from_pivot(&self, pivot: usize) -> String {
        self.text_from_range(pivot, self.position)
    }
}

pub fn parse_select(clause: &str) -> Result<Vec<Path>, ParseError> {
    SelectParser::parse(clause)
}

#[cfg(test)]
mod tests {
    use crate::select::{parse_select, Path};

    fn p(declaration: &str, path: &str, alias: Option<&str>) -> Path {
        Path::new(declaration, path, alias)
    }

    #[test]
    pub fn test_parse_flat_columns() {
        let result = parse_select("something,the,user,queries").expect("Failed to parse select");

        assert_eq!(result, vec![
            Path::from_path("something"),
            Path::from_path("the"),
            Path::from_path("user"),
            Path::from_path("queries"),
        ]);
    }

    #[test]
    pub fn test_parse_aliased_relation() {
        let result = parse_select("id,assignee:assignee_id(id,test_name:display_name),tags:tag(id,tag_name:name)")
            .expect("Failed to parse select");

        assert_eq!(result, vec![
            p("id", "id", None),
            p("assignee:assignee_id.id", "assignee_id.id", Some("assignee.id")),
            p("assignee:assignee_id.test_name:display_name", "assignee_id.display_name", Some("assignee.test_name")),
            p("tags:tag.id", "tag.id", Some("tags.id")),
            p("tags:tag.tag_name:name", "tag.name", Some("tags.tag_name")),
        ]);
    }

    #[test]
    pub fn test_parse_nested_alias_inside_unaliased_relation() {
        let result = parse_select("note_id(test,relation_id,rel:relation_id(test))").expect("Failed to parse select");

        assert_eq!(result, vec![
            p("note_id.test", "note_id.test", None),
            p("note_id.relation_id", "note_id.relation_id", None),
            p("note_id.rel:relation_id.test", "note_id.relation_id.test", Some("note_id.rel.test")),
        ]);
    }

    #[test]
    pub fn test_parse_hints_are_kept_in_path() {
        let result = parse_select(
            "created_by:employee!created_by_employee_id(display_name),recipient!recipient_conversation_id_fkey!inner(contact_id)",
        )
        .expect("Failed to parse select");

        assert_eq!(result, vec![
            p(
                "created_by:employee!created_by_employee_id.display_name",
                "employee!created_by_employee_id.display_name",
                Some("created_by.display_name"),
            ),
            p(
                "recipient!recipient_conversation_id_fkey!inner.contact_id",
                "recipient!recipient_conversation_id_fkey!inner.contact_id",
                None,
            ),
        ]);
    }

    #[test]
    pub fn test_parse_keeps_count_and_wildcard() {
        let result = parse_select("*,relation(count),tags:tag(*)").expect("Failed to parse select");

        assert_eq!(result, vec![
            p("*", "*", None),
            p("relation.count", "relation.count", None),
            p("tags:tag.*", "tag.*", Some("tags.*")),
        ]);
        assert!(result[1].is_aggregate());
        assert!(result[2].is_wildcard());
    }

    #[test]
    pub fn test_parse_count_call() {
        let result = parse_select("id,count(),notes(count())").expect("Failed to parse select");

        assert_eq!(result, vec![
            p("id", "id", None),
            p("count()", "count()", None),
            p("notes.count()", "notes.count()", None),
        ]);
        assert!(result[1].is_aggregate());
        assert!(result[2].is_aggregate());
        assert!(parse_select("id,counter()").is_err());
    }

    #[test]
    pub fn test_parse_with_whitespace() {
        let result = parse_select(" id , inbox:inbox_id ( id , name ) ").expect("Failed to parse select");

        assert_eq!(result, vec![
            p("id", "id", None),
            p("inbox:inbox_id.id", "inbox_id.id", Some("inbox.id")),
            p("inbox:inbox_id.name", "inbox_id.name", Some("inbox.name")),
        ]);
    }

    #[test]
    pub fn test_parse_empty_clause() {
        assert!(parse_select("").expect("Failed to parse select").is_empty());
    }

    #[test]
    pub fn test_parse_unbalanced_parentheses() {
        let err = parse_select("id,rel(a,b").expect_err("Parser must reject unclosed parenthesis");
        assert_eq!(err.message, "Missing closing parenthesis");

        let err = parse_select("id,a)").expect_err("Parser must reject stray parenthesis");
        assert_eq!(err.message, "Unbalanced parentheses");
        assert_eq!(err.start, 4);
    }

    #[test]
    pub fn test_parse_empty_field() {
        let err = parse_select("id,,name").expect_err("Parser must reject empty field");
        assert_eq!(err.message, "Empty field");

        assert!(parse_select("id,").is_err());
        assert!(parse_select("rel()").is_err());
        assert!(parse_select(":name").is_err());
    }

    #[test]
    pub fn test_parse_invalid_field() {
        let err = parse_select("first name").expect_err("Parser must reject whitespace in names");
        assert_eq!(err.message, "Invalid field");

        assert!(parse_select("rel(a)b").is_err());
        assert!(parse_select("rel!(a)").is_err());
    }
}
