use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::debug;

use crate::builder::{CollisionMember, DedupePolicy, GroupedPath, NestedPath, NodeKind, PreferUnhintedRelation, SelectTree};
use crate::select::Path;

/// Result of merging paths into one select clause.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub statement: String,
    /// Emitted leaves with dedupe aliases applied.
    pub paths: Vec<Path>,
    pub grouped_paths: Vec<GroupedPath>,
}

impl SelectStatement {
    pub fn is_empty(&self) -> bool {
        self.statement.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
struct EmitPrefix {
    declaration: String,
    path: String,
    alias: String,
    aliased: bool,
}

impl EmitPrefix {
    fn extend(&self, declaration: &str, path: &str, alias: &str, aliased: bool) -> Self {
        let join = |prefix: &str, segment: &str| {
            if prefix.is_empty() { segment.to_string() } else { format!("{}.{}", prefix, segment) }
        };
        Self {
            declaration: join(&self.declaration, declaration),
            path: join(&self.path, path),
            alias: join(&self.alias, alias),
            aliased: self.aliased || aliased,
        }
    }
}

pub struct SelectStatementBuilder<'a> {
    policy: &'a dyn DedupePolicy,
}

impl Default for SelectStatementBuilder<'static> {
    fn default() -> Self {
        Self { policy: &PreferUnhintedRelation }
    }
}

impl<'a> SelectStatementBuilder<'a> {
    pub fn with_policy(policy: &'a dyn DedupePolicy) -> Self {
        Self { policy }
    }

    pub fn build(&self, paths: &[Path]) -> SelectStatement {
        let tree = SelectTree::from_paths(paths);

        // d_<n>_ counter, scoped to this call
        let mut counter = 0usize;
        let mut flat = vec![];
        let grouped_paths = self.emit(&tree, SelectTree::ROOT, &EmitPrefix::default(), &mut counter, &mut flat);
        let statement = GroupedPath::to_statement(&grouped_paths);

        debug!(statement = %statement, input_paths = paths.len(), dedupe_aliases = counter, "select statement built");

        SelectStatement { statement, paths: flat, grouped_paths }
    }

    fn emit(
        &self,
        tree: &SelectTree,
        parent: usize,
        prefix: &EmitPrefix,
        counter: &mut usize,
        flat: &mut Vec<Path>,
    ) -> Vec<GroupedPath> {
        let visible: Vec<usize> = tree.children(parent).filter(|idx| !tree.is_suppressed(*idx)).collect();
        let dedupe = self.colliding(tree, &visible);

        let mut grouped = vec![];
        for idx in visible {
            let node = tree.node(idx);

            let dedupe_alias = dedupe.contains(&idx).then(|| {
                let alias = format!("d_{}_{}", counter, node.name);
                *counter += 1;
                alias
            });
            let alias = dedupe_alias.or_else(|| node.alias.clone());
            let declaration = match &alias {
                Some(alias) => format!("{}:{}", alias, node.path),
                None => node.path.clone(),
            };
            let next = prefix.extend(
                &declaration,
                &node.path,
                alias.as_deref().unwrap_or(&node.name),
                alias.is_some(),
            );

            match node.kind {
                NodeKind::Leaf => {
                    flat.push(Path {
                        declaration: next.declaration.clone(),
                        path: next.path.clone(),
                        alias: next.aliased.then(|| next.alias.clone()),
                    });
                    grouped.push(GroupedPath::Leaf(Path { declaration, path: node.path.clone(), alias }));
                }
                NodeKind::Relation => {
                    let paths = self.emit(tree, idx, &next, counter, flat);
                    grouped.push(GroupedPath::Nested(NestedPath {
                        declaration,
                        path: node.path.clone(),
                        alias,
                        paths,
                    }));
                }
            }
        }
        grouped
    }

    /// Siblings that need a dedupe alias: unaliased entries sharing a bare
    /// name, minus the one the policy keeps canonical.
    fn colliding(&self, tree: &SelectTree, siblings: &[usize]) -> HashSet<usize> {
        let mut by_name: IndexMap<&str, Vec<usize>> = IndexMap::new();
        for idx in siblings {
            let node = tree.node(*idx);
            if node.alias.is_none() {
                by_name.entry(node.name.as_str()).or_default().push(*idx);
            }
        }

        let mut aliased = HashSet::new();
        for group in by_name.values().filter(|group| group.len() > 1) {
            let members: Vec<CollisionMember<'_>> = group
                .iter()
                .map(|idx| {
                    let node = tree.node(*idx);
                    CollisionMember {
                        declaration: &node.declaration,
                        hinted: node.hinted,
                        relation: node.is_relation(),
                    }
                })
                .collect();
            let canonical = self.policy.canonical(&members);
            for (position, idx) in group.iter().enumerate() {
                if Some(position) != canonical {
                    aliased.insert(*idx);
                }
            }
        }
        aliased
    }
}

/// Merges paths into a minimal select statement using the default dedupe
/// policy.
pub fn build_select_statement(paths: &[Path]) -> SelectStatement {
    SelectStatementBuilder::default().build(paths)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::builder::{build_select_statement, FirstSeen, GroupedPath, SelectStatementBuilder};
    use crate::select::{parse_select, Path};

    /// Response keys at every level must be distinct.
    fn assert_unique_names(grouped_paths: &[GroupedPath]) {
        let mut seen = HashSet::new();
        for grouped in grouped_paths {
            let name = grouped.alias().unwrap_or_else(|| grouped.path().split('!').next().unwrap_or_default());
            assert!(seen.insert(name), "Duplicate response key '{}'", name);
            if let GroupedPath::Nested(nested) = grouped {
                assert_unique_names(&nested.paths);
            }
        }
    }

    fn stripped(clause: &str) -> Vec<Path> {
        parse_select(clause)
            .expect("Failed to parse select")
            .iter()
            .map(Path::without_alias)
            .collect()
    }

    #[test]
    pub fn test_build_empty() {
        let result = build_select_statement(&[]);

        assert!(result.is_empty());
        assert!(result.paths.is_empty());
    }

    #[test]
    pub fn test_build_round_trip() {
        let clause = "id,assignee:assignee_id(id,test_name:display_name),tags:tag(id,tag_name:name),status";
        let paths = parse_select(clause).expect("Failed to parse select");

        let result = build_select_statement(&paths);

        assert_eq!(result.statement, clause);
        assert_eq!(result.paths, paths);
    }

    #[test]
    pub fn test_build_merges_relations() {
        let mut paths = stripped("id,tag(id,name)");
        paths.extend(stripped("tag(color),id,status"));

        assert_eq!(build_select_statement(&paths).statement, "id,tag(id,name,color),status");
    }

    #[test]
    pub fn test_build_dedupe_column_and_relation() {
        let result = build_select_statement(&stripped("note_id,note:note_id(test)"));

        assert_eq!(result.statement, "d_0_note_id:note_id,note_id(test)");
        assert_eq!(result.paths, vec![
            Path::new("d_0_note_id:note_id", "note_id", Some("d_0_note_id")),
            Path::from_path("note_id.test"),
        ]);
    }

    #[test]
    pub fn test_build_dedupe_nested() {
        let result = build_select_statement(&stripped("note_id(test,relation_id,rel:relation_id(test))"));

        assert_eq!(result.statement, "note_id(test,d_0_relation_id:relation_id,relation_id(test))");
        assert_eq!(
            result.paths[1],
            Path::new(
                "note_id.d_0_relation_id:relation_id",
                "note_id.relation_id",
                Some("note_id.d_0_relation_id")
            )
        );
    }

    #[test]
    pub fn test_build_dedupe_hinted_relations() {
        let result = build_select_statement(&stripped(
            "created_by:employee!created_by_employee_id(display_name),updated_by:employee!updated_by_employee_id(display_name)",
        ));

        assert_eq!(
            result.statement,
            "d_0_employee:employee!created_by_employee_id(display_name),d_1_employee:employee!updated_by_employee_id(display_name)"
        );
        assert_eq!(
            result.paths[0],
            Path::new(
                "d_0_employee:employee!created_by_employee_id.display_name",
                "employee!created_by_employee_id.display_name",
                Some("d_0_employee.display_name")
            )
        );
    }

    #[test]
    pub fn test_build_counter_is_shared_across_levels() {
        let result = build_select_statement(&stripped("a(x,x(y)),a,b!one(z),b!two(z)"));

        assert_eq!(
            result.statement,
            "a(d_0_x:x,x(y)),d_1_a:a,d_2_b:b!one(z),d_3_b:b!two(z)"
        );
    }

    #[test]
    pub fn test_build_single_hinted_relation_keeps_name() {
        let result = build_select_statement(&stripped("alias:relation!hint!inner(relation_value)"));

        assert_eq!(result.statement, "relation!hint!inner(relation_value)");
    }

    #[test]
    pub fn test_build_suppresses_count() {
        let result = build_select_statement(&stripped("id,relation(count),other(count,name)"));

        assert_eq!(result.statement, "id,other(name)");
        assert_eq!(result.paths.len(), 2);
    }

    #[test]
    pub fn test_build_suppresses_count_call() {
        let result = build_select_statement(&stripped("id,count(),notes(count()),tags(count(),name)"));

        assert_eq!(result.statement, "id,tags(name)");
        assert_eq!(result.paths.len(), 2);
    }

    #[test]
    pub fn test_build_is_idempotent() {
        let first = build_select_statement(&stripped("note_id,note:note_id(test),a!x(id),a!y(id)"));
        let second = build_select_statement(&first.paths);

        assert_eq!(first.statement, second.statement);
    }

    #[test]
    pub fn test_build_no_unaliased_duplicates() {
        let result = build_select_statement(&stripped("x,x(a),x!h(b),y,y(c),x(d),z(a,a(q),a!h(r))"));

        assert_unique_names(&result.grouped_paths);
        assert_eq!(result.statement, "d_0_x:x,x(a,d),d_1_x:x!h(b),d_2_y:y,y(c),z(d_3_a:a,a(q),d_4_a:a!h(r))");
    }

    #[test]
    pub fn test_build_with_first_seen_policy() {
        let builder = SelectStatementBuilder::with_policy(&FirstSeen);

        let result = builder.build(&stripped("note_id,note:note_id(test)"));

        assert_eq!(result.statement, "note_id,d_0_note_id:note_id(test)");
    }
}
