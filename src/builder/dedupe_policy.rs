/// A sibling entry whose unaliased bare name clashes with another one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionMember<'a> {
    pub declaration: &'a str,
    pub hinted: bool,
    pub relation: bool,
}

/// Chooses which member of a collision group keeps its unaliased name.
/// Members are given in insertion order; `None` aliases every member.
pub trait DedupePolicy {
    fn canonical(&self, members: &[CollisionMember<'_>]) -> Option<usize>;
}

/// Only members without a relation hint may stay unaliased. Among those a
/// relation expansion wins over a plain column, otherwise the first inserted.
#[derive(Debug, Default, Clone, Copy)]
pub struct PreferUnhintedRelation;

impl DedupePolicy for PreferUnhintedRelation {
    fn canonical(&self, members: &[CollisionMember<'_>]) -> Option<usize> {
        let unhinted = || members.iter().enumerate().filter(|(_, member)| !member.hinted);

        unhinted()
            .find(|(_, member)| member.relation)
            .or_else(|| unhinted().next())
            .map(|(idx, _)| idx)
    }
}

/// First inserted member always stays unaliased.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstSeen;

impl DedupePolicy for FirstSeen {
    fn canonical(&self, members: &[CollisionMember<'_>]) -> Option<usize> {
        if members.is_empty() { None } else { Some(0) }
    }
}
