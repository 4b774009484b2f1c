//! Concrete syntax tree nodes.
//!
//! Every combinator that matches produces a [`Cst`] node. Nodes preserve the
//! source exactly: a node's [`text`](Cst::text) is the slice of the input it
//! matched, and concatenating the texts of a node's children reproduces the
//! parent's text. All nodes are bump-allocated in a [`CstContext`] and borrow
//! from the source, so a whole parse is two arenas and zero copies.
//!
//! Navigation is name-based: grammars attach field names via named sequences
//! and label the winning branch of named alternatives, so downstream passes
//! read `node.field("name")` / `node.label()` instead of positional indexing.

use lnc_base::{Arena, Pos};

/// A node of the concrete syntax tree.
#[derive(Debug)]
pub enum Cst<'a> {
    /// Text matched by a literal or character-class combinator.
    Leaf { text: &'a str, pos: Pos },
    /// A single character consumed by a negation combinator.
    NotLeaf { text: &'a str, pos: Pos },
    /// Ordered children of an anonymous sequence.
    Seq { text: &'a str, pos: Pos, children: &'a [&'a Cst<'a>] },
    /// A rule-named sequence with keyed children, insertion-ordered.
    NamedSeq {
        rule: &'a str,
        text: &'a str,
        pos: Pos,
        fields: &'a [(&'a str, &'a Cst<'a>)],
    },
    /// The selected branch of an alternative; labelled when the alternative
    /// was a named one.
    Choice {
        label: Option<&'a str>,
        text: &'a str,
        pos: Pos,
        inner: &'a Cst<'a>,
    },
    /// Zero or more repetitions.
    Rep { text: &'a str, pos: Pos, children: &'a [&'a Cst<'a>] },
    /// The unambiguous "absent" sentinel produced by a failed optional.
    Null { pos: Pos },
}

impl<'a> Cst<'a> {
    /// The source slice this node matched (empty for [`Cst::Null`]).
    pub fn text(&self) -> &'a str {
        match self {
            Cst::Leaf { text, .. }
            | Cst::NotLeaf { text, .. }
            | Cst::Seq { text, .. }
            | Cst::NamedSeq { text, .. }
            | Cst::Choice { text, .. }
            | Cst::Rep { text, .. } => text,
            Cst::Null { .. } => "",
        }
    }

    /// The position where this node's match began.
    pub fn pos(&self) -> Pos {
        match self {
            Cst::Leaf { pos, .. }
            | Cst::NotLeaf { pos, .. }
            | Cst::Seq { pos, .. }
            | Cst::NamedSeq { pos, .. }
            | Cst::Choice { pos, .. }
            | Cst::Rep { pos, .. }
            | Cst::Null { pos } => *pos,
        }
    }

    /// True for the absent sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Cst::Null { .. })
    }

    /// Looks up a keyed child of a named sequence.
    ///
    /// Descends through `Choice` wrappers first, so a rule that is one branch
    /// of a named alternative can still be navigated directly.
    pub fn field(&self, name: &str) -> Option<&'a Cst<'a>> {
        match self {
            Cst::NamedSeq { fields, .. } => fields
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, node)| *node),
            Cst::Choice { inner, .. } => inner.field(name),
            _ => None,
        }
    }

    /// A keyed child that the grammar guarantees to exist.
    ///
    /// # Panics
    ///
    /// Panics if the field is missing; that is a grammar/navigation mismatch,
    /// not an input error.
    pub fn req(&self, name: &str) -> &'a Cst<'a> {
        match self.field(name) {
            Some(node) => node,
            None => panic!("grammar produced no field `{}` on `{}`", name, self.rule_name()),
        }
    }

    /// The rule name of a named sequence, descending through choices.
    pub fn rule_name(&self) -> &'a str {
        match self {
            Cst::NamedSeq { rule, .. } => rule,
            Cst::Choice { inner, .. } => inner.rule_name(),
            _ => "",
        }
    }

    /// The label of the selected branch, if this is a named choice.
    pub fn label(&self) -> Option<&'a str> {
        match self {
            Cst::Choice { label, .. } => *label,
            _ => None,
        }
    }

    /// The selected branch of a choice, unwrapped through nesting.
    pub fn unwrap_choice(&self) -> &Cst<'a> {
        match self {
            Cst::Choice { inner, .. } => inner.unwrap_choice(),
            _ => self,
        }
    }

    /// The selected branch of a choice, unwrapped one level only.
    pub fn choice_inner(&self) -> Option<&'a Cst<'a>> {
        match self {
            Cst::Choice { inner, .. } => Some(inner),
            _ => None,
        }
    }

    /// Children of a sequence or repetition (empty otherwise).
    pub fn children(&self) -> &'a [&'a Cst<'a>] {
        match self {
            Cst::Seq { children, .. } | Cst::Rep { children, .. } => children,
            _ => &[],
        }
    }

    /// Children of a repetition, unwrapping one level of choice first.
    pub fn rep_children(&self) -> &'a [&'a Cst<'a>] {
        match self {
            Cst::Choice { inner, .. } => inner.rep_children(),
            _ => self.children(),
        }
    }
}

/// The arenas a parse allocates into.
///
/// Mirrors the lifetime discipline of the rest of the compiler: the caller
/// owns the arenas, the parser borrows them, and every produced node lives
/// exactly as long as the arenas do.
#[derive(Clone, Copy)]
pub struct CstContext<'a> {
    pub nodes: &'a Arena<Cst<'a>>,
    pub node_refs: &'a Arena<&'a Cst<'a>>,
    pub fields: &'a Arena<(&'a str, &'a Cst<'a>)>,
    pub texts: &'a Arena<u8>,
}

impl<'a> CstContext<'a> {
    pub fn new(
        nodes: &'a Arena<Cst<'a>>,
        node_refs: &'a Arena<&'a Cst<'a>>,
        fields: &'a Arena<(&'a str, &'a Cst<'a>)>,
        texts: &'a Arena<u8>,
    ) -> Self {
        CstContext { nodes, node_refs, fields, texts }
    }

    pub fn alloc(&self, node: Cst<'a>) -> &'a Cst<'a> {
        self.nodes.alloc(node)
    }

    pub fn alloc_children(&self, children: Vec<&'a Cst<'a>>) -> &'a [&'a Cst<'a>] {
        self.node_refs.alloc_slice(children)
    }

    pub fn alloc_fields(
        &self,
        fields: Vec<(&'a str, &'a Cst<'a>)>,
    ) -> &'a [(&'a str, &'a Cst<'a>)] {
        self.fields.alloc_slice(fields)
    }

    /// Copies a name into the arena so nodes can reference it.
    pub fn alloc_name(&self, name: &str) -> &'a str {
        self.texts.alloc_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_text_and_pos_round_trip() {
        let leaf = Cst::Leaf { text: "fn", pos: Pos::start() };
        assert_eq!(leaf.text(), "fn");
        assert_eq!(leaf.pos().line, 1);
        assert!(!leaf.is_null());
    }

    #[test]
    fn field_lookup_descends_through_choices() {
        let nodes: Arena<Cst> = Arena::new();
        let fields_arena: Arena<(&str, &Cst)> = Arena::new();
        let name = nodes.alloc(Cst::Leaf { text: "x", pos: Pos::start() });
        let fields = fields_arena.alloc_slice(vec![("name", name)]);
        let seq = nodes.alloc(Cst::NamedSeq {
            rule: "letdecl",
            text: "x",
            pos: Pos::start(),
            fields,
        });
        let choice = Cst::Choice { label: Some("letdecl"), text: "x", pos: Pos::start(), inner: seq };
        assert_eq!(choice.field("name").unwrap().text(), "x");
        assert_eq!(choice.rule_name(), "letdecl");
        assert!(choice.field("missing").is_none());
    }

    #[test]
    fn null_has_empty_text() {
        let null = Cst::Null { pos: Pos::start() };
        assert_eq!(null.text(), "");
        assert!(null.is_null());
    }
}
