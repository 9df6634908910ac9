use std::fmt;

use crate::model::NodeRef;

/// Directional traversal rule over the node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    SelfAxis,
    Child,
    Descendant,
    DescendantOrSelf,
    Flag,
    Parent,
    Ancestor,
    AncestorOrSelf,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
}

impl Axis {
    pub fn name(self) -> &'static str {
        match self {
            Axis::SelfAxis => "self",
            Axis::Child => "child",
            Axis::Descendant => "descendant",
            Axis::DescendantOrSelf => "descendant-or-self",
            Axis::Flag => "flag",
            Axis::Parent => "parent",
            Axis::Ancestor => "ancestor",
            Axis::AncestorOrSelf => "ancestor-or-self",
            Axis::FollowingSibling => "following-sibling",
            Axis::PrecedingSibling => "preceding-sibling",
            Axis::Following => "following",
            Axis::Preceding => "preceding",
        }
    }

    pub fn from_name(name: &str) -> Option<Axis> {
        Some(match name {
            "self" => Axis::SelfAxis,
            "child" => Axis::Child,
            "descendant" => Axis::Descendant,
            "descendant-or-self" => Axis::DescendantOrSelf,
            "flag" => Axis::Flag,
            "parent" => Axis::Parent,
            "ancestor" => Axis::Ancestor,
            "ancestor-or-self" => Axis::AncestorOrSelf,
            "following-sibling" => Axis::FollowingSibling,
            "preceding-sibling" => Axis::PrecedingSibling,
            "following" => Axis::Following,
            "preceding" => Axis::Preceding,
            _ => return None,
        })
    }

    /// Reverse axes count predicate positions from the focus outwards.
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Axis::Parent
                | Axis::Ancestor
                | Axis::AncestorOrSelf
                | Axis::PrecedingSibling
                | Axis::Preceding
        )
    }

    /// Nodes reached from `node`, always in document order.
    pub fn select(self, node: &NodeRef) -> Vec<NodeRef> {
        match self {
            Axis::SelfAxis => vec![node.clone()],
            Axis::Child => node.children(),
            Axis::Descendant => node.descendants(),
            Axis::DescendantOrSelf => {
                let mut out = vec![node.clone()];
                out.extend(node.descendants());
                out
            }
            Axis::Flag => node.flags(),
            Axis::Parent => node.parent().into_iter().collect(),
            Axis::Ancestor => node.ancestors(),
            Axis::AncestorOrSelf => {
                let mut out = node.ancestors();
                out.push(node.clone());
                out
            }
            Axis::FollowingSibling => node.following_siblings(),
            Axis::PrecedingSibling => node.preceding_siblings(),
            Axis::Following => node.following(),
            Axis::Preceding => node.preceding(),
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
