//! Assembly tree model
//!
//! The tree is built once from a geometry provider and never mutated
//! afterwards. Nodes are generic over the provider's label type so that a
//! part keeps a handle to its raw geometry.

use std::collections::HashMap;

use crate::geometry::{ComponentTarget, GeometryProvider};

/// Key used for nodes with neither a name nor an instance name
pub const UNNAMED: &str = "(unnamed)";

/// A leaf part carrying geometry
#[derive(Debug, Clone, PartialEq)]
pub struct PartNode<H> {
    pub name: String,
    /// Component name, when it differs from the definition name
    pub instance_name: Option<String>,
    /// Raw geometry (None when the source defines no shape)
    pub geometry: Option<H>,
    pub solid_count: usize,
}

/// An assembly of child nodes
#[derive(Debug, Clone, PartialEq)]
pub struct SubAssembly<H> {
    pub name: String,
    /// Component name, when it differs from the definition name
    pub instance_name: Option<String>,
    /// Children in declaration order (never empty)
    pub children: Vec<AssemblyNode<H>>,
    pub solid_count: usize,
}

/// One node of the CAD hierarchy
#[derive(Debug, Clone, PartialEq)]
pub enum AssemblyNode<H> {
    Part(PartNode<H>),
    Assembly(SubAssembly<H>),
}

impl<H> AssemblyNode<H> {
    /// Create a leaf part
    pub fn part(name: impl Into<String>, geometry: Option<H>, solid_count: usize) -> Self {
        AssemblyNode::Part(PartNode {
            name: name.into(),
            instance_name: None,
            geometry,
            solid_count,
        })
    }

    /// Create an assembly; its solid count is the sum of its children's.
    ///
    /// An empty child list yields a part without geometry.
    pub fn assembly(name: impl Into<String>, children: Vec<AssemblyNode<H>>) -> Self {
        if children.is_empty() {
            return Self::part(name, None, 0);
        }
        let solid_count = children.iter().map(AssemblyNode::solid_count).sum();
        AssemblyNode::Assembly(SubAssembly {
            name: name.into(),
            instance_name: None,
            children,
            solid_count,
        })
    }

    /// Set the component instance name
    pub fn with_instance_name(mut self, instance_name: impl Into<String>) -> Self {
        let instance_name = Some(instance_name.into());
        match &mut self {
            AssemblyNode::Part(part) => part.instance_name = instance_name,
            AssemblyNode::Assembly(asm) => asm.instance_name = instance_name,
        }
        self
    }

    /// Definition name (may be empty)
    pub fn name(&self) -> &str {
        match self {
            AssemblyNode::Part(part) => &part.name,
            AssemblyNode::Assembly(asm) => &asm.name,
        }
    }

    pub fn instance_name(&self) -> Option<&str> {
        match self {
            AssemblyNode::Part(part) => part.instance_name.as_deref(),
            AssemblyNode::Assembly(asm) => asm.instance_name.as_deref(),
        }
    }

    /// Identifying key: instance name, then name, then `(unnamed)`
    pub fn key(&self) -> &str {
        match self.instance_name().filter(|n| !n.is_empty()) {
            Some(instance) => instance,
            None if !self.name().is_empty() => self.name(),
            None => UNNAMED,
        }
    }

    /// Name for display, `(unnamed)` when empty
    pub fn display_name(&self) -> &str {
        if self.name().is_empty() {
            UNNAMED
        } else {
            self.name()
        }
    }

    pub fn is_assembly(&self) -> bool {
        matches!(self, AssemblyNode::Assembly(_))
    }

    /// Children in declaration order (empty for parts)
    pub fn children(&self) -> &[AssemblyNode<H>] {
        match self {
            AssemblyNode::Part(_) => &[],
            AssemblyNode::Assembly(asm) => &asm.children,
        }
    }

    pub fn solid_count(&self) -> usize {
        match self {
            AssemblyNode::Part(part) => part.solid_count,
            AssemblyNode::Assembly(asm) => asm.solid_count,
        }
    }

    /// Follow a path of name substrings down from this node's children
    ///
    /// A segment selects the first child whose key or name contains it.
    pub fn find_by_path<S: AsRef<str>>(&self, path: &[S]) -> Option<&AssemblyNode<H>> {
        let mut node: Option<&AssemblyNode<H>> = None;
        let mut children = self.children();
        for segment in path {
            let segment = segment.as_ref();
            let found = children.iter().find(|child| {
                let key = child.instance_name().unwrap_or(child.name());
                key.contains(segment) || child.name().contains(segment)
            })?;
            node = Some(found);
            children = found.children();
        }
        node
    }
}

/// Build the assembly tree below `label`
///
/// Component names are attached the way CAD exchange files use them: an
/// unnamed definition takes the component name, a differing component name
/// becomes the instance name.
pub fn walk_assembly<P: GeometryProvider>(
    provider: &P,
    label: &P::Label,
) -> AssemblyNode<P::Label> {
    walk_node(provider, label, None)
}

fn walk_node<P: GeometryProvider>(
    provider: &P,
    label: &P::Label,
    component_name: Option<&str>,
) -> AssemblyNode<P::Label> {
    let mut name = provider.label_name(label);
    let mut instance_name = None;
    if let Some(component_name) = component_name.filter(|n| !n.is_empty()) {
        if name.is_empty() {
            name = component_name.to_string();
        } else if component_name != name {
            instance_name = Some(component_name.to_string());
        }
    }

    let children: Vec<_> = if provider.is_assembly(label) {
        provider
            .components(label)
            .iter()
            .map(|component| match &component.target {
                ComponentTarget::Reference(definition) => {
                    walk_node(provider, definition, Some(&component.name))
                }
                ComponentTarget::Inline(child) => walk_node(provider, child, None),
            })
            .collect()
    } else {
        Vec::new()
    };

    let solid_count = provider.count_solids(label);
    if children.is_empty() {
        AssemblyNode::Part(PartNode {
            name,
            instance_name,
            geometry: provider.has_shape(label).then(|| label.clone()),
            solid_count,
        })
    } else {
        AssemblyNode::Assembly(SubAssembly {
            name,
            instance_name,
            children,
            solid_count,
        })
    }
}

/// A direct child of the traversal root
#[derive(Debug, Clone)]
pub struct Depth1Part<'a, H> {
    /// Link mapping key (instance name, else name)
    pub key: String,
    /// Definition name for display
    pub name: String,
    pub node: &'a AssemblyNode<H>,
}

/// Depth-1 parts of a root in declaration order, indexed by key
#[derive(Debug, Clone)]
pub struct PartLookup<'a, H> {
    parts: Vec<Depth1Part<'a, H>>,
    index: HashMap<String, usize>,
}

impl<'a, H> PartLookup<'a, H> {
    /// Collect the depth-1 parts of `root`
    ///
    /// When two parts share a key, lookups resolve to the later one.
    pub fn new(root: &'a AssemblyNode<H>) -> Self {
        let parts: Vec<Depth1Part<'a, H>> = root
            .children()
            .iter()
            .map(|node| Depth1Part {
                key: node.key().to_string(),
                name: node.display_name().to_string(),
                node,
            })
            .collect();
        let index = parts
            .iter()
            .enumerate()
            .map(|(i, part)| (part.key.clone(), i))
            .collect();
        Self { parts, index }
    }

    pub fn get(&self, key: &str) -> Option<&'a AssemblyNode<H>> {
        self.index.get(key).map(|&i| self.parts[i].node)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Whether `part` is hidden from lookups by a later part with its key
    pub fn is_shadowed(&self, part: &Depth1Part<'a, H>) -> bool {
        self.get(&part.key)
            .is_some_and(|node| !std::ptr::eq(node, part.node))
    }

    /// Keys shared by more than one part, in first-seen order
    pub fn duplicate_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for part in &self.parts {
            if self.is_shadowed(part) && !keys.contains(&part.key.as_str()) {
                keys.push(&part.key);
            }
        }
        keys
    }

    pub fn parts(&self) -> &[Depth1Part<'a, H>] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}
