//! Point a document's `<base href>` at the page it was fetched from.

use ego_tree::NodeId;
use html5ever::tendril::StrTendril;
use html5ever::{local_name, namespace_url, ns, Attribute, LocalName, QualName};
use scraper::node::Element;
use scraper::{Html, Node};
use tracing::{debug, warn};

/// Rewrite `html` so its head holds exactly one `base` whose `href` is
/// `base_uri`, and serialize the result.
///
/// Malformed markup is accepted as a browser would accept it. If no head can
/// be found or created the input is returned unchanged.
pub fn set_base_uri(html: &str, base_uri: &str) -> String {
    let mut document = Html::parse_document(html);

    if !rebase_document(&mut document, base_uri) {
        return html.to_string();
    }

    document.html()
}

/// In-place variant of [`set_base_uri`] for an already parsed document.
///
/// Returns `false`, leaving the document untouched, when no head element
/// could be located or inserted.
pub fn rebase_document(document: &mut Html, base_uri: &str) -> bool {
    let Some(head) = find_head(document).or_else(|| {
        debug!("document has no head, inserting one");
        document
            .tree
            .root_mut()
            .prepend(Node::Element(new_element(local_name!("head"))));
        find_head(document)
    }) else {
        warn!("could not find or create a head element");
        return false;
    };

    let Some(base) = find_child(document, head, "base").or_else(|| {
        let mut head = document.tree.get_mut(head)?;
        Some(head.prepend(Node::Element(new_element(local_name!("base")))).id())
    }) else {
        warn!("could not find or create a base element");
        return false;
    };

    set_attribute(document, base, local_name!("href"), base_uri);
    true
}

// `/html/head` first, then a `head` directly under the document.
fn find_head(document: &Html) -> Option<NodeId> {
    let root = document.tree.root();

    root.children()
        .filter(|node| is_element(node.value(), "html"))
        .flat_map(|html| html.children())
        .chain(root.children())
        .find(|node| is_element(node.value(), "head"))
        .map(|node| node.id())
}

fn find_child(document: &Html, parent: NodeId, name: &str) -> Option<NodeId> {
    document
        .tree
        .get(parent)?
        .children()
        .find(|node| is_element(node.value(), name))
        .map(|node| node.id())
}

fn is_element(node: &Node, name: &str) -> bool {
    matches!(node, Node::Element(element) if element.name() == name)
}

fn new_element(name: LocalName) -> Element {
    Element::new(QualName::new(None, ns!(html), name), Vec::new())
}

fn set_attribute(document: &mut Html, id: NodeId, name: LocalName, value: &str) {
    let Some(mut node) = document.tree.get_mut(id) else {
        return;
    };

    if let Node::Element(element) = node.value() {
        let updated = with_attribute(element, name, value);
        *element = updated;
    }
}

// Elements cache their attribute lookups, so an edited attribute means a
// rebuilt element.
fn with_attribute(element: &Element, name: LocalName, value: &str) -> Element {
    let mut attrs: Vec<Attribute> = element
        .attrs
        .iter()
        .filter(|(attr_name, _)| attr_name.local != name)
        .map(|(attr_name, attr_value)| Attribute {
            name: attr_name.clone(),
            value: attr_value.clone(),
        })
        .collect();

    attrs.push(Attribute {
        name: QualName::new(None, ns!(), name),
        value: StrTendril::from_slice(value),
    });

    Element::new(element.name.clone(), attrs)
}
