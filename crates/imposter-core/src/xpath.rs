//! A hand-rolled, namespace-aware XPath-lite evaluator shared by the
//! matcher's body projection and the capture engine's `Body{xPath}` source.
//! In the spirit of `mockforge-core::conditions::evaluate_xpath_simple`:
//! supports `tag/sub/tag` and `//tag` (descendant-or-self), with
//! `prefix:tag` resolved against a namespace-binding map. Returns the
//! matched element's trimmed text.

use std::collections::HashMap;

pub fn text(node: roxmltree::Node, xpath: &str, namespaces: &HashMap<String, String>) -> Option<String> {
    if let Some(rest) = xpath.strip_prefix('/') {
        return find_descendant(node, rest, namespaces);
    }
    let (head, rest) = match xpath.split_once('/') {
        Some((h, r)) => (h, Some(r)),
        None => (xpath, None),
    };
    if !tag_matches(node, head, namespaces) {
        return None;
    }
    match rest {
        None => Some(element_text(node)),
        Some(rest) => {
            for child in node.children().filter(|c| c.is_element()) {
                if let Some(found) = text(child, rest, namespaces) {
                    return Some(found);
                }
            }
            None
        }
    }
}

fn find_descendant(node: roxmltree::Node, tag: &str, namespaces: &HashMap<String, String>) -> Option<String> {
    if tag_matches(node, tag, namespaces) {
        return Some(element_text(node));
    }
    for child in node.descendants().filter(|c| c.is_element()) {
        if tag_matches(child, tag, namespaces) {
            return Some(element_text(child));
        }
    }
    None
}

fn tag_matches(node: roxmltree::Node, qname: &str, namespaces: &HashMap<String, String>) -> bool {
    match qname.split_once(':') {
        Some((prefix, local)) => {
            let expected_ns = namespaces.get(prefix);
            node.tag_name().name() == local
                && expected_ns.is_some_and(|ns| node.tag_name().namespace() == Some(ns.as_str()))
        }
        None => node.tag_name().name() == qname,
    }
}

/// The element's full text content: concatenation of all descendant text
/// nodes, trimmed.
pub fn element_text(node: roxmltree::Node) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string()
}
