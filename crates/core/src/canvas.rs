//! Canvas import: build an [`ExecutableModel`] from a JSON canvas document
//! (text nodes connected by edges) instead of script source.
//!
//! Each text node becomes a scene. A node whose text contains a `---` line
//! splits into a title (also its button label) and a message; otherwise the
//! whole text is the scene text and the label is derived from its first
//! line. Every edge becomes a button. When two nodes point at each other,
//! the edge leaving the lower (or, on a tie, the rightmost) node is a `back`
//! button.

use crate::model::{
    is_reserved_name, Button, ButtonAction, Config, Content, ExecutableModel, Scene, SceneRef,
    DEFAULT_BACK_LABEL,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use thiserror::Error;

const AUTO_LABEL_LEN: usize = 24;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("invalid canvas JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canvas contains no text nodes")]
    Empty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Canvas {
    #[serde(default)]
    pub nodes: Vec<CanvasNode>,
    #[serde(default)]
    pub edges: Vec<CanvasEdge>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasNode {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CanvasEdge {
    #[serde(rename = "fromNode")]
    pub from_node: String,
    #[serde(rename = "toNode")]
    pub to_node: String,
}

pub fn import_canvas_str(json: &str) -> Result<ExecutableModel, CanvasError> {
    let canvas: Canvas = serde_json::from_str(json)?;
    import_canvas(&canvas)
}

struct NodeText {
    /// Title (and button label) when the node has a `---` header.
    title: Option<String>,
    body: String,
}

fn parse_node_text(raw: &str) -> NodeText {
    let mut rest = raw.trim();
    // editors sometimes leave bare separator lines above the content
    while let Some((first, tail)) = rest.split_once('\n') {
        if first.trim() != "---" {
            break;
        }
        rest = tail.trim_start();
    }
    let rest = rest.trim();

    match rest.split_once("---") {
        Some((head, body)) => NodeText {
            title: Some(head.trim().to_owned()),
            body: body.trim().to_owned(),
        },
        None => NodeText {
            title: None,
            body: rest.to_owned(),
        },
    }
}

/// First line of `text`, cut at a word boundary to at most 24 characters.
pub fn auto_label(text: &str) -> String {
    let first = text.lines().next().map(str::trim).unwrap_or("...");
    if first.chars().count() <= AUTO_LABEL_LEN {
        return first.to_owned();
    }
    let trimmed: String = first.chars().take(AUTO_LABEL_LEN).collect();
    match trimmed.rfind(' ') {
        Some(space) if space > 0 => trimmed[..space].to_owned(),
        _ => trimmed,
    }
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending = false;
    for ch in text.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending && !slug.is_empty() {
                slug.push('_');
            }
            pending = false;
            slug.push(ch);
        } else {
            pending = true;
        }
    }
    slug
}

pub fn import_canvas(canvas: &Canvas) -> Result<ExecutableModel, CanvasError> {
    let nodes: Vec<&CanvasNode> = canvas.nodes.iter().filter(|n| n.kind == "text").collect();
    if nodes.is_empty() {
        return Err(CanvasError::Empty);
    }
    let by_id: HashMap<&str, &CanvasNode> = nodes.iter().map(|n| (n.id.as_str(), *n)).collect();
    let parsed: HashMap<&str, NodeText> = nodes
        .iter()
        .map(|n| (n.id.as_str(), parse_node_text(&n.text)))
        .collect();

    let mut adjacency: HashMap<&str, Vec<&str>> =
        nodes.iter().map(|n| (n.id.as_str(), Vec::new())).collect();
    for edge in &canvas.edges {
        let (from, to) = (edge.from_node.as_str(), edge.to_node.as_str());
        if by_id.contains_key(from) && by_id.contains_key(to) {
            if let Some(targets) = adjacency.get_mut(from) {
                targets.push(to);
            }
        }
    }

    let back_edges = detect_back_edges(&nodes, &by_id, &adjacency);
    let visited = traversal_order(&nodes, &adjacency, &back_edges);
    let names = assign_names(&visited, &parsed);

    let mut scenes = BTreeMap::new();
    for id in &visited {
        let node = &parsed[id];
        let name = names[id].clone();
        let content = match &node.title {
            Some(title) => Content::Titled {
                title: title.clone(),
                message: node.body.clone(),
            },
            None => Content::Text {
                text: node.body.clone(),
            },
        };
        let mut scene = Scene::new(name.clone(), content);

        for target in adjacency.get(id).map(Vec::as_slice).unwrap_or_default() {
            let button = if back_edges.contains(&(*id, *target)) {
                scene.has_back_button = true;
                Button {
                    label: DEFAULT_BACK_LABEL.to_owned(),
                    action: ButtonAction::Scene(SceneRef::Back),
                }
            } else {
                let target_text = &parsed[target];
                Button {
                    label: target_text
                        .title
                        .clone()
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| auto_label(&target_text.body)),
                    action: ButtonAction::Scene(SceneRef::Named(names[target].clone())),
                }
            };
            // later edges with the same label replace earlier ones
            match scene.buttons.iter_mut().find(|b| b.label == button.label) {
                Some(existing) => *existing = button,
                None => scene.buttons.push(button),
            }
        }
        scene.keep_history = scene.has_back_button;
        scenes.insert(name, scene);
    }

    let order: Vec<String> = visited.iter().map(|id| names[id].clone()).collect();
    tracing::debug!(scenes = order.len(), "imported canvas");

    Ok(ExecutableModel {
        config: Config {
            next_order: order.clone(),
            ..Config::default()
        },
        scenes,
        order,
        source: String::new(),
    })
}

fn detect_back_edges<'a>(
    nodes: &[&'a CanvasNode],
    by_id: &HashMap<&str, &CanvasNode>,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
) -> HashSet<(&'a str, &'a str)> {
    let mut back = HashSet::new();
    for node in nodes {
        let from = node.id.as_str();
        for &to in adjacency.get(from).map(Vec::as_slice).unwrap_or_default() {
            let mutual = adjacency.get(to).is_some_and(|t| t.contains(&from));
            if !mutual {
                continue;
            }
            let (a, b) = (by_id[from], by_id[to]);
            let from_is_lower = if a.y != b.y { a.y > b.y } else { a.x > b.x };
            if from_is_lower {
                back.insert((from, to));
            } else {
                back.insert((to, from));
            }
        }
    }
    back
}

/// Breadth-first over forward edges, starting from nodes without incoming
/// forward edges (top-most first); unreachable nodes are appended.
fn traversal_order<'a>(
    nodes: &[&'a CanvasNode],
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    back_edges: &HashSet<(&'a str, &'a str)>,
) -> Vec<&'a str> {
    let mut incoming: HashMap<&str, usize> = nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for node in nodes {
        let from = node.id.as_str();
        for &to in adjacency.get(from).map(Vec::as_slice).unwrap_or_default() {
            if !back_edges.contains(&(from, to)) {
                *incoming.entry(to).or_default() += 1;
            }
        }
    }

    let mut roots: Vec<&CanvasNode> = nodes
        .iter()
        .copied()
        .filter(|n| incoming.get(n.id.as_str()) == Some(&0))
        .collect();
    if roots.is_empty() {
        roots = nodes.to_vec();
    }
    roots.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut queue: VecDeque<&str> = roots.iter().map(|n| n.id.as_str()).collect();
    let mut seen = HashSet::new();
    let mut visited = Vec::new();
    while let Some(cur) = queue.pop_front() {
        if !seen.insert(cur) {
            continue;
        }
        visited.push(cur);
        for &next in adjacency.get(cur).map(Vec::as_slice).unwrap_or_default() {
            if !seen.contains(next) && !back_edges.contains(&(cur, next)) {
                queue.push_back(next);
            }
        }
    }
    for node in nodes {
        if seen.insert(node.id.as_str()) {
            visited.push(node.id.as_str());
        }
    }
    visited
}

/// Slug names from the title or first body line. The first visited node
/// is always `main`.
fn assign_names<'a>(
    visited: &[&'a str],
    parsed: &HashMap<&str, NodeText>,
) -> HashMap<&'a str, String> {
    let mut used: HashSet<String> = HashSet::from(["main".to_owned()]);
    let mut names = HashMap::new();

    for (i, id) in visited.iter().enumerate() {
        if i == 0 {
            names.insert(*id, "main".to_owned());
            continue;
        }
        let node = &parsed[id];
        let source = node.title.as_deref().unwrap_or(&node.body);
        let mut base = slugify(source.lines().next().unwrap_or(""));
        if base.is_empty() {
            base = format!("scene_{}", i);
        }
        let mut slug = base.clone();
        let mut counter = 1;
        while used.contains(&slug) || is_reserved_name(&slug) {
            slug = format!("{}_{}", base, counter);
            counter += 1;
        }
        used.insert(slug.clone());
        names.insert(*id, slug);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canvas(value: serde_json::Value) -> ExecutableModel {
        import_canvas_str(&value.to_string()).unwrap()
    }

    #[test]
    fn header_splits_title_and_message() {
        let t = parse_node_text("---\n---\nWelcome\n---\nHello there");
        assert_eq!(t.title.as_deref(), Some("Welcome"));
        assert_eq!(t.body, "Hello there");
        let t = parse_node_text("  Just text  ");
        assert!(t.title.is_none());
        assert_eq!(t.body, "Just text");
    }

    #[test]
    fn auto_label_cuts_at_word_boundary() {
        assert_eq!(auto_label("Short line\nsecond"), "Short line");
        assert_eq!(
            auto_label("This first line is definitely too long"),
            "This first line is"
        );
        assert_eq!(auto_label("Averyveryverylongsingleword!!"), "Averyveryverylongsinglew");
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slugify("What's new?"), "what_s_new");
        assert_eq!(slugify("  FAQ  "), "faq");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn imports_scenes_buttons_and_back_edges() {
        let model = canvas(json!({
            "nodes": [
                {"id": "b", "type": "text", "text": "FAQ\n---\nQuestions", "x": 0, "y": 200},
                {"id": "a", "type": "text", "text": "Welcome\n---\nHi", "x": 0, "y": 0},
                {"id": "c", "type": "text", "text": "Contact us by mail", "x": 300, "y": 200},
                {"id": "g", "type": "group", "x": 0, "y": 0}
            ],
            "edges": [
                {"fromNode": "a", "toNode": "b"},
                {"fromNode": "b", "toNode": "a"},
                {"fromNode": "a", "toNode": "c"}
            ]
        }));

        assert_eq!(model.order, vec!["main", "faq", "contact_us_by_mail"]);
        assert_eq!(model.config.next_order, model.order);

        let main = model.scene("main").unwrap();
        assert_eq!(main.title(), Some("Welcome"));
        assert_eq!(main.buttons[0].label, "FAQ");
        assert_eq!(main.buttons[1].label, "Contact us by mail");

        let faq = model.scene("faq").unwrap();
        assert_eq!(faq.buttons[0].action, ButtonAction::Scene(SceneRef::Back));
        assert!(faq.has_back_button && faq.keep_history);

        let contact = model.scene("contact_us_by_mail").unwrap();
        assert_eq!(contact.text(), Some("Contact us by mail"));
    }

    #[test]
    fn duplicate_and_reserved_slugs_are_suffixed() {
        let model = canvas(json!({
            "nodes": [
                {"id": "1", "type": "text", "text": "Start", "y": 0},
                {"id": "2", "type": "text", "text": "Back", "y": 10},
                {"id": "3", "type": "text", "text": "Info", "y": 20},
                {"id": "4", "type": "text", "text": "Info", "y": 30}
            ],
            "edges": []
        }));
        assert_eq!(model.order, vec!["main", "back_1", "info", "info_1"]);
    }

    #[test]
    fn empty_canvas_is_an_error() {
        let err = import_canvas_str("{\"nodes\": []}").unwrap_err();
        assert!(matches!(err, CanvasError::Empty));
    }
}
