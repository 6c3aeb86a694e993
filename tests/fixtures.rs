#![allow(dead_code, reason = "each test binary uses a different subset")]

use liqueur::{Config, Node};
use rand::Rng;

pub fn get_config() -> Config {
    Config::standard().unwrap()
}

pub fn generate_random_whitespace() -> String {
    let mut rng = rand::rng();
    let length = rng.random_range(0..10);
    (0..length).map(|_| ' ').collect()
}

pub fn generate_random_whitespace_at_least_one() -> String {
    let mut rng = rand::rng();
    let length = rng.random_range(1..10);
    (0..length).map(|_| ' ').collect()
}

/// The top-level nodes of a parsed template.
pub fn children(root: &Node) -> &[Node] {
    match root {
        Node::Sequence(children) => children,
        other => panic!("expected a sequence root, got {other:?}"),
    }
}

pub fn text_of(node: &Node) -> &str {
    match node {
        Node::Text(chunk) => &chunk.source,
        other => panic!("expected text, got {other:?}"),
    }
}
