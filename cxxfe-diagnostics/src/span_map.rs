//! Span tracking without modifying the AST.
//!
//! Nodes carry a stable string id; the parser stamps an id on a node as it
//! builds it, and later passes (the instantiation queue, the IR generator)
//! look the originating span back up from that id rather than storing a
//! span inline on every node.

use crate::Span;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SpanMap {
    spans: HashMap<String, Span>,
    next_id: usize,
}

impl SpanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate_id(&mut self) -> String {
        let id = format!("span_{}", self.next_id);
        self.next_id += 1;
        id
    }

    pub fn record(&mut self, id: String, span: Span) {
        self.spans.insert(id, span);
    }

    pub fn get(&self, id: &str) -> Option<&Span> {
        self.spans.get(id)
    }

    pub fn get_or_unknown(&self, id: &str) -> Span {
        self.get(id).cloned().unwrap_or_else(Span::unknown)
    }

    pub fn clear(&mut self) {
        self.spans.clear();
        self.next_id = 0;
    }

    pub fn stats(&self) -> usize {
        self.spans.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_retrieves_a_span_by_id() {
        let mut map = SpanMap::new();
        let span = Span::new("main.cpp".to_string(), 10, 5, 2);

        let id = map.generate_id();
        map.record(id.clone(), span.clone());
        assert_eq!(map.get(&id), Some(&span));
    }

    #[test]
    fn distinct_ids_do_not_collide() {
        let mut map = SpanMap::new();

        let span1 = Span::new("main.cpp".to_string(), 1, 1, 5);
        let span2 = Span::new("main.cpp".to_string(), 2, 1, 5);

        let id1 = map.generate_id();
        let id2 = map.generate_id();

        map.record(id1.clone(), span1.clone());
        map.record(id2.clone(), span2.clone());

        assert_eq!(map.get(&id1), Some(&span1));
        assert_eq!(map.get(&id2), Some(&span2));
    }

    #[test]
    fn unknown_id_falls_back_to_unknown_span() {
        let map = SpanMap::new();
        assert_eq!(map.get_or_unknown("nope"), Span::unknown());
    }
}
