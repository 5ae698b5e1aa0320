//! Element tree builders for tests

use treelens::host::Element;

/// `App > div > (Header, Body)`, with `Body` carrying `body_props`
pub fn app(body_props: u64) -> Element {
    Element::function("App").child(
        Element::host("div")
            .child(Element::function("Header"))
            .child(Element::function("Body").props(body_props)),
    )
}

/// A `List` component rendering one keyed `Item` per key
pub fn keyed_list(keys: &[u32]) -> Element {
    Element::function("List").children(
        keys.iter()
            .map(|k| Element::function("Item").key(k.to_string()).child(Element::host("li"))),
    )
}

/// Builder for timed component trees used by profiling tests
pub struct TimedTreeBuilder {
    name: String,
    duration: f64,
    props: u64,
    children: Vec<Element>,
}

impl TimedTreeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            duration: 1.0,
            props: 0,
            children: Vec::new(),
        }
    }

    pub fn duration(mut self, ms: f64) -> Self {
        self.duration = ms;
        self
    }

    pub fn props(mut self, revision: u64) -> Self {
        self.props = revision;
        self
    }

    pub fn child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn build(self) -> Element {
        Element::function(self.name)
            .duration(self.duration)
            .props(self.props)
            .children(self.children)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_tree_builder() {
        let el = TimedTreeBuilder::new("App")
            .duration(3.0)
            .props(2)
            .child(Element::function("Leaf"))
            .build();

        assert_eq!(el.name.as_deref(), Some("App"));
        assert_eq!(el.duration, 3.0);
        assert_eq!(el.props, 2);
        assert_eq!(el.children.len(), 1);
    }
}
