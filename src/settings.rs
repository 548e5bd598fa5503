//! Stacked build-setting layers.
//!
//! Settings are immutable value snapshots rather than shared pointer graphs:
//! pushing a layer returns a fresh [`Environment`]. Resolution looks a name
//! up front-to-back through the stack and expands `$(NAME)` and `${NAME}`
//! references in the value, so pushing a level re-resolves every
//! interpolated setting beneath it.

use indexmap::IndexMap;

/// Reference expansion stops at this depth; self-referential settings then
/// resolve to their literal text.
const MAX_EXPANSION_DEPTH: usize = 32;

/// A named, ordered set of setting assignments.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    name: String,
    assignments: IndexMap<String, String>,
}

impl Layer {
    /// Create an empty layer. The name only appears in trace output.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assignments: IndexMap::new(),
        }
    }

    /// Add an assignment, replacing any previous value for the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.assignments.insert(name.into(), value.into());
    }

    /// Chaining form of [`Layer::set`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Unexpanded value of `name`, if assigned in this layer.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.assignments.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An immutable stack of setting layers, front layer first.
#[derive(Clone, Debug, Default)]
pub struct Environment {
    layers: Vec<Layer>,
}

impl Environment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a fresh environment with `layer` stacked in front.
    #[must_use]
    pub fn push_front(&self, layer: Layer) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(layer);
        layers.extend(self.layers.iter().cloned());
        Self { layers }
    }

    /// Resolve `name` to its fully expanded value.
    ///
    /// Unassigned names resolve to the empty string.
    #[must_use]
    pub fn resolve(&self, name: &str) -> String {
        self.expand_name(name, 0)
    }

    /// Expand every setting reference embedded in `text`.
    #[must_use]
    pub fn resolve_value(&self, text: &str) -> String {
        self.expand(text, 0)
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    fn expand_name(&self, name: &str, depth: usize) -> String {
        match self.lookup(name) {
            Some(raw) => self.expand(raw, depth),
            None => {
                tracing::debug!(name, "unassigned setting resolves to empty");
                String::new()
            }
        }
    }

    fn expand(&self, text: &str, depth: usize) -> String {
        if depth >= MAX_EXPANSION_DEPTH {
            return text.to_owned();
        }
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(dollar) = rest.find('$') {
            out.push_str(&rest[..dollar]);
            let tail = &rest[dollar..];
            if let Some((name, remainder)) = split_reference(tail) {
                out.push_str(&self.expand_name(name, depth + 1));
                rest = remainder;
            } else {
                out.push('$');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// Split a `$(NAME)` or `${NAME}` prefix off `text` (which starts at `$`),
/// returning the name and the remainder after the closing delimiter.
fn split_reference(text: &str) -> Option<(&str, &str)> {
    let open = *text.as_bytes().get(1)?;
    let close = match open {
        b'(' => ')',
        b'{' => '}',
        _ => return None,
    };
    let end = text.find(close)?;
    Some((&text[2..end], &text[end + 1..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn environment() -> Environment {
        let base = Layer::new("base")
            .with("NAME", "App")
            .with("SUFFIX", "_debug")
            .with("PRODUCT", "$(NAME)$(SUFFIX)")
            .with("BRACED", "${NAME}.bin");
        Environment::new().push_front(base)
    }

    #[rstest]
    #[case("NAME", "App")]
    #[case("PRODUCT", "App_debug")]
    #[case("BRACED", "App.bin")]
    #[case("MISSING", "")]
    fn resolve_expands_references(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(environment().resolve(name), expected);
    }

    #[rstest]
    fn front_layer_wins() {
        let env = environment().push_front(Layer::new("override").with("NAME", "Tool"));
        assert_eq!(env.resolve("PRODUCT"), "Tool_debug");
    }

    #[rstest]
    fn push_front_leaves_original_untouched() {
        let env = environment();
        let _scoped = env.push_front(Layer::new("scoped").with("NAME", "Other"));
        assert_eq!(env.resolve("NAME"), "App");
    }

    #[rstest]
    #[case("plain text", "plain text")]
    #[case("$(NAME)/out", "App/out")]
    #[case("$NAME", "$NAME")]
    #[case("cost: $5", "cost: $5")]
    #[case("$(UNCLOSED", "$(UNCLOSED")]
    fn resolve_value_handles_literals(#[case] text: &str, #[case] expected: &str) {
        assert_eq!(environment().resolve_value(text), expected);
    }

    #[rstest]
    fn self_reference_terminates() {
        let env = Environment::new().push_front(Layer::new("loop").with("X", "$(X)"));
        // The depth guard stops the recursion; the exact remainder is the
        // unexpanded reference text.
        assert_eq!(env.resolve("X"), "$(X)");
    }
}
