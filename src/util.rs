use crate::Symbol;

pub(crate) type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;
pub type HashMap<K, V> = hashbrown::HashMap<K, V, BuildHasher>;
pub type HashSet<K> = hashbrown::HashSet<K, BuildHasher>;
pub type IndexMap<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type IndexSet<K> = indexmap::IndexSet<K, BuildHasher>;

/// Generates fresh names by appending a counter to a stem.
/// The generator itself does not know which names are taken;
/// callers pair it with a [`crate::proof::Namespace`] that does.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolGen {
    count: usize,
}

impl SymbolGen {
    pub fn new() -> Self {
        Self { count: 0 }
    }

    /// The next name `{stem}_{n}`.
    pub fn fresh(&mut self, stem: &str) -> Symbol {
        let name = format!("{stem}_{}", self.count);
        self.count += 1;
        Symbol::from(name.as_str())
    }
}

/// Displays a list of items separated by `sep`.
pub(crate) struct ListDisplay<'a, T>(pub &'a [T], pub &'a str);

impl<T: std::fmt::Display> std::fmt::Display for ListDisplay<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut did_something = false;
        for item in self.0.iter() {
            if did_something {
                f.write_str(self.1)?;
            }
            write!(f, "{item}")?;
            did_something = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_names_are_distinct() {
        let mut gen = SymbolGen::new();
        let a = gen.fresh("c");
        let b = gen.fresh("c");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "c_0");
        assert_eq!(b.as_str(), "c_1");
    }

    #[test]
    fn list_display_separates() {
        let items = [1, 2, 3];
        assert_eq!(ListDisplay(&items, ", ").to_string(), "1, 2, 3");
        let empty: [i32; 0] = [];
        assert_eq!(ListDisplay(&empty, ", ").to_string(), "");
    }
}
