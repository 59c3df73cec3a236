use std::fmt;
use std::sync::Arc;

/// Identifier of a chemical species. Cheap to clone; equal names are interchangeable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Molecule(Arc<str>);

impl Molecule {
    pub fn new(name: &str) -> Self {
        Molecule(Arc::from(name))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Molecule {
    fn from(name: &str) -> Self {
        Molecule::new(name)
    }
}

impl From<String> for Molecule {
    fn from(name: String) -> Self {
        Molecule(Arc::from(name))
    }
}

impl fmt::Display for Molecule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn distinct_instances_with_same_name_are_equal() {
        let a1 = Molecule::new("A");
        let a2: Molecule = String::from("A").into();
        assert_eq!(a1, a2);
        let set: HashSet<_> = [a1, a2, Molecule::new("B")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }
}
