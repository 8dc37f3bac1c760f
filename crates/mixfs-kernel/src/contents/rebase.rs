//! Translating backend-local paths in results back into the virtual
//! namespace.

use super::path::{join, SEP};
use super::types::{Checkpoint, Model};

/// A backend result that may carry backend-local paths.
///
/// `rebase` prefixes every path with `base` (`<prefix>/<mount>`). It is
/// not idempotent: apply it exactly once per backend result.
pub trait Rebase {
    fn rebase(self, base: &str) -> Self;
}

impl Rebase for Model {
    fn rebase(mut self, base: &str) -> Self {
        self.path = join(base, &self.path);
        if self.is_dir() {
            // one level only, matching what a backend listing returns
            if let Some(children) = self.children_mut() {
                for child in children.iter_mut() {
                    child.path = join(base, child.path.trim_start_matches(SEP));
                }
            }
        }
        self
    }
}

impl Rebase for bool {
    fn rebase(self, _base: &str) -> Self {
        self
    }
}

impl Rebase for () {
    fn rebase(self, _base: &str) -> Self {}
}

impl Rebase for Checkpoint {
    fn rebase(self, _base: &str) -> Self {
        self
    }
}

impl<T: Rebase> Rebase for Vec<T> {
    fn rebase(self, base: &str) -> Self {
        self.into_iter().map(|item| item.rebase(base)).collect()
    }
}
