use crate::template::escape::{EscapeFn, escape_html};

/// Per-host rendering options.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Used for `{{ }}` (escape = true) and `{#html}` (escape = false).
    pub escape: EscapeFn,
    /// Upper bound on iterations of a single `{#for}` block per render.
    pub max_loop_iterations: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            escape: escape_html,
            max_loop_iterations: 100_000,
        }
    }
}
