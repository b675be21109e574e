//! Directive template compiler.
//!
//! Source text is scanned into [`Segment`]s once per call to
//! [`Template::parse`] and rendered by walking them against the component's
//! fields. Nothing is cached between renders.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

pub mod ast;
pub mod escape;
pub mod expr;

mod eval;
mod parse;

pub use ast::Segment;
pub use escape::{EscapeFn, escape_html};

use crate::component::Fields;
use crate::error::Result;
use crate::events::EVENT_ATTRIBUTE;
use crate::options::Options;

static EVENT_SHORTHAND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@([a-z]+)="([\w$]+)""#).expect("event shorthand pattern is valid")
});

/// Rewrites `@click="save"` into `data-event="click,save"`.
pub fn rewrite_event_shorthand(source: &str) -> Cow<'_, str> {
    EVENT_SHORTHAND.replace_all(source, format!(r#"{EVENT_ATTRIBUTE}="${{1}},${{2}}""#))
}

#[derive(Clone, Debug)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let source = rewrite_event_shorthand(source);
        Ok(Self {
            segments: parse::parse_segments(&source)?,
        })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Renders against `fields`. Any evaluation failure aborts the render.
    pub fn render(&self, fields: &Fields, options: &Options) -> Result<String> {
        let mut out = String::new();
        eval::Scope::new(fields, options).render(&self.segments, &mut out)?;
        Ok(out)
    }
}

/// One-shot parse and render.
pub fn compile(source: &str, fields: &Fields, escape: EscapeFn) -> Result<String> {
    let options = Options {
        escape,
        ..Options::default()
    };
    Template::parse(source)?.render(fields, &options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::value::Value;

    #[test]
    fn shorthand_becomes_event_marker() {
        assert_eq!(
            rewrite_event_shorthand(r#"<button @click="add" class="x">"#),
            r#"<button data-event="click,add" class="x">"#
        );
        assert!(matches!(
            rewrite_event_shorthand("<p>a@b.c</p>"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn escaped_and_raw_interpolation() {
        let fields = Fields::new().with("b", "<b>");
        assert_eq!(
            compile(r#"{{ "<b>" }}|{#html "<b>"}|{{b}}"#, &fields, escape_html).unwrap(),
            "&lt;b&gt;|<b>|&lt;b&gt;"
        );
    }

    #[test]
    fn empty_interpolation_renders_nothing() {
        assert_eq!(compile("[{{ }}]", &Fields::new(), escape_html).unwrap(), "[]");
    }

    #[test]
    fn custom_escape_function_is_used() {
        fn shout(v: &Value, _escape: bool) -> String {
            v.to_string().to_uppercase()
        }
        let fields = Fields::new().with("name", "ada");
        assert_eq!(compile("hi {{name}}", &fields, shout).unwrap(), "hi ADA");
    }

    #[test]
    fn errors_carry_the_cause_message() {
        let err = compile("{{ nope }}", &Fields::new(), escape_html).unwrap_err();
        assert_eq!(err, Error::Template("nope is not defined".into()));
        assert_eq!(err.to_string(), "template error: nope is not defined");
    }

    #[test]
    fn parsed_template_renders_repeatedly() {
        let template = Template::parse("{#each xs as x}{{x}}{/each}").unwrap();
        let options = Options::default();
        let first = Fields::new().with("xs", vec![1, 2]);
        let second = Fields::new().with("xs", vec![3]);
        assert_eq!(template.render(&first, &options).unwrap(), "12");
        assert_eq!(template.render(&second, &options).unwrap(), "3");
        assert_eq!(template.segments().len(), 1);
    }
}
