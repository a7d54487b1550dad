//! Parameter placeholder syntax, the one dialect difference the model knows.

use serde::{Deserialize, Serialize};

/// How a bound parameter is written in SQL text.
///
/// # Examples
///
/// ```
/// use flightbook_core::Placeholder;
///
/// assert_eq!(Placeholder::positional().render("name"), "?");
/// assert_eq!(Placeholder::named(":", "").render("name"), ":name");
/// assert_eq!(Placeholder::named("%(", ")s").render("name"), "%(name)s");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "lowercase")]
pub enum Placeholder {
    /// The same marker for every parameter, bound by position.
    Positional {
        /// Marker text, usually `?`.
        marker: String,
    },
    /// One marker per parameter name, e.g. `:name`.
    Named {
        /// Text before the parameter name.
        prefix: String,
        /// Text after the parameter name.
        suffix: String,
    },
}

impl Placeholder {
    /// `?` markers.
    pub fn positional() -> Self {
        Placeholder::Positional {
            marker: "?".to_string(),
        }
    }

    /// Named markers, e.g. `:name` for prefix `:` and an empty suffix.
    pub fn named(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Placeholder::Named {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Renders the marker for one parameter.
    pub fn render(&self, name: &str) -> String {
        match self {
            Placeholder::Positional { marker } => marker.clone(),
            Placeholder::Named { prefix, suffix } => format!("{prefix}{name}{suffix}"),
        }
    }

    /// Renders a parenthesised marker list for the given parameter names.
    pub fn tuple<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> String {
        let markers: Vec<String> = names
            .into_iter()
            .map(|name| self.render(name))
            .collect();
        format!("({})", markers.join(", "))
    }
}

impl Default for Placeholder {
    fn default() -> Self {
        Placeholder::positional()
    }
}
