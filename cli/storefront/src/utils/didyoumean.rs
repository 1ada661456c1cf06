use std::fmt::Display;

use indoc::formatdoc;

/// A "did you mean" hint for a search that the API suggested a
/// different spelling for.
#[derive(Debug)]
pub struct DidYouMean<'a> {
    searched_term: &'a str,
    suggestion: Option<&'a str>,
}

impl<'a> DidYouMean<'a> {
    pub fn new(searched_term: &'a str, suggestion: Option<&'a str>) -> Self {
        // suggesting the term that was searched is not helpful
        let suggestion = suggestion
            .map(str::trim)
            .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case(searched_term.trim()));
        Self {
            searched_term,
            suggestion,
        }
    }

    pub fn has_suggestions(&self) -> bool {
        self.suggestion.is_some()
    }
}

impl Display for DidYouMean<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Some(suggestion) = self.suggestion else {
            return Ok(());
        };
        write!(f, "{}", formatdoc! {"
            Did you mean '{suggestion}'?
            Use 'storefront search --accept-suggestion \"{term}\"' to search for it.",
            term = self.searched_term,
        })
    }
}
