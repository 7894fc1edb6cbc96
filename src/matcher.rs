use crate::error::ConfigError;
use crate::models::MatchOutcome;
use std::collections::HashSet;

/// Target and deny names, trimmed and deduplicated case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameSet {
    targets: Vec<String>,
    denies: Vec<String>,
}

impl NameSet {
    pub fn new<T, D>(targets: T, denies: D) -> Result<Self, ConfigError>
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        let targets = dedupe_names(targets);
        if targets.is_empty() {
            return Err(ConfigError::NoTargetNames);
        }
        Ok(Self {
            targets,
            denies: dedupe_names(denies),
        })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn denies(&self) -> &[String] {
        &self.denies
    }

    pub fn match_text(&self, text: &str) -> MatchOutcome {
        match_names(text, &self.targets, &self.denies)
    }
}

/// Trims every name, drops empties and keeps the first spelling of each
/// case-insensitive duplicate.
pub fn dedupe_names<I>(names: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for name in names {
        let name = name.as_ref().trim();
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_lowercase()) {
            out.push(name.to_string());
        }
    }
    out
}

/// Case-insensitive substring match. A deny hit wins over any target hit;
/// otherwise the first target in list order is reported.
pub fn match_names(text: &str, targets: &[String], denies: &[String]) -> MatchOutcome {
    let lower = text.to_lowercase();

    let denied = denies
        .iter()
        .filter(|d| !d.is_empty())
        .any(|d| lower.contains(&d.to_lowercase()));
    if denied {
        return MatchOutcome::Skip;
    }

    targets
        .iter()
        .filter(|t| !t.is_empty())
        .find(|t| lower.contains(&t.to_lowercase()))
        .map(|t| MatchOutcome::Found(t.clone()))
        .unwrap_or(MatchOutcome::NoMatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let outcome = match_names("PAUL is here", &names(&["paul"]), &[]);
        assert_eq!(outcome, MatchOutcome::Found("paul".to_string()));
    }

    #[test]
    fn test_match_reports_configured_spelling() {
        let outcome = match_names("to: paul newman", &names(&["Newman"]), &[]);
        assert_eq!(outcome, MatchOutcome::Found("Newman".to_string()));
    }

    #[test]
    fn test_deny_overrides_target() {
        let outcome = match_names(
            "Paul Smith or Current Resident",
            &names(&["Paul"]),
            &names(&["current resident"]),
        );
        assert_eq!(outcome, MatchOutcome::Skip);
    }

    #[test]
    fn test_first_target_in_list_order_wins() {
        let text = "Paul and Joanne Newman";
        let outcome = match_names(text, &names(&["Joanne", "Paul"]), &[]);
        assert_eq!(outcome, MatchOutcome::Found("Joanne".to_string()));
    }

    #[test]
    fn test_substring_not_word_boundary() {
        let outcome = match_names("PAULINE DOE", &names(&["paul"]), &[]);
        assert_eq!(outcome, MatchOutcome::Found("paul".to_string()));
    }

    #[test]
    fn test_no_match() {
        let outcome = match_names("Occupant", &names(&["Paul"]), &names(&["Resident"]));
        assert_eq!(outcome, MatchOutcome::NoMatch);
    }

    #[test]
    fn test_empty_deny_term_is_ignored() {
        let outcome = match_names("Paul", &names(&["Paul"]), &names(&[""]));
        assert_eq!(outcome, MatchOutcome::Found("Paul".to_string()));
    }

    #[test]
    fn test_dedupe_collapses_case_and_whitespace() {
        assert_eq!(dedupe_names(["Paul", "paul", " Paul "]), names(&["Paul"]));
    }

    #[test]
    fn test_dedupe_drops_blank_entries_and_keeps_order() {
        assert_eq!(
            dedupe_names(["", " Joanne", "  ", "Paul", "JOANNE"]),
            names(&["Joanne", "Paul"])
        );
    }

    #[test]
    fn test_name_set_requires_targets() {
        let err = NameSet::new(["  ", ""], ["Resident"]).unwrap_err();
        assert!(matches!(err, ConfigError::NoTargetNames));
    }

    #[test]
    fn test_name_set_match_text() {
        let set = NameSet::new(["Paul", "paul"], ["Resident"]).unwrap();
        assert_eq!(set.targets(), ["Paul".to_string()]);
        assert_eq!(set.match_text("paul resident"), MatchOutcome::Skip);
        assert_eq!(
            set.match_text("PAUL"),
            MatchOutcome::Found("Paul".to_string())
        );
    }
}
