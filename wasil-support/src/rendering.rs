//! Text rendering utilities for human-friendly error messages.
//!
//! Service identifiers are plain strings: sometimes a Rust type path
//! (`app::logging::Logger`), sometimes a dotted name (`auth.identity`).
//! The helpers here format resolution chains and rank "did you mean?"
//! candidates for both shapes.

/// Renders a resolution chain as a readable string.
///
/// # Examples
/// ```
/// use wasil_support::rendering::render_chain;
///
/// let chain = vec!["app::Mailer", "app::Transport", "app::Mailer"];
/// assert_eq!(render_chain(&chain), "Mailer → Transport → Mailer");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|id| short_identifier(id.as_ref()))
        .collect::<Vec<_>>()
        .join(" → ")
}

/// Returns the last path segment of a type-path identifier.
///
/// Generic arguments are shortened too; dotted identifiers are returned
/// untouched since every segment of them is meaningful.
///
/// ```
/// use wasil_support::rendering::short_identifier;
///
/// assert_eq!(short_identifier("my_app::services::UserService"), "UserService");
/// assert_eq!(short_identifier("alloc::sync::Arc<my_app::Logger>"), "Arc<Logger>");
/// assert_eq!(short_identifier("auth.basic.identity"), "auth.basic.identity");
/// ```
pub fn short_identifier(identifier: &str) -> String {
    let mut out = String::with_capacity(identifier.len());
    let mut segment = String::new();
    let mut chars = identifier.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '&' => {
                out.push_str(&segment);
                out.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    out.push_str(&segment);
    out
}

/// Ranks `available` identifiers by similarity to `requested`.
///
/// Substring matches (on the full identifier or its short form) come first,
/// then identifiers within a small edit distance of the short form.
pub fn suggest_similar<S: AsRef<str>>(
    requested: &str,
    available: &[S],
    max_suggestions: usize,
) -> Vec<String> {
    let wanted = requested.to_lowercase();
    let wanted_short = short_identifier(requested).to_lowercase();

    let mut scored: Vec<(usize, &str)> = available
        .iter()
        .map(AsRef::as_ref)
        .filter(|candidate| *candidate != requested)
        .filter_map(|candidate| {
            let full = candidate.to_lowercase();
            let short = short_identifier(candidate).to_lowercase();

            if full.contains(&wanted) || wanted.contains(&full) {
                return Some((0, candidate));
            }
            if short.contains(&wanted_short) || wanted_short.contains(&short) {
                return Some((1, candidate));
            }

            let distance = edit_distance(&short, &wanted_short);
            let budget = (wanted_short.chars().count() / 3).max(1);
            (distance <= budget).then_some((1 + distance, candidate))
        })
        .collect();

    scored.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Levenshtein distance over chars.
fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = Vec::with_capacity(b.len() + 1);
        current.push(i + 1);
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            let insertion = current[j] + 1;
            let deletion = previous[j + 1] + 1;
            current.push(substitution.min(insertion).min(deletion));
        }
        previous = current;
    }

    previous[b.len()]
}
