//! Directive reconciler
//!
//! Pure functions that rewrite the lines of a resolver file so they carry a
//! [`DesiredState`], touching as little else as possible.
//!
//! ## Rule Pipeline
//!
//! ```text
//! file lines ─▶ domain ─▶ search ─▶ nameserver ─▶ host ─▶ new file lines
//!                  ▲         ▲           ▲          ▲
//!                  └─────────┴─── DesiredState ─────┘
//! ```
//!
//! Each rule owns one [`LineKind`] and sees the output of the rule before
//! it. A rule:
//!
//! 1. Finds every line of its kind
//! 2. Removes them all, highest index first
//! 3. Inserts the desired lines as one block where the last removed line
//!    was, or at the conventional position if there was none
//!
//! Passthrough lines (comments, options, anything unrecognised) are never
//! removed or reordered.

pub mod line;

use crate::desired::DesiredState;
pub use line::LineKind;
use line::{domain_line, host_line, nameserver_line, search_line};

/// Order in which the rules run
pub const RULE_ORDER: [LineKind; 4] = [
    LineKind::Domain,
    LineKind::Search,
    LineKind::Nameserver,
    LineKind::Host,
];

/// Rewrite `lines` so they carry `desired`
///
/// Lines are expected to keep their `\n` terminators; a non-empty line
/// without one gets it added so nothing inserted after it can merge into it.
/// Applying the result again with the same `desired` returns it unchanged.
pub fn reconcile(lines: Vec<String>, desired: &DesiredState) -> Vec<String> {
    let lines = lines.into_iter().map(terminate).collect();
    RULE_ORDER.into_iter().fold(lines, |lines, kind| {
        let replacement = directive_lines(kind, desired);
        apply_rule(lines, kind, replacement)
    })
}

/// The formatted lines `desired` asks for, for a single kind
pub fn directive_lines(kind: LineKind, desired: &DesiredState) -> Vec<String> {
    match kind {
        LineKind::Domain => desired
            .domain_name
            .iter()
            .map(|name| domain_line(name))
            .collect(),
        LineKind::Search if desired.domain_search_list.is_empty() => Vec::new(),
        LineKind::Search => vec![search_line(&desired.domain_search_list)],
        LineKind::Nameserver => desired
            .name_servers
            .iter()
            .map(|server| nameserver_line(server))
            .collect(),
        LineKind::Host => desired.host_mappings.iter().map(host_line).collect(),
        LineKind::Passthrough => Vec::new(),
    }
}

/// Replace every line of `kind` with `replacement`
///
/// - Lines of `kind` present: all are removed and `replacement` goes where
///   the last of them ends up after the removal
/// - None present, file empty: slot 0 is left as an empty header line and
///   `replacement` starts at position 1
/// - None present, file not empty: `replacement` goes after the last line of
///   an earlier-ranked kind, else before the first line of a later-ranked
///   kind, else at the end
/// - An empty `replacement` only removes
pub fn apply_rule(mut lines: Vec<String>, kind: LineKind, replacement: Vec<String>) -> Vec<String> {
    let matched: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, line)| LineKind::classify(line) == kind)
        .map(|(index, _)| index)
        .collect();

    let at = match matched.last() {
        Some(&last) => {
            // Highest index first so the remaining indices stay valid.
            for &index in matched.iter().rev() {
                lines.remove(index);
            }
            last - (matched.len() - 1)
        }
        None if replacement.is_empty() => return lines,
        None if lines.is_empty() => {
            lines.push(String::new());
            1
        }
        None => insertion_point(&lines, kind),
    };

    let tail = lines.split_off(at);
    lines.extend(replacement);
    lines.extend(tail);
    lines
}

/// Where a block of `kind` goes in a file that has none
fn insertion_point(lines: &[String], kind: LineKind) -> usize {
    let Some(rank) = kind.rank() else {
        return lines.len();
    };
    let ranks: Vec<Option<u8>> = lines
        .iter()
        .map(|line| LineKind::classify(line).rank())
        .collect();

    if let Some(last_before) = ranks.iter().rposition(|r| r.is_some_and(|r| r < rank)) {
        return last_before + 1;
    }
    ranks
        .iter()
        .position(|r| r.is_some_and(|r| r > rank))
        .unwrap_or(lines.len())
}

/// Split file content into `\n`-terminated lines
pub fn split_lines(content: &str) -> Vec<String> {
    content
        .split_inclusive('\n')
        .map(|line| terminate(line.to_string()))
        .collect()
}

/// Join lines back into file content
pub fn render(lines: &[String]) -> String {
    lines.concat()
}

fn terminate(mut line: String) -> String {
    if !line.is_empty() && !line.ends_with('\n') {
        line.push('\n');
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn full_state() -> DesiredState {
        DesiredState::new()
            .with_domain_name("example.com")
            .with_search_list(["a.example.com", "b.example.com"])
            .with_name_servers(["10.0.0.1", "2001:db8::53"])
            .with_host("web", "10.0.0.80")
            .with_host("web", "2001:db8::80")
    }

    fn assert_idempotent(input: Vec<String>, desired: &DesiredState) -> Vec<String> {
        let once = reconcile(input, desired);
        let twice = reconcile(once.clone(), desired);
        assert_eq!(once, twice, "second pass changed the lines");

        // Also stable after a trip through the file
        let reread = split_lines(&render(&once));
        assert_eq!(render(&reconcile(reread, desired)), render(&once));
        once
    }

    #[test]
    fn empty_file_gets_domain_after_reserved_slot() {
        let desired = DesiredState::new().with_domain_name("example.com");
        assert_eq!(
            reconcile(Vec::new(), &desired),
            lines(&["", "domain example.com\n"])
        );
    }

    #[test]
    fn existing_domain_is_replaced_in_place() {
        let desired = DesiredState::new().with_domain_name("new.com");
        assert_eq!(
            reconcile(lines(&["domain old.com\n"]), &desired),
            lines(&["domain new.com\n"])
        );
    }

    #[test]
    fn nameserver_block_collapses_to_first_position() {
        let input = lines(&[
            "domain example.com\n",
            "nameserver 1.1.1.1\n",
            "nameserver 2.2.2.2\n",
            "nameserver 3.3.3.3\n",
            "# trailing comment\n",
        ]);
        let desired = DesiredState::new()
            .with_domain_name("example.com")
            .with_name_servers(["9.9.9.9"]);

        assert_eq!(
            reconcile(input, &desired),
            lines(&[
                "domain example.com\n",
                "nameserver 9.9.9.9\n",
                "# trailing comment\n",
            ])
        );
    }

    #[test]
    fn host_line_removed_when_no_hosts_desired() {
        let input = lines(&[
            "domain example.com\n",
            "nameserver 10.0.0.1\n",
            "host1 1.2.3.4\n",
            "options ndots:2\n",
        ]);
        let desired = DesiredState::new()
            .with_domain_name("example.com")
            .with_name_servers(["10.0.0.1"]);

        assert_eq!(
            reconcile(input, &desired),
            lines(&[
                "domain example.com\n",
                "nameserver 10.0.0.1\n",
                "options ndots:2\n",
            ])
        );
    }

    #[test]
    fn empty_file_gets_directives_in_conventional_order() {
        assert_eq!(
            reconcile(Vec::new(), &full_state()),
            lines(&[
                "",
                "domain example.com\n",
                "search a.example.com b.example.com\n",
                "nameserver 10.0.0.1\n",
                "nameserver 2001:db8::53\n",
                "web 10.0.0.80\n",
                "web 2001:db8::80\n",
            ])
        );
    }

    #[test]
    fn empty_file_and_empty_state_stay_empty() {
        assert!(reconcile(Vec::new(), &DesiredState::new()).is_empty());
    }

    #[test]
    fn reconciling_twice_is_a_no_op() {
        assert_idempotent(Vec::new(), &full_state());
        assert_idempotent(
            lines(&[
                "# managed elsewhere\n",
                "nameserver 8.8.8.8\n",
                "options rotate\n",
                "nameserver 8.8.4.4\n",
                "old 192.0.2.1\n",
                "search stale.com\n",
            ]),
            &full_state(),
        );
        assert_idempotent(
            lines(&["nameserver 8.8.8.8\n", "host 192.0.2.1\n"]),
            &DesiredState::new(),
        );
    }

    #[test]
    fn round_trip_from_empty_file_is_stable() {
        let state = full_state();
        let first = reconcile(Vec::new(), &state);
        let second = reconcile(first.clone(), &state);
        let third = reconcile(second.clone(), &state);
        assert_eq!(first, second);
        assert_eq!(second, third);
    }

    #[test]
    fn changing_name_servers_leaves_other_lines_alone() {
        let base = assert_idempotent(
            lines(&["# header\n", "options ndots:2\n"]),
            &full_state(),
        );

        let mut changed_state = full_state();
        changed_state.name_servers = vec!["192.0.2.53".to_string()];
        let changed = reconcile(base.clone(), &changed_state);

        let without_nameservers = |lines: &[String]| -> Vec<String> {
            lines
                .iter()
                .filter(|line| LineKind::classify(line) != LineKind::Nameserver)
                .cloned()
                .collect()
        };
        assert_eq!(without_nameservers(&base), without_nameservers(&changed));
        assert_eq!(
            changed
                .iter()
                .filter(|line| LineKind::classify(line) == LineKind::Nameserver)
                .collect::<Vec<_>>(),
            vec!["nameserver 192.0.2.53\n"]
        );
    }

    #[test]
    fn all_nameservers_removed_when_none_desired() {
        let input = lines(&[
            "# header\n",
            "nameserver 10.0.0.1\n",
            "search example.com\n",
            "nameserver 10.0.0.2\n",
            "nameserver 10.0.0.3\n",
            "web 1.2.3.4\n",
        ]);
        let desired = DesiredState::new()
            .with_search_list(["example.com"])
            .with_host("web", "1.2.3.4");

        assert_eq!(
            reconcile(input, &desired),
            lines(&["# header\n", "search example.com\n", "web 1.2.3.4\n"])
        );
    }

    #[test]
    fn scattered_lines_are_replaced_at_last_occurrence() {
        let input = lines(&[
            "nameserver 10.0.0.1\n",
            "# between\n",
            "nameserver 10.0.0.2\n",
            "options rotate\n",
        ]);
        assert_eq!(
            apply_rule(
                input,
                LineKind::Nameserver,
                vec!["nameserver 10.0.0.9\n".to_string()]
            ),
            lines(&["# between\n", "nameserver 10.0.0.9\n", "options rotate\n"])
        );
    }

    #[test]
    fn missing_kind_goes_between_its_neighbours() {
        let input = lines(&["# generated\n", "nameserver 10.0.0.1\n"]);
        assert_eq!(
            apply_rule(input, LineKind::Domain, vec![domain_line("example.com")]),
            lines(&["# generated\n", "domain example.com\n", "nameserver 10.0.0.1\n"])
        );

        let input = lines(&["domain example.com\n", "nameserver 10.0.0.1\n", "web 10.0.0.80\n"]);
        assert_eq!(
            apply_rule(
                input,
                LineKind::Search,
                vec!["search example.com\n".to_string()]
            ),
            lines(&[
                "domain example.com\n",
                "search example.com\n",
                "nameserver 10.0.0.1\n",
                "web 10.0.0.80\n",
            ])
        );
    }

    #[test]
    fn missing_kind_appends_when_file_has_no_directives() {
        let input = lines(&["# only a comment\n"]);
        assert_eq!(
            apply_rule(input, LineKind::Host, vec!["web 10.0.0.80\n".to_string()]),
            lines(&["# only a comment\n", "web 10.0.0.80\n"])
        );
    }

    #[test]
    fn unterminated_last_line_is_not_merged() {
        let desired = DesiredState::new().with_domain_name("example.com");
        let out = reconcile(lines(&["# comment without newline"]), &desired);
        assert_eq!(out, lines(&["# comment without newline\n", "domain example.com\n"]));
    }

    #[test]
    fn search_value_containing_domain_is_not_a_domain_line() {
        let desired = DesiredState::new()
            .with_domain_name("example.com")
            .with_search_list(["mydomain.com"]);
        assert_eq!(
            reconcile(lines(&["search mydomain.com\n"]), &desired),
            lines(&["domain example.com\n", "search mydomain.com\n"])
        );
    }

    #[test]
    fn passthrough_lines_survive_host_churn() {
        let input = lines(&[
            "; comment\n",
            "\n",
            "old 192.0.2.1\n",
            "options timeout:1\n",
            "sortlist 130.155.160.0/255.255.240.0\n",
        ]);
        let desired = DesiredState::new().with_host("new", "192.0.2.2");
        assert_eq!(
            reconcile(input, &desired),
            lines(&[
                "; comment\n",
                "\n",
                "new 192.0.2.2\n",
                "options timeout:1\n",
                "sortlist 130.155.160.0/255.255.240.0\n",
            ])
        );
    }

    #[test]
    fn single_address_sortlist_survives_every_cycle() {
        let input = lines(&["nameserver 10.0.0.1\n", "sortlist 130.155.160.0\n"]);
        let desired = DesiredState::new().with_name_servers(["10.0.0.1"]);
        let expected = lines(&["nameserver 10.0.0.1\n", "sortlist 130.155.160.0\n"]);

        assert_eq!(assert_idempotent(input.clone(), &desired), expected);
        assert_eq!(
            reconcile(input, &desired.with_host("web", "10.0.0.80")),
            lines(&[
                "nameserver 10.0.0.1\n",
                "web 10.0.0.80\n",
                "sortlist 130.155.160.0\n",
            ])
        );
    }

    #[test]
    fn split_and_render() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("a\nb"), lines(&["a\n", "b\n"]));
        assert_eq!(split_lines("a\n\nb\n"), lines(&["a\n", "\n", "b\n"]));
        assert_eq!(render(&lines(&["", "domain x.com\n"])), "domain x.com\n");
    }
}
